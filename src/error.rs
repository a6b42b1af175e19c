//! Error types for the dataset-scout pipeline.

use scout_search::{
    AggregationError, CacheError, ConfigError, ConnectorError, SourceId, TranslationError,
};

/// Top-level error type for a dataset search.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    /// The request could not be turned into a structured query.
    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// Aggregation produced no usable result.
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// The cached computation panicked or could not be awaited in time.
    #[error(transparent)]
    Cache(CacheError),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An HTTP connector could not be constructed.
    #[error("connector setup failed: {0}")]
    Connector(#[from] ConnectorError),

    /// A single-dataset lookup failed.
    #[error("dataset lookup on {catalog} failed: {error}")]
    DatasetLookup {
        catalog: SourceId,
        error: ConnectorError,
    },

    /// Language model client setup failed.
    #[error("LLM client error: {0}")]
    Llm(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`ScoutConfig`](crate::config::ScoutConfig).
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be written as TOML.
    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl From<CacheError> for ScoutError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Aggregation(inner) => Self::Aggregation(inner),
            other => Self::Cache(other),
        }
    }
}

impl From<scout_search::SearchError> for ScoutError {
    fn from(err: scout_search::SearchError) -> Self {
        match err {
            scout_search::SearchError::Config(inner) => inner.into(),
            scout_search::SearchError::Cache(inner) => inner.into(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cache_aggregation_errors_surface_as_aggregation() {
        let err: ScoutError = CacheError::Aggregation(AggregationError::NoConnectors).into();
        assert!(matches!(err, ScoutError::Aggregation(AggregationError::NoConnectors)));
    }

    #[test]
    fn other_cache_errors_stay_cache_errors() {
        let err: ScoutError = CacheError::WaitTimeout(Duration::from_secs(1)).into();
        assert!(matches!(err, ScoutError::Cache(CacheError::WaitTimeout(_))));
    }

    #[test]
    fn search_config_errors_map_to_config() {
        let err: ScoutError =
            scout_search::SearchError::Config(ConfigError("max_results must be > 0".into())).into();
        assert!(err.to_string().contains("max_results"));
        assert!(matches!(err, ScoutError::Config(_)));
    }
}
