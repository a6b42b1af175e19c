//! # scout-search
//!
//! Concurrent dataset search across public catalogs.
//!
//! This crate turns a natural-language request into a structured query,
//! fans it out to Kaggle, Hugging Face and Google Dataset Search, and merges
//! whatever comes back into one ranked list of datasets.
//!
//! ## Design
//!
//! - [`intent`] translates requests through a pluggable [`LlmCapability`]
//! - [`connectors`] implement the [`Connector`] trait over HTTP
//! - [`orchestrator`] runs one task per catalog with per-source deadlines,
//!   bounded retries and an overall deadline
//! - [`normalize`] maps provider payloads onto a unified [`DatasetRecord`]
//! - [`cache`] coalesces concurrent identical queries into one computation
//! - [`recommend`] picks the best-fitting datasets from a ranked result,
//!   falling back to keyword overlap when the model is unavailable
//! - Graceful degradation: if some catalogs fail, the others still return
//!   results and the failures are reported alongside them
//!
//! ## Security
//!
//! - Catalog credentials never appear in `Debug` output or error messages
//! - No network listeners; this is a library, not a server
//! - Request and query text is logged only at trace level

pub mod cache;
pub mod config;
pub mod connector;
pub mod connectors;
pub mod error;
pub mod http;
pub mod intent;
pub mod normalize;
pub mod orchestrator;
pub mod recommend;
pub mod types;

pub use cache::{CacheLookup, Lookup, QueryCache};
pub use config::SearchConfig;
pub use connector::{Connector, ConnectorRegistry};
pub use connectors::ConnectorsConfig;
pub use error::{
    AggregationError, CacheError, CapabilityError, ConfigError, ConnectorError,
    ConnectorErrorKind, TranslationError,
};
pub use intent::{IntentTranslator, LlmCapability, ResponseSchema, Translation, TranslationStrategy};
pub use orchestrator::aggregate;
pub use recommend::{Pick, Recommendation, RecommendationStrategy, Recommender};
pub use types::{
    AggregateResult, DatasetRecord, RawSourceResult, ResultStatus, SourceId, StructuredQuery,
};

/// Aggregate `query` through `cache`, computing at most once per key.
///
/// Validates `config` before anything is dispatched.
///
/// # Errors
///
/// Returns [`CacheError::Aggregation`] for terminal aggregation failures,
/// and the other [`CacheError`] variants for panics or wait timeouts.
/// Invalid configuration surfaces as a [`ConfigError`] via
/// [`SearchConfig::validate`] and is reported before any lookup.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use scout_search::{ConnectorRegistry, ConnectorsConfig, Lookup, QueryCache, SearchConfig, StructuredQuery};
///
/// let config = SearchConfig::default();
/// let registry = ConnectorRegistry::with_http_defaults(&ConnectorsConfig::default(), 10)?;
/// let cache = QueryCache::from_config(&config);
/// let query = StructuredQuery::from_keywords(["housing", "prices"]);
///
/// let lookup = scout_search::search_cached(&query, &registry, &config, &cache, Lookup::Cached).await?;
/// for record in &lookup.value.records {
///     println!("{} ({}): {}", record.title, record.source, record.url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search_cached(
    query: &StructuredQuery,
    connectors: &ConnectorRegistry,
    config: &SearchConfig,
    cache: &QueryCache,
    lookup: Lookup,
) -> Result<CacheLookup, SearchError> {
    config.validate()?;
    let lookup = cache
        .get_or_compute(query, lookup, || aggregate(query, connectors, config))
        .await?;
    Ok(lookup)
}

/// Failure of [`search_cached`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
