//! Error types for the scout-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No API keys or credentials appear in
//! error messages.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::SourceId;

/// Classification of a single connector failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorErrorKind {
    /// The call did not finish within its deadline.
    Timeout,
    /// The provider refused the call because of request volume.
    RateLimited,
    /// Credentials missing, invalid, or lacking permission.
    Unauthorized,
    /// The provider endpoint or resource does not exist.
    NotFound,
    /// A temporary provider or network failure.
    Transient,
    /// The provider answered with something that could not be understood.
    Malformed,
}

impl ConnectorErrorKind {
    /// Whether the aggregator may retry a call that failed this way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Transient => "transient",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ConnectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from one connector call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ConnectorError {
    pub kind: ConnectorErrorKind,
    pub message: String,
}

impl ConnectorError {
    pub fn new(kind: ConnectorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Timeout, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Transient, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Malformed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::NotFound, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Errors from turning a natural-language request into a structured query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    /// The request text was empty or whitespace only.
    #[error("empty request")]
    EmptyRequest,

    /// The capability answered, but not in the expected schema.
    #[error("malformed translation: {0}")]
    Malformed(String),

    /// The capability call itself failed (timeout, auth, network).
    #[error("language model unavailable: {0}")]
    CapabilityUnavailable(String),
}

/// Errors from a language-model capability call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability timed out: {0}")]
    Timeout(String),

    #[error("capability authentication failed: {0}")]
    Auth(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

/// Terminal aggregation failures. Anything less severe becomes a partial
/// failure on the [`AggregateResult`](crate::types::AggregateResult).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    /// Every dispatched catalog failed and no records were produced.
    #[error("all dataset sources failed: {}", describe_failures(.failures))]
    AllSourcesFailed {
        failures: BTreeMap<SourceId, ConnectorErrorKind>,
    },

    /// None of the targeted catalogs has a registered connector.
    #[error("no connector registered for any targeted source")]
    NoConnectors,
}

fn describe_failures(failures: &BTreeMap<SourceId, ConnectorErrorKind>) -> String {
    failures
        .iter()
        .map(|(source, kind)| format!("{source}: {kind}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the query cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The compute future panicked; every waiter receives this error.
    #[error("cache computation panicked: {0}")]
    ComputationPanicked(String),

    /// The compute future returned an aggregation error (not cached).
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// Waiting for the in-flight computation exceeded the configured bound.
    #[error("timed out after {0:?} waiting for cached computation")]
    WaitTimeout(Duration),
}

/// Invalid search configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ConnectorErrorKind::RateLimited.is_retryable());
        assert!(ConnectorErrorKind::Transient.is_retryable());
        assert!(!ConnectorErrorKind::Timeout.is_retryable());
        assert!(!ConnectorErrorKind::Unauthorized.is_retryable());
        assert!(!ConnectorErrorKind::NotFound.is_retryable());
        assert!(!ConnectorErrorKind::Malformed.is_retryable());
    }

    #[test]
    fn display_connector_error() {
        let err = ConnectorError::new(ConnectorErrorKind::RateLimited, "HTTP 429");
        assert_eq!(err.to_string(), "rate_limited: HTTP 429");
    }

    #[test]
    fn display_all_sources_failed_lists_each_source() {
        let mut failures = BTreeMap::new();
        failures.insert(SourceId::Kaggle, ConnectorErrorKind::Unauthorized);
        failures.insert(SourceId::HuggingFace, ConnectorErrorKind::Timeout);
        let err = AggregationError::AllSourcesFailed { failures };
        assert_eq!(
            err.to_string(),
            "all dataset sources failed: kaggle: unauthorized; huggingface: timeout"
        );
    }

    #[test]
    fn display_translation_errors() {
        assert_eq!(TranslationError::EmptyRequest.to_string(), "empty request");
        assert_eq!(
            TranslationError::Malformed("missing keywords".into()).to_string(),
            "malformed translation: missing keywords"
        );
    }

    #[test]
    fn cache_error_wraps_aggregation_transparently() {
        let err: CacheError = AggregationError::NoConnectors.into();
        assert_eq!(
            err.to_string(),
            "no connector registered for any targeted source"
        );
    }

    #[test]
    fn kind_serde_is_snake_case() {
        let json = serde_json::to_string(&ConnectorErrorKind::RateLimited).expect("serialize");
        assert_eq!(json, "\"rate_limited\"");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConnectorError>();
        assert_send_sync::<AggregationError>();
        assert_send_sync::<CacheError>();
        assert_send_sync::<TranslationError>();
    }
}
