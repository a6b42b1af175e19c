//! Search configuration with safe defaults.
//!
//! [`SearchConfig`] controls deadlines, retries, caching, tie-break priority
//! and deduplication. The defaults never produce zero deadlines or unbounded
//! retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::SourceId;

/// Upper bound on `max_retries`; anything larger is rejected by `validate`.
const MAX_RETRY_BOUND: u32 = 5;

/// Configuration for query orchestration and caching.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Deadline for a single connector attempt, in milliseconds.
    pub per_source_deadline_ms: u64,
    /// Deadline for the whole fan-out, in milliseconds.
    pub overall_deadline_ms: u64,
    /// Additional attempts for rate-limited or transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries, in milliseconds.
    pub retry_backoff_ms: u64,
    /// How long aggregated results stay cached, in seconds.
    pub cache_ttl_seconds: u64,
    /// Maximum number of cached query results.
    pub cache_max_entries: u64,
    /// How long a caller waits for another caller's in-flight computation.
    pub cache_wait_timeout_ms: u64,
    /// Tie-break order for equally scored records. Unlisted sources sort last.
    pub source_priority: Vec<SourceId>,
    /// Description token-overlap needed to treat same-titled records from
    /// different catalogs as one dataset.
    pub dedup_similarity_threshold: f64,
    /// Maximum number of records returned after ranking.
    pub max_results: usize,
    /// Maximum number of items requested from each catalog.
    pub max_results_per_source: usize,
    /// Deadline for the language-model translation call, in milliseconds.
    pub translation_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_source_deadline_ms: 8_000,
            overall_deadline_ms: 15_000,
            max_retries: 2,
            retry_backoff_ms: 250,
            cache_ttl_seconds: 3_600,
            cache_max_entries: 256,
            cache_wait_timeout_ms: 20_000,
            source_priority: SourceId::all().to_vec(),
            dedup_similarity_threshold: 0.8,
            max_results: 50,
            max_results_per_source: 10,
            translation_timeout_ms: 20_000,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - every deadline and timeout must be greater than 0
    /// - `overall_deadline_ms` must be >= `per_source_deadline_ms`
    /// - `cache_wait_timeout_ms` must be >= `overall_deadline_ms`
    /// - `max_retries` must be at most 5
    /// - `cache_max_entries`, `max_results` and `max_results_per_source` must be > 0
    /// - `dedup_similarity_threshold` must be in `(0, 1]`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_source_deadline_ms == 0 {
            return Err(ConfigError(
                "per_source_deadline_ms must be greater than 0".into(),
            ));
        }
        if self.overall_deadline_ms < self.per_source_deadline_ms {
            return Err(ConfigError(
                "overall_deadline_ms must be >= per_source_deadline_ms".into(),
            ));
        }
        if self.max_retries > MAX_RETRY_BOUND {
            return Err(ConfigError(format!(
                "max_retries must be at most {MAX_RETRY_BOUND}"
            )));
        }
        if self.cache_ttl_seconds == 0 {
            return Err(ConfigError(
                "cache_ttl_seconds must be greater than 0".into(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(ConfigError(
                "cache_max_entries must be greater than 0".into(),
            ));
        }
        if self.cache_wait_timeout_ms < self.overall_deadline_ms {
            return Err(ConfigError(
                "cache_wait_timeout_ms must be >= overall_deadline_ms".into(),
            ));
        }
        if !(self.dedup_similarity_threshold > 0.0 && self.dedup_similarity_threshold <= 1.0) {
            return Err(ConfigError(
                "dedup_similarity_threshold must be in (0, 1]".into(),
            ));
        }
        if self.max_results == 0 {
            return Err(ConfigError("max_results must be greater than 0".into()));
        }
        if self.max_results_per_source == 0 {
            return Err(ConfigError(
                "max_results_per_source must be greater than 0".into(),
            ));
        }
        if self.translation_timeout_ms == 0 {
            return Err(ConfigError(
                "translation_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn per_source_deadline(&self) -> Duration {
        Duration::from_millis(self.per_source_deadline_ms)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn cache_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_wait_timeout_ms)
    }

    pub fn translation_timeout(&self) -> Duration {
        Duration::from_millis(self.translation_timeout_ms)
    }

    /// Position of `source` in the tie-break order; unlisted sources sort last.
    pub fn priority_of(&self, source: SourceId) -> usize {
        self.source_priority
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.source_priority.len())
    }
}
