//! Bounded retry with exponential backoff for a single connector.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::types::{RawSourceResult, StructuredQuery};

/// Per-source attempt budget derived from [`SearchConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub per_attempt: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            per_attempt: config.per_source_deadline(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Delay before retry number `attempt + 1`: `backoff * 2^attempt`,
    /// capped at the per-attempt deadline.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.min(63);
        let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let base_ms = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX);
        let cap_ms = u64::try_from(self.per_attempt.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(multiplier).min(cap_ms))
    }
}

/// Run `connector.fetch`, retrying rate-limited and transient failures.
///
/// Every attempt is bounded by `policy.per_attempt` even when the connector
/// ignores the deadline it is handed.
pub(crate) async fn fetch_with_retry(
    connector: Arc<dyn Connector>,
    query: Arc<StructuredQuery>,
    policy: RetryPolicy,
) -> Result<RawSourceResult, ConnectorError> {
    let source = connector.source();
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0u32;

    loop {
        let outcome = match tokio::time::timeout(
            policy.per_attempt,
            connector.fetch(&query, policy.per_attempt),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ConnectorError::timeout(format!(
                "no response within {:?}",
                policy.per_attempt
            ))),
        };

        match outcome {
            Ok(raw) => return Ok(raw),
            Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(%source, attempt, ?delay, error = %err, "retrying connector");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
