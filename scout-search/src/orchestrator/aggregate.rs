//! Concurrent multi-catalog fan-out, normalisation, merge and rank.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinSet;

use crate::config::SearchConfig;
use crate::connector::ConnectorRegistry;
use crate::error::{AggregationError, ConnectorError, ConnectorErrorKind};
use crate::normalize::normalize;
use crate::types::{AggregateResult, RawSourceResult, SourceId, StructuredQuery};

use super::dedup::{absorb_near_duplicates, merge_by_natural_key};
use super::ranking::rank;
use super::retry::{fetch_with_retry, RetryPolicy};

/// Aggregate results for `query` across every targeted, registered catalog.
///
/// # Pipeline
///
/// 1. Spawn one task per targeted source that has a connector
/// 2. Retry rate-limited and transient failures with backoff
/// 3. Wait for every task or the overall deadline; abort stragglers
/// 4. Normalise successful payloads in [`SourceId`] order
/// 5. Merge by natural key, rank, fold cross-catalog duplicates
/// 6. Truncate to `config.max_results`
///
/// # Errors
///
/// Returns [`AggregationError::NoConnectors`] when nothing could be
/// dispatched, and [`AggregationError::AllSourcesFailed`] only when every
/// dispatched source failed and no record was produced. Anything less is
/// reported through [`AggregateResult::partial_failures`].
pub async fn aggregate(
    query: &StructuredQuery,
    connectors: &ConnectorRegistry,
    config: &SearchConfig,
) -> Result<AggregateResult, AggregationError> {
    let query = Arc::new(query.canonical());
    let policy = RetryPolicy::from_config(config);
    let deadline = tokio::time::Instant::now() + config.overall_deadline();

    tracing::trace!(keywords = ?query.keywords(), "aggregating query");

    // 1. Fan out, one task per source.
    let mut set = JoinSet::new();
    let mut pending: BTreeSet<SourceId> = BTreeSet::new();

    for &source in query.target_sources() {
        let Some(connector) = connectors.get(source) else {
            tracing::info!(%source, "no connector registered, skipping source");
            continue;
        };
        let query = Arc::clone(&query);
        pending.insert(source);
        set.spawn(async move {
            let outcome = AssertUnwindSafe(fetch_with_retry(connector, query, policy))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(ConnectorError::transient(format!(
                        "connector panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
            (source, outcome)
        });
    }

    if pending.is_empty() {
        return Err(AggregationError::NoConnectors);
    }
    let dispatched = pending.len();

    // 2-3. Collect until every task finished or the deadline passed.
    let mut successes: BTreeMap<SourceId, RawSourceResult> = BTreeMap::new();
    let mut failures: BTreeMap<SourceId, ConnectorErrorKind> = BTreeMap::new();
    let mut deadline_hit = false;

    loop {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((source, outcome)))) => {
                pending.remove(&source);
                match outcome {
                    Ok(raw) if raw.source != source => {
                        tracing::warn!(%source, reported = %raw.source, "connector reported a different source");
                        failures.insert(source, ConnectorErrorKind::Malformed);
                    }
                    Ok(raw) => {
                        successes.insert(source, raw);
                    }
                    Err(err) => {
                        tracing::warn!(%source, error = %err, "source failed");
                        failures.insert(source, err.kind);
                    }
                }
            }
            Ok(Some(Err(join_err))) => {
                tracing::warn!(error = %join_err, "connector task did not complete");
            }
            Ok(None) => break,
            Err(_) => {
                deadline_hit = true;
                set.abort_all();
                break;
            }
        }
    }

    let straggler_kind = if deadline_hit {
        ConnectorErrorKind::Timeout
    } else {
        ConnectorErrorKind::Transient
    };
    for source in pending {
        tracing::warn!(%source, kind = %straggler_kind, "source did not finish");
        failures.insert(source, straggler_kind);
    }

    // 4. Normalise in source order, independent of arrival order.
    let mut records = Vec::new();
    let mut dropped_items = 0;
    for raw in successes.values() {
        let normalized = normalize(raw);
        dropped_items += normalized.dropped;
        records.extend(normalized.records);
    }

    if records.is_empty() && failures.len() == dispatched {
        return Err(AggregationError::AllSourcesFailed { failures });
    }

    // 5. Merge, rank, fold duplicates.
    let mut records = merge_by_natural_key(records);
    rank(&mut records, config);
    let (mut records, absorbed_duplicates) =
        absorb_near_duplicates(records, config.dedup_similarity_threshold);

    // 6. Truncate.
    records.truncate(config.max_results);

    tracing::info!(
        sources = dispatched,
        failed = failures.len(),
        records = records.len(),
        dropped_items,
        absorbed_duplicates,
        "aggregation complete"
    );

    Ok(AggregateResult {
        query: Arc::unwrap_or_clone(query),
        records,
        partial_failures: failures,
        dropped_items,
        absorbed_duplicates,
        completed_at: Utc::now(),
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(boxed.as_ref()), "kaboom");
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn empty_registry_is_no_connectors() {
        let query = StructuredQuery::from_keywords(["x"]);
        let err = aggregate(&query, &ConnectorRegistry::new(), &SearchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, AggregationError::NoConnectors);
    }
}
