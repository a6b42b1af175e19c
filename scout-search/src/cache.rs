//! Single-flight TTL cache for aggregated query results.
//!
//! Keys are [`StructuredQuery::cache_key`] digests, so reordered keywords,
//! filters or sources share one entry. Uses [`moka`] for bounded LRU
//! storage and its `try_get_with` coalescing: concurrent callers for the
//! same key await one computation and receive the same `Arc`. Failed or
//! panicked computations are never stored.
//!
//! Each entry also carries a logical `expires_at` on the tokio clock which
//! is checked on every lookup, so an entry is never served past its TTL
//! even before moka's own eviction runs.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::SearchConfig;
use crate::error::{AggregationError, CacheError};
use crate::types::{AggregateResult, StructuredQuery};

/// How a lookup treats an existing entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookup {
    /// Serve a fresh entry if present, otherwise compute.
    #[default]
    Cached,
    /// Ignore any entry and recompute.
    Bypass,
    /// Recompute only when the entry records partial failures.
    RefreshDegraded,
}

/// A value returned by [`QueryCache::get_or_compute`].
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub value: Arc<AggregateResult>,
    /// `false` when this caller ran the computation.
    pub hit: bool,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<AggregateResult>,
    expires_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(value: AggregateResult, ttl: Duration) -> Self {
        Self {
            value: Arc::new(value),
            expires_at: Instant::now() + ttl,
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Per-entry TTL for moka's background eviction.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Why a computation did not produce a value; shared with every waiter.
#[derive(Debug)]
enum ComputeFailure {
    Failed(AggregationError),
    Panicked(String),
}

impl From<&ComputeFailure> for CacheError {
    fn from(failure: &ComputeFailure) -> Self {
        match failure {
            ComputeFailure::Failed(err) => CacheError::Aggregation(err.clone()),
            ComputeFailure::Panicked(msg) => CacheError::ComputationPanicked(msg.clone()),
        }
    }
}

/// Bounded, TTL-expiring, single-flight cache of [`AggregateResult`]s.
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<String, CacheEntry>,
    ttl: Duration,
    wait_timeout: Duration,
}

impl QueryCache {
    pub fn new(max_entries: u64, ttl: Duration, wait_timeout: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();
        Self {
            inner,
            ttl,
            wait_timeout,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            config.cache_max_entries,
            config.cache_ttl(),
            config.cache_wait_timeout(),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached result for `query`, computing it at most once
    /// across concurrent callers when missing, expired, or refreshed by
    /// `lookup`. Uses the cache's default TTL.
    ///
    /// # Errors
    ///
    /// Returns the computation's [`AggregationError`] (wrapped), a
    /// [`CacheError::ComputationPanicked`] if it panicked, or
    /// [`CacheError::WaitTimeout`] if another caller's in-flight computation
    /// did not finish within the wait budget. A caller running the
    /// computation itself is never cut off by that budget. None of these
    /// outcomes are cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        query: &StructuredQuery,
        lookup: Lookup,
        compute: F,
    ) -> Result<CacheLookup, CacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<AggregateResult, AggregationError>> + Send,
    {
        self.get_or_compute_with_ttl(query, self.ttl, lookup, compute)
            .await
    }

    /// Like [`get_or_compute`](Self::get_or_compute) with an explicit TTL for
    /// a newly computed entry.
    pub async fn get_or_compute_with_ttl<F, Fut>(
        &self,
        query: &StructuredQuery,
        ttl: Duration,
        lookup: Lookup,
        compute: F,
    ) -> Result<CacheLookup, CacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<AggregateResult, AggregationError>> + Send,
    {
        let key = query.cache_key();

        match lookup {
            Lookup::Bypass => self.inner.invalidate(&key).await,
            Lookup::Cached | Lookup::RefreshDegraded => {
                if let Some(entry) = self.inner.get(&key).await {
                    if entry.is_expired() {
                        tracing::debug!(key = short(&key), "cache entry expired");
                        self.inner.invalidate(&key).await;
                    } else if lookup == Lookup::RefreshDegraded && entry.value.is_degraded() {
                        tracing::debug!(key = short(&key), "refreshing degraded cache entry");
                        self.inner.invalidate(&key).await;
                    } else {
                        tracing::debug!(key = short(&key), "cache hit");
                        return Ok(CacheLookup {
                            value: entry.value,
                            hit: true,
                        });
                    }
                }
            }
        }

        let computed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&computed);
        let init = async move {
            flag.store(true, Ordering::SeqCst);
            match AssertUnwindSafe(async move { compute().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(result)) => Ok(CacheEntry::new(result, ttl)),
                Ok(Err(err)) => Err(ComputeFailure::Failed(err)),
                Err(panic) => Err(ComputeFailure::Panicked(panic_message(panic.as_ref()))),
            }
        };

        // The wait bound applies only while another caller owns the
        // computation. Once this caller's own init runs, the aggregation's
        // deadlines bound it instead.
        let mut resolve = std::pin::pin!(self.inner.try_get_with(key.clone(), init));
        let resolved = tokio::select! {
            resolved = &mut resolve => resolved,
            () = tokio::time::sleep(self.wait_timeout) => {
                if !computed.load(Ordering::SeqCst) {
                    tracing::debug!(key = short(&key), "gave up waiting for in-flight computation");
                    return Err(CacheError::WaitTimeout(self.wait_timeout));
                }
                resolve.await
            }
        };
        let entry = resolved.map_err(|failure| CacheError::from(failure.as_ref()))?;

        let hit = !computed.load(Ordering::SeqCst);
        tracing::debug!(key = short(&key), hit, "cache lookup resolved");
        Ok(CacheLookup {
            value: entry.value,
            hit,
        })
    }

    /// Fresh cached result for `query`, if any.
    pub async fn get(&self, query: &StructuredQuery) -> Option<Arc<AggregateResult>> {
        let key = query.cache_key();
        let entry = self.inner.get(&key).await?;
        if entry.is_expired() {
            self.inner.invalidate(&key).await;
            return None;
        }
        Some(entry.value)
    }

    pub async fn invalidate(&self, query: &StructuredQuery) {
        self.inner.invalidate(&query.cache_key()).await;
    }

    /// Drop expired entries and run pending evictions now.
    pub async fn sweep(&self) {
        let expired: Vec<Arc<String>> = self
            .inner
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key)
            .collect();
        for key in expired {
            self.inner.invalidate(key.as_ref()).await;
        }
        self.inner.run_pending_tasks().await;
    }

    /// Approximate entry count; exact after [`sweep`](Self::sweep).
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entry_count())
            .field("ttl", &self.ttl)
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
