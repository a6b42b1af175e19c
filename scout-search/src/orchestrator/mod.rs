//! Aggregation orchestrator: concurrent fetches, retries, dedup, ranking.
//!
//! This module fans a structured query out to every targeted catalog
//! concurrently, retries recoverable failures within a per-source deadline,
//! normalises and merges the payloads, and returns a deterministically
//! ranked, truncated result set.

pub mod aggregate;
pub mod dedup;
pub mod ranking;
pub(crate) mod retry;

pub use aggregate::aggregate;
