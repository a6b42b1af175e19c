//! Deterministic ranking of merged records.

use std::cmp::Ordering;

use crate::config::SearchConfig;
use crate::types::DatasetRecord;

/// Sort by score descending, then configured source priority, then title,
/// then external id. The order is total, so equal inputs always produce the
/// same output.
pub fn rank(records: &mut [DatasetRecord], config: &SearchConfig) {
    records.sort_by(|a, b| compare(a, b, config));
}

fn compare(a: &DatasetRecord, b: &DatasetRecord, config: &SearchConfig) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| config.priority_of(a.source).cmp(&config.priority_of(b.source)))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.external_id.cmp(&b.external_id))
}
