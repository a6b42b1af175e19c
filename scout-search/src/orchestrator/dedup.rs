//! Record deduplication.
//!
//! Two passes: an exact merge on the natural key `(source, external_id)`,
//! then a cross-catalog pass that folds records describing the same dataset
//! (same normalised title, overlapping descriptions) into the higher-ranked
//! one.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{DatasetRecord, SourceId};

/// Merge records sharing a natural key. The later `fetched_at` wins; on a
/// tie the record appearing later in the input wins.
pub fn merge_by_natural_key(records: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
    let mut merged: BTreeMap<(SourceId, String), DatasetRecord> = BTreeMap::new();

    for record in records {
        let key = (record.source, record.external_id.clone());
        match merged.get(&key) {
            Some(existing) if existing.fetched_at > record.fetched_at => {}
            _ => {
                merged.insert(key, record);
            }
        }
    }

    merged.into_values().collect()
}

/// Fold cross-catalog near-duplicates in an already ranked list.
///
/// A record is absorbed into an earlier (higher-ranked) record when both
/// titles normalise to the same string, the records come from different
/// catalogs, the earlier record has not already absorbed that catalog, and
/// the description similarity reaches `threshold`. Returns the surviving
/// records in their original order and the number absorbed.
pub fn absorb_near_duplicates(
    ranked: Vec<DatasetRecord>,
    threshold: f64,
) -> (Vec<DatasetRecord>, usize) {
    let mut kept: Vec<DatasetRecord> = Vec::with_capacity(ranked.len());
    let mut by_title: HashMap<String, Vec<usize>> = HashMap::new();
    let mut absorbed = 0;

    for record in ranked {
        let title_key = normalize_title(&record.title);
        let target = by_title.get(&title_key).and_then(|candidates| {
            candidates.iter().copied().find(|&i| {
                let keeper = &kept[i];
                keeper.source != record.source
                    && !keeper.merged_from.contains(&record.source)
                    && description_similarity(&keeper.description, &record.description)
                        >= threshold
            })
        });

        match target {
            Some(i) => {
                let keeper = &mut kept[i];
                tracing::trace!(
                    kept = %keeper.external_id,
                    absorbed = %record.external_id,
                    "absorbed cross-source duplicate"
                );
                keeper.tags.extend(record.tags);
                keeper.merged_from.insert(record.source);
                keeper.merged_from.extend(record.merged_from);
                absorbed += 1;
            }
            None => {
                by_title.entry(title_key).or_default().push(kept.len());
                kept.push(record);
            }
        }
    }

    (kept, absorbed)
}

/// Lower-case, map non-alphanumerics to spaces, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> BTreeSet<String> {
    normalize_title(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Jaccard overlap of description tokens. Two empty descriptions are
/// identical; one empty description matches nothing.
pub fn description_similarity(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => {
            let shared = a.intersection(&b).count();
            let total = a.union(&b).count();
            shared as f64 / total as f64
        }
    }
}
