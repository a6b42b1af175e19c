//! Mapping of provider payloads onto [`DatasetRecord`].
//!
//! Each catalog has a field map of JSON pointers with fallbacks. Scores are
//! assigned so that provider-ranked items always land in `[0.5, 1.0]` and
//! unranked items in a band strictly below, with position decay:
//!
//! ```text
//! ranked   = 0.5 + 0.5 * (raw - min) / (max - min)
//! unranked = 0.4 / (1.0 + position * 0.1)
//! ```
//!
//! A batch whose provider scores are all equal (a single ranked item, for
//! instance) has no spread to rescale, so each item is placed against the
//! catalog's fixed score ceiling instead: `0.5 + 0.5 * raw / ceiling`. A
//! lone 0.2-rated dataset therefore scores 0.6, not 1.0.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::types::{DatasetRecord, RawSourceResult, SourceId};

/// Ceiling of the score band used for items without a provider score.
const UNRANKED_CEILING: f64 = 0.4;

/// Records produced from one payload plus the count of discarded items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub records: Vec<DatasetRecord>,
    pub dropped: usize,
}

struct FieldMap {
    id: &'static [&'static str],
    title: &'static [&'static str],
    description: &'static [&'static str],
    url: &'static [&'static str],
    size: &'static [&'static str],
    tags: &'static str,
    score: Option<&'static str>,
    /// Largest raw score the catalog reports.
    score_ceiling: f64,
    url_template: &'static str,
}

const KAGGLE: FieldMap = FieldMap {
    id: &["/ref", "/id"],
    title: &["/title"],
    description: &["/subtitle", "/description"],
    url: &["/url"],
    size: &["/totalBytes", "/size"],
    tags: "/tags",
    score: Some("/usabilityRating"),
    score_ceiling: 1.0,
    url_template: "https://www.kaggle.com/datasets/{id}",
};

const HUGGING_FACE: FieldMap = FieldMap {
    id: &["/id"],
    title: &["/cardData/pretty_name", "/id"],
    description: &["/description", "/cardData/description"],
    url: &[],
    size: &["/usedStorage"],
    tags: "/tags",
    score: None,
    score_ceiling: 1.0,
    url_template: "https://huggingface.co/datasets/{id}",
};

const GOOGLE_DATASET: FieldMap = FieldMap {
    id: &["/id"],
    title: &["/title"],
    description: &["/description"],
    url: &["/url"],
    size: &[],
    tags: "/tags",
    score: None,
    score_ceiling: 1.0,
    url_template: "https://datasetsearch.research.google.com/search?docid={id}",
};

fn field_map(source: SourceId) -> &'static FieldMap {
    match source {
        SourceId::Kaggle => &KAGGLE,
        SourceId::HuggingFace => &HUGGING_FACE,
        SourceId::GoogleDataset => &GOOGLE_DATASET,
    }
}

/// Map one provider payload onto records.
///
/// Items missing an id or title are dropped and counted. A payload that is
/// not a JSON array produces no records.
pub fn normalize(raw: &RawSourceResult) -> Normalized {
    let items = match raw.payload.as_array() {
        Some(items) => items,
        None => {
            tracing::warn!(source = %raw.source, "payload is not a list, ignoring");
            return Normalized::default();
        }
    };

    let map = field_map(raw.source);
    let mut dropped = 0;
    let mut kept: Vec<(DatasetRecord, Option<f64>)> = Vec::with_capacity(items.len());

    for item in items {
        match to_record(raw, map, item) {
            Some(entry) => kept.push(entry),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(source = %raw.source, dropped, "dropped items missing id or title");
    }

    Normalized {
        records: assign_scores(kept, map.score_ceiling),
        dropped,
    }
}

/// Map a single provider item, as returned by a catalog's detail endpoint.
///
/// Returns `None` when the item lacks an id or title.
pub fn normalize_item(source: SourceId, item: &Value) -> Option<DatasetRecord> {
    let raw = RawSourceResult::new(source, Value::Array(vec![item.clone()]));
    normalize(&raw).records.into_iter().next()
}

fn to_record(
    raw: &RawSourceResult,
    map: &FieldMap,
    item: &Value,
) -> Option<(DatasetRecord, Option<f64>)> {
    let external_id = first_string(item, map.id)?;
    let title = first_string(item, map.title)?;
    let description = first_string(item, map.description).unwrap_or_default();
    let url = first_string(item, map.url)
        .unwrap_or_else(|| map.url_template.replace("{id}", &external_id));
    let size_estimate = map.size.iter().find_map(|p| item.pointer(p).and_then(as_size));
    let tags = collect_tags(item.pointer(map.tags));
    let raw_score = map
        .score
        .and_then(|p| item.pointer(p))
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite());

    let record = DatasetRecord {
        source: raw.source,
        external_id,
        title,
        description,
        url,
        size_estimate,
        tags,
        score: 0.0,
        fetched_at: raw.fetched_at,
        merged_from: BTreeSet::new(),
    };
    Some((record, raw_score))
}

/// First pointer resolving to a non-empty string (numbers are stringified).
fn first_string(item: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| {
        let value = match item.pointer(p)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    })
}

fn as_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Tags may be plain strings or objects carrying a `name`.
fn collect_tags(value: Option<&Value>) -> BTreeSet<String> {
    let Some(Value::Array(tags)) = value else {
        return BTreeSet::new();
    };
    tags.iter()
        .filter_map(|tag| match tag {
            Value::String(s) => Some(s.as_str()),
            Value::Object(_) => tag.get("name").and_then(Value::as_str),
            _ => None,
        })
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn assign_scores(kept: Vec<(DatasetRecord, Option<f64>)>, ceiling: f64) -> Vec<DatasetRecord> {
    let (min, max) = kept
        .iter()
        .filter_map(|(_, s)| *s)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s), hi.max(s))
        });
    let range = max - min;

    kept.into_iter()
        .enumerate()
        .map(|(position, (mut record, raw_score))| {
            record.score = match raw_score {
                Some(raw) if range > f64::EPSILON => {
                    0.5 + 0.5 * ((raw - min) / range).clamp(0.0, 1.0)
                }
                Some(raw) => 0.5 + 0.5 * (raw / ceiling).clamp(0.0, 1.0),
                None => unranked_score(position),
            };
            record
        })
        .collect()
}

/// Score for an item without a provider score at `position` (0-based).
pub fn unranked_score(position: usize) -> f64 {
    UNRANKED_CEILING / (1.0 + position as f64 * 0.1)
}
