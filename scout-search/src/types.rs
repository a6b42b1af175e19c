//! Core types: catalog identifiers, structured queries, raw and normalised
//! records, and the aggregated result handed to callers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorErrorKind;

/// External dataset catalogs that scout-search can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceId {
    /// Kaggle datasets (`kaggle.com/datasets`).
    #[serde(rename = "kaggle")]
    Kaggle,
    /// Hugging Face Hub datasets.
    #[serde(rename = "huggingface")]
    HuggingFace,
    /// Google Dataset Search.
    #[serde(rename = "google_dataset")]
    GoogleDataset,
}

impl SourceId {
    /// Returns the stable identifier used in config files and JSON output.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Kaggle => "kaggle",
            Self::HuggingFace => "huggingface",
            Self::GoogleDataset => "google_dataset",
        }
    }

    /// Returns the human-readable catalog name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kaggle => "Kaggle",
            Self::HuggingFace => "Hugging Face",
            Self::GoogleDataset => "Google Dataset Search",
        }
    }

    /// Returns all known catalogs in their default priority order.
    pub fn all() -> &'static [SourceId] {
        &[Self::Kaggle, Self::HuggingFace, Self::GoogleDataset]
    }

    /// Parse a loosely written catalog name.
    ///
    /// Accepts the spellings users and language models tend to produce:
    /// `"hf"`, `"Hugging Face"`, `"google"`, `"Google Dataset Search"`, and
    /// names followed by trailing prose such as
    /// `"kaggle as per user's preference"`.
    pub fn from_alias(raw: &str) -> Option<Self> {
        let compact: String = raw
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '[' || c == ']')
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match compact.as_str() {
            "kaggle" => return Some(Self::Kaggle),
            "huggingface" | "hugging" | "hf" | "hfhub" => return Some(Self::HuggingFace),
            "google" | "googledata" | "googledataset" | "googledatasets"
            | "googledatasetsearch" => return Some(Self::GoogleDataset),
            _ => {}
        }

        if compact.contains("kaggle") {
            Some(Self::Kaggle)
        } else if compact.contains("huggingface") {
            Some(Self::HuggingFace)
        } else if compact.contains("google") {
            Some(Self::GoogleDataset)
        } else {
            None
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| format!("unknown dataset source: {s}"))
    }
}

/// Machine-usable representation of a user's dataset search intent.
///
/// Keywords are lower-cased, whitespace-collapsed and deduplicated on
/// construction, keeping first-occurrence order. Equality and hashing of
/// cache keys go through [`StructuredQuery::canonical`], so two queries that
/// differ only in keyword order are the same query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredQuery {
    keywords: Vec<String>,
    filters: BTreeMap<String, String>,
    target_sources: BTreeSet<SourceId>,
}

impl StructuredQuery {
    /// Build a query. An empty `target_sources` means every known catalog.
    pub fn new<I, S>(
        keywords: I,
        filters: BTreeMap<String, String>,
        target_sources: BTreeSet<SourceId>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let keywords = keywords
            .into_iter()
            .map(|k| normalize_keyword(k.as_ref()))
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.clone()))
            .collect();

        let filters = filters
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();

        let target_sources = if target_sources.is_empty() {
            SourceId::all().iter().copied().collect()
        } else {
            target_sources
        };

        Self {
            keywords,
            filters,
            target_sources,
        }
    }

    /// Keyword-only query against every known catalog.
    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(keywords, BTreeMap::new(), BTreeSet::new())
    }

    /// Returns a copy targeting `sources` instead (all catalogs if empty).
    pub fn with_target_sources(&self, sources: BTreeSet<SourceId>) -> Self {
        Self::new(self.keywords.iter(), self.filters.clone(), sources)
    }

    /// Returns a copy with an additional filter.
    pub fn with_filter(&self, name: &str, value: &str) -> Self {
        let mut filters = self.filters.clone();
        filters.insert(name.to_string(), value.to_string());
        Self::new(self.keywords.iter(), filters, self.target_sources.clone())
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn target_sources(&self) -> &BTreeSet<SourceId> {
        &self.target_sources
    }

    /// Keywords joined into a single provider search string.
    pub fn search_text(&self) -> String {
        self.keywords.join(" ")
    }

    /// Returns the canonical form: keywords sorted. Filters and sources are
    /// already kept in sorted maps/sets.
    pub fn canonical(&self) -> Self {
        let mut keywords = self.keywords.clone();
        keywords.sort();
        Self {
            keywords,
            filters: self.filters.clone(),
            target_sources: self.target_sources.clone(),
        }
    }

    /// Deterministic hex digest of the canonical form, stable across runs.
    pub fn cache_key(&self) -> String {
        let canonical = self.canonical();
        let mut hasher = blake3::Hasher::new();
        for keyword in &canonical.keywords {
            hasher.update(b"k\0");
            hasher.update(keyword.as_bytes());
            hasher.update(b"\0");
        }
        for (name, value) in &canonical.filters {
            hasher.update(b"f\0");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\0");
        }
        for source in &canonical.target_sources {
            hasher.update(b"s\0");
            hasher.update(source.key().as_bytes());
            hasher.update(b"\0");
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl PartialEq for StructuredQuery {
    fn eq(&self, other: &Self) -> bool {
        let a = self.canonical();
        let b = other.canonical();
        a.keywords == b.keywords
            && a.filters == b.filters
            && a.target_sources == b.target_sources
    }
}

impl Eq for StructuredQuery {}

fn normalize_keyword(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Provider-shaped payload returned by a connector, before normalisation.
#[derive(Debug, Clone)]
pub struct RawSourceResult {
    /// Which catalog produced this payload.
    pub source: SourceId,
    /// Provider-specific JSON document (a list of provider items).
    pub payload: serde_json::Value,
    /// When the payload was received.
    pub fetched_at: DateTime<Utc>,
}

impl RawSourceResult {
    /// Wrap a payload fetched just now.
    pub fn new(source: SourceId, payload: serde_json::Value) -> Self {
        Self {
            source,
            payload,
            fetched_at: Utc::now(),
        }
    }
}

/// A dataset in the unified schema shared by every catalog.
///
/// `(source, external_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub source: SourceId,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    /// Size in bytes, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_estimate: Option<u64>,
    pub tags: BTreeSet<String>,
    /// Normalised relevance score; higher is better.
    pub score: f64,
    pub fetched_at: DateTime<Utc>,
    /// Other catalogs whose near-duplicate of this dataset was absorbed.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub merged_from: BTreeSet<SourceId>,
}

impl DatasetRecord {
    pub fn natural_key(&self) -> (SourceId, &str) {
        (self.source, self.external_id.as_str())
    }
}

/// How complete an [`AggregateResult`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultStatus {
    /// Every targeted catalog answered.
    Complete,
    /// Some catalogs failed; `degraded` of them did not contribute.
    Partial { degraded: usize },
}

/// The ranked, merged outcome of one aggregation. This is the cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// The query in canonical form.
    pub query: StructuredQuery,
    /// Records in rank order.
    pub records: Vec<DatasetRecord>,
    /// Catalogs that ended in a non-recovered failure, with the reason.
    pub partial_failures: BTreeMap<SourceId, ConnectorErrorKind>,
    /// Provider items discarded by the normaliser for missing required fields.
    pub dropped_items: usize,
    /// Records folded into a near-duplicate from another catalog.
    pub absorbed_duplicates: usize,
    pub completed_at: DateTime<Utc>,
}

impl AggregateResult {
    pub fn status(&self) -> ResultStatus {
        if self.partial_failures.is_empty() {
            ResultStatus::Complete
        } else {
            ResultStatus::Partial {
                degraded: self.partial_failures.len(),
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.partial_failures.is_empty()
    }

    /// Catalogs that contributed at least one record (including absorbed ones).
    pub fn contributing_sources(&self) -> BTreeSet<SourceId> {
        self.records
            .iter()
            .flat_map(|r| std::iter::once(r.source).chain(r.merged_from.iter().copied()))
            .collect()
    }
}
