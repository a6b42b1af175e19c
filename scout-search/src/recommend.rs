//! Dataset recommendations over a ranked result set.
//!
//! The language model reviews the top records for a request and picks the
//! most suitable ones with a short reason each. When the model is
//! unreachable or its answer does not fit [`ResponseSchema::recommendation`],
//! a keyword-overlap heuristic over the same ranked records is used, so a
//! recommendation is always produced for a non-empty request.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SearchConfig;
use crate::error::TranslationError;
use crate::intent::{extract_json, keyword_query, LlmCapability, ResponseSchema};
use crate::types::{DatasetRecord, SourceId};

/// Records shown to the model.
pub const MAX_REVIEWED: usize = 10;

/// Records picked by the heuristic.
const HEURISTIC_PICKS: usize = 3;

/// Description prefix shown per record in the prompt.
const DESCRIPTION_CHARS: usize = 200;

impl ResponseSchema {
    /// Schema for a recommendation over numbered datasets.
    pub fn recommendation() -> Self {
        Self {
            name: "dataset_recommendation",
            schema: json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string"},
                    "picks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "index": {"type": "integer", "minimum": 1},
                                "reason": {"type": "string"}
                            },
                            "required": ["index", "reason"]
                        }
                    }
                },
                "required": ["summary", "picks"]
            }),
        }
    }
}

/// How a [`Recommendation`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrategy {
    Llm,
    /// Keyword overlap over the ranked records.
    Heuristic,
}

/// One recommended dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub source: SourceId,
    pub external_id: String,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub summary: String,
    /// Best first.
    pub picks: Vec<Pick>,
    pub strategy: RecommendationStrategy,
}

/// Produces [`Recommendation`]s through an [`LlmCapability`].
#[derive(Debug, Clone)]
pub struct Recommender {
    timeout: Duration,
}

impl Default for Recommender {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

impl Recommender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Uses the translation timeout for the model call.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.translation_timeout())
    }

    /// Recommend datasets from `records` (in rank order) for `request`.
    ///
    /// Only the first [`MAX_REVIEWED`] records are considered. An empty
    /// record list yields an empty recommendation without calling the model.
    ///
    /// # Errors
    ///
    /// [`TranslationError::EmptyRequest`] for blank request text. Model
    /// failures fall back to the heuristic instead of erroring.
    pub async fn recommend(
        &self,
        request: &str,
        records: &[DatasetRecord],
        capability: &dyn LlmCapability,
    ) -> Result<Recommendation, TranslationError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(TranslationError::EmptyRequest);
        }
        let reviewed = &records[..records.len().min(MAX_REVIEWED)];
        if reviewed.is_empty() {
            return Ok(Recommendation {
                summary: "No datasets matched the request.".to_owned(),
                picks: Vec::new(),
                strategy: RecommendationStrategy::Heuristic,
            });
        }

        let prompt = recommendation_prompt(request, reviewed);
        let schema = ResponseSchema::recommendation();
        let answer = match tokio::time::timeout(self.timeout, capability.complete(&prompt, &schema))
            .await
        {
            Ok(Ok(response)) => parse_recommendation(&response, reviewed),
            Ok(Err(err)) => Err(TranslationError::CapabilityUnavailable(err.to_string())),
            Err(_) => Err(TranslationError::CapabilityUnavailable(format!(
                "no response within {:?}",
                self.timeout
            ))),
        };

        match answer {
            Ok(recommendation) => Ok(recommendation),
            Err(err) => {
                tracing::warn!(error = %err, "recommendation unavailable, using heuristic");
                Ok(heuristic_recommendation(request, reviewed))
            }
        }
    }
}

fn recommendation_prompt(request: &str, records: &[DatasetRecord]) -> String {
    let mut listing = String::new();
    for (i, record) in records.iter().enumerate() {
        let description: String = record.description.chars().take(DESCRIPTION_CHARS).collect();
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).take(5).collect();
        listing.push_str(&format!(
            "{}. {} ({})\n   {}\n   tags: {}\n   {}\n",
            i + 1,
            record.title,
            record.source,
            if description.is_empty() { "no description" } else { description.as_str() },
            if tags.is_empty() { "none".to_owned() } else { tags.join(", ") },
            record.url,
        ));
    }
    format!(
        "You help users choose datasets. Review the numbered datasets below and \
         pick the ones that best fit the request, best first.\n\n\
         Request: {request}\n\nDatasets:\n{listing}\n\
         Answer with a JSON object:\n\
         {{\"summary\": \"one or two sentences\", \
         \"picks\": [{{\"index\": 1, \"reason\": \"why it fits\"}}]}}\n\
         Only use indices from the list."
    )
}

/// Parse a model answer against the numbered `records`.
///
/// Indices are 1-based. Out-of-range and repeated indices are skipped.
///
/// # Errors
///
/// [`TranslationError::Malformed`] if no JSON object is found, `summary` is
/// missing or blank, or no pick refers to a listed record.
pub fn parse_recommendation(
    response: &Value,
    records: &[DatasetRecord],
) -> Result<Recommendation, TranslationError> {
    let object = match response {
        Value::Object(_) => response.clone(),
        Value::String(text) => extract_json(text)
            .ok_or_else(|| TranslationError::Malformed("no JSON object in response".into()))?,
        _ => {
            return Err(TranslationError::Malformed(
                "response is neither an object nor text".into(),
            ))
        }
    };

    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TranslationError::Malformed("missing summary".into()))?
        .to_owned();

    let raw_picks = object
        .get("picks")
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::Malformed("picks must be a list".into()))?;

    let mut seen = BTreeSet::new();
    let mut picks = Vec::new();
    for raw in raw_picks {
        let Some(index) = raw.get("index").and_then(Value::as_u64) else {
            continue;
        };
        let Some(record) = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| records.get(i))
        else {
            tracing::debug!(index, "recommendation names an unlisted dataset");
            continue;
        };
        if !seen.insert(index) {
            continue;
        }
        let reason = raw
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_owned();
        picks.push(pick(record, reason));
    }

    if picks.is_empty() {
        return Err(TranslationError::Malformed(
            "no pick refers to a listed dataset".into(),
        ));
    }
    Ok(Recommendation {
        summary,
        picks,
        strategy: RecommendationStrategy::Llm,
    })
}

/// Deterministic recommendation: the top-ranked records, each explained by
/// the request keywords it mentions.
pub fn heuristic_recommendation(request: &str, records: &[DatasetRecord]) -> Recommendation {
    let query = keyword_query(request);
    let picks: Vec<Pick> = records
        .iter()
        .take(HEURISTIC_PICKS)
        .map(|record| {
            let matched = matched_keywords(query.keywords(), record);
            let reason = if matched.is_empty() {
                format!("ranked highly by {}", record.source)
            } else {
                format!("mentions {}", matched.join(", "))
            };
            pick(record, reason)
        })
        .collect();

    let titles: Vec<String> = picks
        .iter()
        .map(|p| format!("{} ({})", p.title, p.source))
        .collect();
    let summary = format!(
        "Top {} of {} datasets by relevance: {}.",
        picks.len(),
        records.len(),
        titles.join("; ")
    );
    Recommendation {
        summary,
        picks,
        strategy: RecommendationStrategy::Heuristic,
    }
}

fn matched_keywords(keywords: &[String], record: &DatasetRecord) -> Vec<String> {
    let text = format!("{} {}", record.title, record.description).to_lowercase();
    let words: BTreeSet<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();
    keywords
        .iter()
        .filter(|k| words.contains(k.as_str()) || record.tags.contains(*k))
        .cloned()
        .collect()
}

fn pick(record: &DatasetRecord, reason: String) -> Pick {
    Pick {
        source: record.source,
        external_id: record.external_id.clone(),
        title: record.title.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::error::CapabilityError;

    struct ScriptedCapability {
        response: Mutex<Option<Result<Value, CapabilityError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCapability {
        fn new(response: Result<Value, CapabilityError>) -> Self {
            Self {
                response: Mutex::new(Some(response)),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmCapability for ScriptedCapability {
        async fn complete(
            &self,
            prompt: &str,
            schema: &ResponseSchema,
        ) -> Result<Value, CapabilityError> {
            assert_eq!(schema.name, "dataset_recommendation");
            self.prompts.lock().expect("lock").push(prompt.to_owned());
            self.response
                .lock()
                .expect("lock")
                .take()
                .unwrap_or_else(|| Err(CapabilityError::Unavailable("exhausted".into())))
        }
    }

    fn record(source: SourceId, id: &str, title: &str, description: &str) -> DatasetRecord {
        DatasetRecord {
            source,
            external_id: id.to_owned(),
            title: title.to_owned(),
            description: description.to_owned(),
            url: format!("https://example.org/{id}"),
            size_estimate: None,
            tags: BTreeSet::from(["economics".to_owned()]),
            score: 0.9,
            fetched_at: Utc::now(),
            merged_from: BTreeSet::new(),
        }
    }

    fn housing_records() -> Vec<DatasetRecord> {
        vec![
            record(
                SourceId::Kaggle,
                "zillow/zecon",
                "Zillow Economics",
                "Home values and rents across US metros.",
            ),
            record(
                SourceId::HuggingFace,
                "leostelon/california-housing",
                "California Housing",
                "Median house prices by block group.",
            ),
            record(SourceId::GoogleDataset, "g/1", "Census Tracts", "Boundaries only."),
        ]
    }

    #[tokio::test]
    async fn model_picks_are_resolved_against_the_listing() {
        let capability = ScriptedCapability::new(Ok(json!({
            "summary": "California Housing matches the region directly.",
            "picks": [
                {"index": 2, "reason": "California block-group prices"},
                {"index": 9, "reason": "not listed"},
                {"index": 2, "reason": "repeat"},
                {"index": 1, "reason": "national context"}
            ]
        })));
        let records = housing_records();
        let rec = Recommender::default()
            .recommend("california housing prices", &records, &capability)
            .await
            .expect("recommend");

        assert_eq!(rec.strategy, RecommendationStrategy::Llm);
        assert_eq!(rec.picks.len(), 2);
        assert_eq!(rec.picks[0].external_id, "leostelon/california-housing");
        assert_eq!(rec.picks[0].reason, "California block-group prices");
        assert_eq!(rec.picks[1].source, SourceId::Kaggle);

        let prompts = capability.prompts.lock().expect("lock");
        assert!(prompts[0].contains("2. California Housing (huggingface)"));
    }

    #[tokio::test]
    async fn fenced_text_answer_is_accepted() {
        let text = "Here you go:\n```json\n{\"summary\": \"Use Zillow.\", \"picks\": [{\"index\": 1, \"reason\": \"broad\"}]}\n```";
        let capability = ScriptedCapability::new(Ok(Value::String(text.into())));
        let rec = Recommender::default()
            .recommend("home values", &housing_records(), &capability)
            .await
            .expect("recommend");
        assert_eq!(rec.strategy, RecommendationStrategy::Llm);
        assert_eq!(rec.summary, "Use Zillow.");
    }

    #[tokio::test]
    async fn unusable_answer_falls_back_to_heuristic() {
        for response in [
            Ok(json!({"summary": "", "picks": [{"index": 1, "reason": "x"}]})),
            Ok(json!({"summary": "nothing listed", "picks": [{"index": 40, "reason": "x"}]})),
            Err(CapabilityError::Unavailable("503".into())),
        ] {
            let capability = ScriptedCapability::new(response);
            let rec = Recommender::default()
                .recommend("california housing prices", &housing_records(), &capability)
                .await
                .expect("recommend");
            assert_eq!(rec.strategy, RecommendationStrategy::Heuristic);
            assert_eq!(rec.picks.len(), 3);
        }
    }

    #[test]
    fn heuristic_explains_keyword_matches_in_rank_order() {
        let rec = heuristic_recommendation("california housing prices", &housing_records());
        assert_eq!(rec.picks[0].external_id, "zillow/zecon");
        assert_eq!(rec.picks[0].reason, "ranked highly by kaggle");
        assert_eq!(rec.picks[1].reason, "mentions california, housing, prices");
        assert!(rec.summary.starts_with("Top 3 of 3 datasets by relevance: Zillow Economics (kaggle)"));

        let again = heuristic_recommendation("california housing prices", &housing_records());
        assert_eq!(again, rec);
    }

    #[test]
    fn heuristic_matches_tags() {
        let rec = heuristic_recommendation("economics indicators", &housing_records());
        assert_eq!(rec.picks[2].reason, "mentions economics");
    }

    #[tokio::test]
    async fn empty_results_skip_the_model() {
        let capability = ScriptedCapability::new(Ok(json!({})));
        let rec = Recommender::default()
            .recommend("anything", &[], &capability)
            .await
            .expect("recommend");
        assert!(rec.picks.is_empty());
        assert!(capability.prompts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn blank_request_is_rejected() {
        let capability = ScriptedCapability::new(Ok(json!({})));
        let err = Recommender::default()
            .recommend("  ", &housing_records(), &capability)
            .await
            .unwrap_err();
        assert_eq!(err, TranslationError::EmptyRequest);
    }

    #[test]
    fn only_the_top_records_are_reviewed() {
        let records: Vec<DatasetRecord> = (0..15)
            .map(|i| record(SourceId::Kaggle, &format!("o/{i}"), &format!("Set {i}"), ""))
            .collect();
        let prompt = recommendation_prompt("sets", &records[..MAX_REVIEWED]);
        assert!(prompt.contains("10. Set 9 (kaggle)"));
        assert!(!prompt.contains("11."));
        assert!(prompt.contains("no description"));
    }
}
