//! Natural-language request to [`StructuredQuery`] translation.
//!
//! The language model is reached through the [`LlmCapability`] trait so the
//! translator never depends on a concrete provider. Responses may be a JSON
//! object or text wrapping one (optionally in a ```json fence).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SearchConfig;
use crate::error::{CapabilityError, TranslationError};
use crate::types::{SourceId, StructuredQuery};

/// Tokens shorter than this are never keywords in the fallback path.
const MIN_KEYWORD_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "about", "all", "and", "any", "are", "can", "data", "dataset", "datasets", "for", "from",
    "get", "give", "have", "how", "looking", "need", "on", "please", "search", "show", "some",
    "that", "the", "there", "this", "want", "what", "where", "which", "with", "would", "you",
];

/// JSON schema descriptor handed to the capability alongside the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

impl ResponseSchema {
    /// Schema for a structured dataset query.
    pub fn structured_query() -> Self {
        Self {
            name: "dataset_query",
            schema: json!({
                "type": "object",
                "properties": {
                    "keywords": {"type": "array", "items": {"type": "string"}},
                    "filters": {
                        "type": "object",
                        "additionalProperties": {"type": ["string", "number", "boolean"]}
                    },
                    "sources": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["kaggle", "huggingface", "google_dataset"]}
                    },
                    "explanation": {"type": "string"}
                },
                "required": ["keywords"]
            }),
        }
    }
}

/// A language-model completion capability.
///
/// Implementations return either a JSON object matching `schema` or a text
/// value containing one.
#[async_trait]
pub trait LlmCapability: Send + Sync {
    async fn complete(&self, prompt: &str, schema: &ResponseSchema)
        -> Result<Value, CapabilityError>;
}

/// Which path produced a [`Translation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStrategy {
    /// The first model response parsed.
    Llm,
    /// The stricter reformulation prompt was needed.
    StrictRetry,
    /// Both model responses were malformed; keywords came from the request.
    KeywordFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub query: StructuredQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub strategy: TranslationStrategy,
}

/// Translates natural-language requests into structured queries.
#[derive(Debug, Clone)]
pub struct IntentTranslator {
    timeout: Duration,
}

impl Default for IntentTranslator {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

impl IntentTranslator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.translation_timeout())
    }

    /// Translate `request` with a single capability call.
    ///
    /// # Errors
    ///
    /// - [`TranslationError::EmptyRequest`] for blank input
    /// - [`TranslationError::CapabilityUnavailable`] if the call fails or
    ///   times out (not retried)
    /// - [`TranslationError::Malformed`] if the response does not fit the
    ///   schema or yields no usable keyword
    pub async fn translate(
        &self,
        request: &str,
        capability: &dyn LlmCapability,
    ) -> Result<StructuredQuery, TranslationError> {
        let request = non_empty(request)?;
        let (query, _) = self.attempt(&search_prompt(request), capability).await?;
        Ok(query)
    }

    /// Translate with recovery from malformed responses: one retry with a
    /// stricter prompt, then keyword extraction from the request itself.
    ///
    /// # Errors
    ///
    /// [`TranslationError::EmptyRequest`] and
    /// [`TranslationError::CapabilityUnavailable`] are surfaced as-is.
    /// [`TranslationError::Malformed`] only when even the keyword fallback
    /// finds nothing usable.
    pub async fn translate_with_fallback(
        &self,
        request: &str,
        capability: &dyn LlmCapability,
    ) -> Result<Translation, TranslationError> {
        let request = non_empty(request)?;

        match self.attempt(&search_prompt(request), capability).await {
            Ok((query, explanation)) => {
                return Ok(Translation {
                    query,
                    explanation,
                    strategy: TranslationStrategy::Llm,
                })
            }
            Err(TranslationError::Malformed(reason)) => {
                tracing::warn!(%reason, "malformed translation, retrying with strict prompt");
            }
            Err(err) => return Err(err),
        }

        match self.attempt(&strict_prompt(request), capability).await {
            Ok((query, explanation)) => {
                return Ok(Translation {
                    query,
                    explanation,
                    strategy: TranslationStrategy::StrictRetry,
                })
            }
            Err(TranslationError::Malformed(reason)) => {
                tracing::warn!(%reason, "strict translation malformed, using keyword fallback");
            }
            Err(err) => return Err(err),
        }

        let query = keyword_query(request);
        if query.keywords().is_empty() {
            return Err(TranslationError::Malformed(
                "no usable keywords in request".into(),
            ));
        }
        Ok(Translation {
            query,
            explanation: None,
            strategy: TranslationStrategy::KeywordFallback,
        })
    }

    async fn attempt(
        &self,
        prompt: &str,
        capability: &dyn LlmCapability,
    ) -> Result<(StructuredQuery, Option<String>), TranslationError> {
        let schema = ResponseSchema::structured_query();
        let response = tokio::time::timeout(self.timeout, capability.complete(prompt, &schema))
            .await
            .map_err(|_| {
                TranslationError::CapabilityUnavailable(format!(
                    "no response within {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| TranslationError::CapabilityUnavailable(e.to_string()))?;
        parse_response(&response)
    }
}

fn non_empty(request: &str) -> Result<&str, TranslationError> {
    let trimmed = request.trim();
    if trimmed.is_empty() {
        return Err(TranslationError::EmptyRequest);
    }
    tracing::trace!(request = trimmed, "translating request");
    Ok(trimmed)
}

fn search_prompt(request: &str) -> String {
    format!(
        "You help users find datasets. Identify the key concepts in the request \
         and turn them into effective dataset search terms.\n\n\
         Request: {request}\n\n\
         Answer with a JSON object:\n\
         {{\"keywords\": [\"term\", ...], \"filters\": {{\"name\": \"value\"}}, \
         \"sources\": [\"kaggle\" | \"huggingface\" | \"google_dataset\"], \
         \"explanation\": \"why these terms\"}}\n\
         Use filters only for constraints the request states (license, file_type, \
         author, sort_by). Leave sources empty unless the request names catalogs."
    )
}

fn strict_prompt(request: &str) -> String {
    format!(
        "{}\n\nYour previous answer could not be parsed. Respond with ONLY one JSON \
         object and no other text. \"keywords\" must be a non-empty array of strings.",
        search_prompt(request)
    )
}

/// Parse a capability response into a query and optional explanation.
///
/// # Errors
///
/// [`TranslationError::Malformed`] when no JSON object can be found,
/// `keywords` is missing or mistyped, or no keyword survives cleaning.
pub fn parse_response(
    response: &Value,
) -> Result<(StructuredQuery, Option<String>), TranslationError> {
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

    let keywords = match object.get("keywords") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| TranslationError::Malformed("keywords must be strings".into()))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(TranslationError::Malformed("keywords must be a list".into())),
        None => return Err(TranslationError::Malformed("missing keywords".into())),
    };

    let filters = parse_filters(object.get("filters"))?;
    let sources = parse_sources(object.get("sources"));
    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    let query = StructuredQuery::new(keywords, filters, sources);
    if query.keywords().is_empty() {
        return Err(TranslationError::Malformed("no usable keywords".into()));
    }
    Ok((query, explanation))
}

fn parse_filters(value: Option<&Value>) -> Result<BTreeMap<String, String>, TranslationError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(TranslationError::Malformed("filters must be an object".into())),
    };
    let mut filters = BTreeMap::new();
    for (name, value) in map {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            _ => {
                return Err(TranslationError::Malformed(format!(
                    "filter {name} must be a scalar"
                )))
            }
        };
        filters.insert(name.clone(), value);
    }
    Ok(filters)
}

/// Unknown names are ignored; nothing recognised means every catalog.
fn parse_sources(value: Option<&Value>) -> BTreeSet<SourceId> {
    let names: Vec<&str> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => s.split(',').collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .filter_map(|name| {
            let parsed = SourceId::from_alias(name);
            if parsed.is_none() {
                tracing::debug!(name, "ignoring unknown source name");
            }
            parsed
        })
        .collect()
}

/// Find a JSON object in free text: a ```json fenced block first, then the
/// outermost braces.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(fenced) = fenced_block(text) {
        return serde_json::from_str::<Value>(fenced)
            .ok()
            .filter(Value::is_object);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```json")?;
    let body = &text[open + "```json".len()..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Keyword-only query built from the request text: tokenised, lower-cased,
/// stopwords and short tokens removed, deduplicated.
pub fn keyword_query(request: &str) -> StructuredQuery {
    let tokens = request
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|t| t.trim_matches('-').to_lowercase())
        .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|t| !STOPWORDS.contains(&t.as_str()));
    StructuredQuery::from_keywords(tokens)
}
