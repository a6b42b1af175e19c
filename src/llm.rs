//! OpenAI-backed [`LlmCapability`].
//!
//! Sends one non-streaming Chat Completions request per prompt with a
//! `json_schema` response format, and hands the message content back to the
//! intent translator. Content that is not valid JSON is returned as a string
//! so the translator can still look for an embedded object.

use async_trait::async_trait;
use scout_search::{CapabilityError, LlmCapability, ResponseSchema};
use serde_json::{Value, json};

use crate::config::LlmConfig;
use crate::error::{Result, ScoutError};

const SYSTEM_PROMPT: &str =
    "You translate dataset search requests into structured JSON queries. Respond with JSON only.";

/// Chat Completions client for intent translation.
pub struct OpenAiCapability {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl std::fmt::Debug for OpenAiCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCapability")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCapability {
    /// Build a client from the `[llm]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] when no API key is configured, or
    /// [`ScoutError::Llm`] if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                scout_search::ConfigError(format!(
                    "llm.api_key is not set (configure it or export {})",
                    crate::config::OPENAI_API_KEY_ENV
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ScoutError::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

/// Build the JSON request body for one structured completion.
pub fn build_request(model: &str, temperature: f64, prompt: &str, schema: &ResponseSchema) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": prompt},
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "schema": schema.schema,
            },
        },
    })
}

/// Pull the assistant message out of a Chat Completions response.
///
/// # Errors
///
/// Returns [`CapabilityError::Unavailable`] if the response has no
/// `choices[0].message.content` string.
pub fn parse_completion(body: &Value) -> std::result::Result<Value, CapabilityError> {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| CapabilityError::Unavailable("response has no message content".into()))?;

    Ok(serde_json::from_str::<Value>(content)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::String(content.to_owned())))
}

/// Map an HTTP error status to the appropriate [`CapabilityError`].
fn map_http_error(status: reqwest::StatusCode, body: &str) -> CapabilityError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => CapabilityError::Auth(format!("OpenAI authentication failed: {message}")),
        429 => CapabilityError::Unavailable(format!("OpenAI rate limited: {message}")),
        code => CapabilityError::Unavailable(format!("OpenAI HTTP {code}: {message}")),
    }
}

/// Extract an error message from an OpenAI error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn map_transport_error(err: &reqwest::Error) -> CapabilityError {
    if err.is_timeout() {
        CapabilityError::Timeout("OpenAI request timed out".into())
    } else {
        CapabilityError::Unavailable(format!("OpenAI request failed: {err}"))
    }
}

#[async_trait]
impl LlmCapability for OpenAiCapability {
    async fn complete(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> std::result::Result<Value, CapabilityError> {
        let body = build_request(&self.model, self.temperature, prompt, schema);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                map_transport_error(&e)
            } else {
                CapabilityError::Unavailable(format!("invalid OpenAI response body: {e}"))
            }
        })?;
        tracing::debug!(model = %self.model, "completion received");
        parse_completion(&body)
    }
}
