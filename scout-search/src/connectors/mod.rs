//! HTTP connectors for the supported dataset catalogs.
//!
//! Each connector owns a [`reqwest::Client`] built by [`crate::http`] and
//! returns the provider payload as JSON for the normaliser. Base URLs are
//! configurable so tests can point connectors at a local mock server.

pub mod google_dataset;
pub mod huggingface;
pub mod kaggle;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::connector::ConnectorRegistry;
use crate::error::{ConnectorError, ConnectorErrorKind};
use crate::http::{classify_reqwest_error, classify_status};

pub use google_dataset::GoogleDatasetConnector;
pub use huggingface::HuggingFaceConnector;
pub use kaggle::KaggleConnector;

/// Kaggle API settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KaggleConfig {
    pub enabled: bool,
    pub base_url: String,
    pub username: Option<String>,
    pub key: Option<String>,
}

impl Default for KaggleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.kaggle.com/api/v1".to_owned(),
            username: None,
            key: None,
        }
    }
}

impl fmt::Debug for KaggleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaggleConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Hugging Face Hub settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_token: Option<String>,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://huggingface.co/api".to_owned(),
            api_token: None,
        }
    }
}

impl fmt::Debug for HuggingFaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Google Dataset Search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleDatasetConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for GoogleDatasetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://datasetsearch.research.google.com".to_owned(),
        }
    }
}

/// Settings for every HTTP connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorsConfig {
    pub kaggle: KaggleConfig,
    pub huggingface: HuggingFaceConfig,
    pub google_dataset: GoogleDatasetConfig,
    /// Fixed User-Agent; a rotating browser UA is used when unset.
    pub user_agent: Option<String>,
}

impl ConnectorRegistry {
    /// Registry with an HTTP connector for every enabled catalog.
    ///
    /// `max_results_per_source` bounds how many items each catalog is asked
    /// for.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn with_http_defaults(
        config: &ConnectorsConfig,
        max_results_per_source: usize,
    ) -> Result<Self, ConnectorError> {
        let ua = config.user_agent.as_deref();
        let mut registry = Self::new();
        if config.kaggle.enabled {
            registry.register(KaggleConnector::new(
                config.kaggle.clone(),
                max_results_per_source,
                ua,
            )?);
        }
        if config.huggingface.enabled {
            registry.register(HuggingFaceConnector::new(
                config.huggingface.clone(),
                max_results_per_source,
                ua,
            )?);
        }
        if config.google_dataset.enabled {
            registry.register(GoogleDatasetConnector::new(
                config.google_dataset.clone(),
                max_results_per_source,
                ua,
            )?);
        }
        tracing::debug!(sources = ?registry.sources().collect::<Vec<_>>(), "http connectors registered");
        Ok(registry)
    }
}

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ConnectorError> {
    let response = checked_response(request).await?;
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| match classify_reqwest_error(&e) {
            err if err.kind == ConnectorErrorKind::Timeout => err,
            _ => ConnectorError::malformed(format!("invalid JSON body: {e}")),
        })
}

/// Send a request and read a text body, classifying every failure.
pub(crate) async fn send_text(request: reqwest::RequestBuilder) -> Result<String, ConnectorError> {
    let response = checked_response(request).await?;
    response.text().await.map_err(|e| classify_reqwest_error(&e))
}

async fn checked_response(
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ConnectorError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_reqwest_error(&e))?;
    match classify_status(response.status()) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

pub(crate) fn join_base(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceId;

    #[test]
    fn default_registry_has_all_catalogs() {
        let registry =
            ConnectorRegistry::with_http_defaults(&ConnectorsConfig::default(), 10).expect("build");
        assert_eq!(registry.sources().collect::<Vec<_>>(), SourceId::all().to_vec());
    }

    #[test]
    fn disabled_catalog_not_registered() {
        let mut config = ConnectorsConfig::default();
        config.google_dataset.enabled = false;
        let registry = ConnectorRegistry::with_http_defaults(&config, 10).expect("build");
        assert!(!registry.contains(SourceId::GoogleDataset));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = KaggleConfig {
            username: Some("alice".into()),
            key: Some("super-secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("super-secret"));

        let hf = HuggingFaceConfig {
            api_token: Some("hf_secret".into()),
            ..Default::default()
        };
        assert!(!format!("{hf:?}").contains("hf_secret"));
    }

    #[test]
    fn join_base_handles_slashes() {
        assert_eq!(join_base("http://x/api/", "/datasets"), "http://x/api/datasets");
        assert_eq!(join_base("http://x/api", "datasets"), "http://x/api/datasets");
    }
}
