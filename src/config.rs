//! Application configuration.
//!
//! [`ScoutConfig`] is loaded from TOML. Every section falls back to its
//! defaults, so an empty file (or no file at all) is a valid config once an
//! OpenAI key is available from the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scout_search::connectors::{GoogleDatasetConfig, HuggingFaceConfig, KaggleConfig};
use scout_search::{ConfigError, ConnectorsConfig, SearchConfig};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable holding the Kaggle username.
pub const KAGGLE_USERNAME_ENV: &str = "KAGGLE_USERNAME";
/// Environment variable holding the Kaggle API key.
pub const KAGGLE_KEY_ENV: &str = "KAGGLE_KEY";
/// Environment variable holding the Hugging Face token.
pub const HUGGINGFACE_API_KEY_ENV: &str = "HUGGINGFACE_API_KEY";

/// Top-level configuration for dataset-scout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Fixed User-Agent for catalog requests. A rotating browser UA is used
    /// when unset.
    pub user_agent: Option<String>,
    /// Orchestration, caching and ranking.
    pub search: SearchConfig,
    /// Language model used for intent translation.
    pub llm: LlmConfig,
    pub kaggle: KaggleConfig,
    pub huggingface: HuggingFaceConfig,
    pub google_dataset: GoogleDatasetConfig,
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key. Overridden by `OPENAI_API_KEY` when set.
    pub api_key: Option<String>,
    /// Base URL without the `/v1` suffix.
    pub base_url: String,
    pub model: String,
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f64,
    /// Transport timeout for one completion request, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.2,
            request_timeout_ms: 30_000,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ScoutConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path:
    /// `<config_dir>/dataset-scout/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("dataset-scout")
            .join("config.toml")
    }

    /// Load from `path`, or from the default path if it exists, then apply
    /// credential overrides from the process environment.
    ///
    /// An explicit `path` must exist. A missing default file yields the
    /// default config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Replace credentials with values from `lookup` (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var(OPENAI_API_KEY_ENV) {
            self.llm.api_key = Some(key);
        }
        if let Some(username) = var(KAGGLE_USERNAME_ENV) {
            self.kaggle.username = Some(username);
        }
        if let Some(key) = var(KAGGLE_KEY_ENV) {
            self.kaggle.key = Some(key);
        }
        if let Some(token) = var(HUGGINGFACE_API_KEY_ENV) {
            self.huggingface.api_token = Some(token);
        }
    }

    /// Check the configuration before building a pipeline from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.search.validate()?;

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError("llm.model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.request_timeout_ms == 0 {
            return Err(ConfigError("llm.request_timeout_ms must be > 0".into()));
        }
        for (section, base_url) in [
            ("llm", &self.llm.base_url),
            ("kaggle", &self.kaggle.base_url),
            ("huggingface", &self.huggingface.base_url),
            ("google_dataset", &self.google_dataset.base_url),
        ] {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError(format!(
                    "{section}.base_url must be an http(s) URL"
                )));
            }
        }
        if !self.kaggle.enabled && !self.huggingface.enabled && !self.google_dataset.enabled {
            return Err(ConfigError("at least one catalog must be enabled".into()));
        }
        Ok(())
    }

    /// Connector settings for the HTTP registry.
    pub fn connectors(&self) -> ConnectorsConfig {
        ConnectorsConfig {
            kaggle: self.kaggle.clone(),
            huggingface: self.huggingface.clone(),
            google_dataset: self.google_dataset.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        assert!(ScoutConfig::default().validate().is_ok());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = ScoutConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("dataset-scout"));
    }

    #[test]
    fn env_overrides_replace_credentials() {
        let env: HashMap<&str, &str> = [
            (OPENAI_API_KEY_ENV, "sk-env"),
            (KAGGLE_USERNAME_ENV, "alice"),
            (KAGGLE_KEY_ENV, "kaggle-env"),
            (HUGGINGFACE_API_KEY_ENV, "   "),
        ]
        .into_iter()
        .collect();

        let mut config = ScoutConfig::default();
        config.huggingface.api_token = Some("from-file".into());
        config.apply_env_overrides(|name| env.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.kaggle.username.as_deref(), Some("alice"));
        assert_eq!(config.kaggle.key.as_deref(), Some("kaggle-env"));
        assert_eq!(config.huggingface.api_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ScoutConfig = toml::from_str(
            r#"
            [search]
            max_results = 20

            [kaggle]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.search.max_results, 20);
        assert_eq!(config.search.per_source_deadline_ms, 8_000);
        assert!(!config.kaggle.enabled);
        assert!(config.huggingface.enabled);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn validate_rejects_bad_llm_settings() {
        let mut config = ScoutConfig::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().unwrap_err().0.contains("temperature"));

        let mut config = ScoutConfig::default();
        config.llm.base_url = "api.openai.com".into();
        assert!(config.validate().unwrap_err().0.contains("llm.base_url"));
    }

    #[test]
    fn validate_requires_an_enabled_catalog() {
        let mut config = ScoutConfig::default();
        config.kaggle.enabled = false;
        config.huggingface.enabled = false;
        config.google_dataset.enabled = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_propagates_search_errors() {
        let mut config = ScoutConfig::default();
        config.search.max_results = 0;
        assert!(config.validate().unwrap_err().0.contains("max_results"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = ScoutConfig::default();
        config.llm.api_key = Some("sk-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn connectors_carry_catalog_sections() {
        let mut config = ScoutConfig::default();
        config.user_agent = Some("scout/1.0".into());
        config.google_dataset.enabled = false;
        let connectors = config.connectors();
        assert_eq!(connectors.user_agent.as_deref(), Some("scout/1.0"));
        assert!(!connectors.google_dataset.enabled);
    }
}
