//! Hugging Face Hub dataset connector.

use std::time::Duration;

use async_trait::async_trait;

use super::{join_base, send_json, HuggingFaceConfig};
use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::http::build_client;
use crate::normalize::normalize_item;
use crate::types::{DatasetRecord, RawSourceResult, SourceId, StructuredQuery};

/// Hugging Face `/datasets` search connector.
#[derive(Debug, Clone)]
pub struct HuggingFaceConnector {
    client: reqwest::Client,
    config: HuggingFaceConfig,
    limit: usize,
}

impl HuggingFaceConnector {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        config: HuggingFaceConfig,
        limit: usize,
        user_agent: Option<&str>,
    ) -> Result<Self, ConnectorError> {
        Ok(Self {
            client: build_client(user_agent)?,
            config,
            limit,
        })
    }

    /// `author` maps to its own parameter; every other filter becomes a hub
    /// tag filter (`filter=key:value`).
    fn params(&self, query: &StructuredQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("search", query.search_text()),
            ("limit", self.limit.to_string()),
            ("full", "true".to_string()),
        ];
        for (name, value) in query.filters() {
            if name == "author" {
                params.push(("author", value.clone()));
            } else {
                params.push(("filter", format!("{name}:{value}")));
            }
        }
        params
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Hub repo ids are `name` or `owner/name` and are safe to place in a path.
fn is_repo_id(id: &str) -> bool {
    let segments: Vec<&str> = id.split('/').collect();
    segments.len() <= 2
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && *segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
}

#[async_trait]
impl Connector for HuggingFaceConnector {
    async fn fetch(
        &self,
        query: &StructuredQuery,
        deadline: Duration,
    ) -> Result<RawSourceResult, ConnectorError> {
        let url = join_base(&self.config.base_url, "datasets");
        let request = self.authed(
            self.client
                .get(&url)
                .query(&self.params(query))
                .timeout(deadline),
        );

        let payload = send_json(request).await?;
        tracing::debug!(
            items = payload.as_array().map_or(0, Vec::len),
            "huggingface responded"
        );
        Ok(RawSourceResult::new(SourceId::HuggingFace, payload))
    }

    async fn get_dataset(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<DatasetRecord, ConnectorError> {
        if !is_repo_id(id) {
            return Err(ConnectorError::not_found(format!(
                "not a hugging face dataset id: {id}"
            )));
        }
        let url = join_base(&self.config.base_url, &format!("datasets/{id}"));
        let request = self.authed(self.client.get(&url).timeout(deadline));

        let item = send_json(request).await?;
        normalize_item(SourceId::HuggingFace, &item)
            .ok_or_else(|| ConnectorError::malformed("hugging face dataset lacks an id"))
    }

    fn source(&self) -> SourceId {
        SourceId::HuggingFace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_and_tag_filters() {
        let connector =
            HuggingFaceConnector::new(HuggingFaceConfig::default(), 7, None).expect("build");
        let query = StructuredQuery::from_keywords(["sentiment"])
            .with_filter("author", "stanfordnlp")
            .with_filter("language", "en");

        let params = connector.params(&query);
        assert!(params.contains(&("search", "sentiment".to_string())));
        assert!(params.contains(&("limit", "7".to_string())));
        assert!(params.contains(&("full", "true".to_string())));
        assert!(params.contains(&("author", "stanfordnlp".to_string())));
        assert!(params.contains(&("filter", "language:en".to_string())));
    }

    #[test]
    fn repo_id_shapes() {
        assert!(is_repo_id("squad"));
        assert!(is_repo_id("stanfordnlp/sst2"));
        assert!(is_repo_id("allenai/c4.en_v1-0"));
        assert!(!is_repo_id(""));
        assert!(!is_repo_id("a/b/c"));
        assert!(!is_repo_id("../secrets"));
        assert!(!is_repo_id("owner/name?full=true"));
    }
}
