//! Kaggle dataset connector.
//!
//! Calls the public `datasets/list` endpoint for searches and
//! `datasets/view/{owner}/{slug}` for single lookups. Credentials are
//! optional; when both username and key are configured they are sent as
//! basic auth.

use std::time::Duration;

use async_trait::async_trait;

use super::{join_base, send_json, KaggleConfig};
use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::http::build_client;
use crate::normalize::normalize_item;
use crate::types::{DatasetRecord, RawSourceResult, SourceId, StructuredQuery};

/// Kaggle `datasets/list` connector.
#[derive(Debug, Clone)]
pub struct KaggleConnector {
    client: reqwest::Client,
    config: KaggleConfig,
    page_size: usize,
}

impl KaggleConnector {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        config: KaggleConfig,
        page_size: usize,
        user_agent: Option<&str>,
    ) -> Result<Self, ConnectorError> {
        Ok(Self {
            client: build_client(user_agent)?,
            config,
            page_size,
        })
    }

    /// Query parameters for a search. Unsupported filters are skipped.
    fn params(&self, query: &StructuredQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("search", query.search_text()),
            ("pageSize", self.page_size.to_string()),
        ];
        for (name, value) in query.filters() {
            let param = match name.as_str() {
                "file_type" => "filetype",
                "license" => "license",
                "sort_by" => "sortBy",
                other => {
                    tracing::debug!(filter = other, "kaggle ignores unsupported filter");
                    continue;
                }
            };
            params.push((param, value.clone()));
        }
        params
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.key) {
            (Some(username), Some(key)) => request.basic_auth(username, Some(key)),
            _ => request,
        }
    }
}

/// Split a `owner/slug` dataset ref.
fn split_ref(id: &str) -> Option<(&str, &str)> {
    let (owner, slug) = id.split_once('/')?;
    if owner.is_empty() || slug.is_empty() || slug.contains('/') {
        return None;
    }
    Some((owner, slug))
}

#[async_trait]
impl Connector for KaggleConnector {
    async fn fetch(
        &self,
        query: &StructuredQuery,
        deadline: Duration,
    ) -> Result<RawSourceResult, ConnectorError> {
        let url = join_base(&self.config.base_url, "datasets/list");
        let request = self.authed(
            self.client
                .get(&url)
                .query(&self.params(query))
                .timeout(deadline),
        );

        let payload = send_json(request).await?;
        tracing::debug!(
            items = payload.as_array().map_or(0, Vec::len),
            "kaggle responded"
        );
        Ok(RawSourceResult::new(SourceId::Kaggle, payload))
    }

    async fn get_dataset(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<DatasetRecord, ConnectorError> {
        let (owner, slug) = split_ref(id)
            .ok_or_else(|| ConnectorError::not_found(format!("not a kaggle dataset ref: {id}")))?;
        let url = join_base(&self.config.base_url, &format!("datasets/view/{owner}/{slug}"));
        let request = self.authed(self.client.get(&url).timeout(deadline));

        let item = send_json(request).await?;
        normalize_item(SourceId::Kaggle, &item)
            .ok_or_else(|| ConnectorError::malformed("kaggle dataset lacks ref or title"))
    }

    fn source(&self) -> SourceId {
        SourceId::Kaggle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn filters_map_to_kaggle_params() {
        let connector = KaggleConnector::new(KaggleConfig::default(), 5, None).expect("build");
        let mut filters = BTreeMap::new();
        filters.insert("file_type".to_string(), "csv".to_string());
        filters.insert("license".to_string(), "cc0".to_string());
        filters.insert("language".to_string(), "en".to_string());
        let query = StructuredQuery::new(["housing", "prices"], filters, BTreeSet::new());

        let params = connector.params(&query);
        assert!(params.contains(&("search", "housing prices".to_string())));
        assert!(params.contains(&("pageSize", "5".to_string())));
        assert!(params.contains(&("filetype", "csv".to_string())));
        assert!(params.contains(&("license", "cc0".to_string())));
        assert!(!params.iter().any(|(_, v)| v == "en"));
    }

    #[test]
    fn dataset_refs_need_owner_and_slug() {
        assert_eq!(split_ref("zillow/zecon"), Some(("zillow", "zecon")));
        assert_eq!(split_ref("zecon"), None);
        assert_eq!(split_ref("/zecon"), None);
        assert_eq!(split_ref("a/b/c"), None);
    }

    #[test]
    fn reports_kaggle_source() {
        let connector = KaggleConnector::new(KaggleConfig::default(), 5, None).expect("build");
        assert_eq!(connector.source(), SourceId::Kaggle);
    }
}
