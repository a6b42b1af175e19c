//! Google Dataset Search connector.
//!
//! Google Dataset Search has no public API, so the results page is fetched
//! and its dataset cards are scraped with CSS selectors into a JSON array
//! shaped like the other catalogs' payloads.
//!
//! A dataset's id is its link, so a single lookup fetches that page. Only
//! links on the configured host are followed.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use url::Url;

use super::{join_base, send_text, GoogleDatasetConfig};
use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::http::build_client;
use crate::normalize::normalize_item;
use crate::types::{DatasetRecord, RawSourceResult, SourceId, StructuredQuery};

/// Google Dataset Search HTML scraper.
#[derive(Debug, Clone)]
pub struct GoogleDatasetConnector {
    client: reqwest::Client,
    config: GoogleDatasetConfig,
    max_results: usize,
}

impl GoogleDatasetConnector {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        config: GoogleDatasetConfig,
        max_results: usize,
        user_agent: Option<&str>,
    ) -> Result<Self, ConnectorError> {
        Ok(Self {
            client: build_client(user_agent)?,
            config,
            max_results,
        })
    }

    /// Parse `id` as a dataset link served by the configured host.
    fn dataset_link(&self, id: &str) -> Result<Url, ConnectorError> {
        let not_found = || ConnectorError::not_found(format!("not a google dataset link: {id}"));
        let link = Url::parse(id).map_err(|_| not_found())?;
        let base = Url::parse(&self.config.base_url)
            .map_err(|e| ConnectorError::malformed(format!("invalid base URL: {e}")))?;
        if link.origin() != base.origin() {
            return Err(not_found());
        }
        Ok(link)
    }
}

#[async_trait]
impl Connector for GoogleDatasetConnector {
    async fn fetch(
        &self,
        query: &StructuredQuery,
        deadline: Duration,
    ) -> Result<RawSourceResult, ConnectorError> {
        let url = join_base(&self.config.base_url, "search");
        let request = self
            .client
            .get(&url)
            .query(&[("query", query.search_text())])
            .timeout(deadline);

        let html = send_text(request).await?;
        let base = Url::parse(&url)
            .map_err(|e| ConnectorError::malformed(format!("invalid base URL: {e}")))?;
        let items = parse_dataset_cards(&html, &base, self.max_results)?;
        tracing::debug!(items = items.len(), "google dataset search responded");
        Ok(RawSourceResult::new(SourceId::GoogleDataset, Value::Array(items)))
    }

    async fn get_dataset(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<DatasetRecord, ConnectorError> {
        let link = self.dataset_link(id)?;
        let request = self.client.get(link.clone()).timeout(deadline);

        let html = send_text(request).await?;
        let item = parse_dataset_page(&html, &link)?
            .ok_or_else(|| ConnectorError::malformed("dataset page has no title"))?;
        normalize_item(SourceId::GoogleDataset, &item)
            .ok_or_else(|| ConnectorError::malformed("dataset page has no title"))
    }

    fn source(&self) -> SourceId {
        SourceId::GoogleDataset
    }
}

fn selector(css: &str) -> Result<Selector, ConnectorError> {
    Selector::parse(css)
        .map_err(|e| ConnectorError::malformed(format!("invalid selector {css}: {e:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract dataset cards from a results page.
///
/// Cards without a title are skipped. Relative links resolve against
/// `base`; a card without a link gets an id derived from its title and
/// description so repeated fetches produce the same id.
pub(crate) fn parse_dataset_cards(
    html: &str,
    base: &Url,
    max_results: usize,
) -> Result<Vec<Value>, ConnectorError> {
    let document = Html::parse_document(html);

    let card_sel = selector(".dataset-card")?;
    let title_sel = selector(".dataset-title")?;
    let link_sel = selector("a[href]")?;
    let description_sel = selector(".dataset-description")?;
    let tag_sel = selector(".dataset-tag")?;

    let mut items = Vec::new();

    for card in document.select(&card_sel) {
        if items.len() >= max_results {
            break;
        }

        let title_el = match card.select(&title_sel).next() {
            Some(el) => el,
            None => continue,
        };
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }

        let link = title_el
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href).ok())
            .map(|u| u.to_string());

        let description = card
            .select(&description_sel)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let tags: Vec<String> = card
            .select(&tag_sel)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();

        let id = match &link {
            Some(url) => url.clone(),
            None => stable_id(&title, &description),
        };

        items.push(json!({
            "id": id,
            "title": title,
            "description": description,
            "url": link,
            "tags": tags,
        }));
    }

    Ok(items)
}

/// Extract one dataset from its own page.
///
/// Prefers the first dataset card; otherwise reads the page heading and
/// its meta description. The item's id and url are always `link`.
pub(crate) fn parse_dataset_page(html: &str, link: &Url) -> Result<Option<Value>, ConnectorError> {
    let mut item = match parse_dataset_cards(html, link, 1)?.into_iter().next() {
        Some(card) => card,
        None => {
            let document = Html::parse_document(html);
            let title = document
                .select(&selector("h1")?)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty());
            let Some(title) = title else {
                return Ok(None);
            };
            let description = document
                .select(&selector("meta[name='description']")?)
                .next()
                .and_then(|meta| meta.value().attr("content"))
                .map(|d| d.trim().to_string())
                .unwrap_or_default();
            json!({"title": title, "description": description, "tags": []})
        }
    };
    item["id"] = json!(link.as_str());
    item["url"] = json!(link.as_str());
    Ok(Some(item))
}

fn stable_id(title: &str, description: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\0");
    hasher.update(description.as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("google_{}", &hex.as_str()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOCK_RESULTS_HTML: &str = r#"
    <html><body>
      <div class="dataset-card">
        <h2 class="dataset-title"><a href="/search?docid=abc123">Global Housing   Prices</a></h2>
        <p class="dataset-description">Quarterly house price index for 40 countries.</p>
        <div class="dataset-tags">
          <span class="dataset-tag">economics</span>
          <span class="dataset-tag">housing</span>
        </div>
      </div>
      <div class="dataset-card">
        <h2 class="dataset-title">Rental Listings</h2>
        <p class="dataset-description">Scraped rental ads.</p>
      </div>
      <div class="dataset-card">
        <p class="dataset-description">Card without a title</p>
      </div>
      <div class="dataset-card">
        <h2 class="dataset-title"><a href="https://data.example.org/ds/9">Mortgage Rates</a></h2>
      </div>
    </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://datasetsearch.research.google.com/search").expect("url")
    }

    #[test]
    fn parse_mock_html_returns_cards() {
        let items = parse_dataset_cards(MOCK_RESULTS_HTML, &base(), 10).expect("should parse");
        assert_eq!(items.len(), 3);

        let first = &items[0];
        assert_eq!(first["title"], "Global Housing Prices");
        assert_eq!(
            first["url"],
            "https://datasetsearch.research.google.com/search?docid=abc123"
        );
        assert_eq!(first["id"], first["url"]);
        assert_eq!(first["tags"], json!(["economics", "housing"]));

        assert_eq!(items[2]["url"], "https://data.example.org/ds/9");
        assert_eq!(items[2]["description"], "");
    }

    #[test]
    fn card_without_link_gets_stable_hash_id() {
        let items = parse_dataset_cards(MOCK_RESULTS_HTML, &base(), 10).expect("should parse");
        let rental = &items[1];
        assert!(rental["url"].is_null());
        let id = rental["id"].as_str().expect("id");
        assert!(id.starts_with("google_"));

        let again = parse_dataset_cards(MOCK_RESULTS_HTML, &base(), 10).expect("should parse");
        assert_eq!(again[1]["id"], rental["id"]);
    }

    #[test]
    fn parse_respects_max_results() {
        let items = parse_dataset_cards(MOCK_RESULTS_HTML, &base(), 1).expect("should parse");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn dataset_page_falls_back_to_heading_and_meta() {
        let link = Url::parse("https://datasetsearch.research.google.com/search?docid=xyz")
            .expect("url");
        let html = r#"<html><head><meta name="description" content=" Hourly air quality readings. "></head>
            <body><h1>Air   Quality</h1></body></html>"#;
        let item = parse_dataset_page(html, &link).expect("parse").expect("item");
        assert_eq!(item["title"], "Air Quality");
        assert_eq!(item["description"], "Hourly air quality readings.");
        assert_eq!(item["id"], link.as_str());

        let card = parse_dataset_page(MOCK_RESULTS_HTML, &link).expect("parse").expect("item");
        assert_eq!(card["title"], "Global Housing Prices");
        assert_eq!(card["url"], link.as_str());

        assert!(parse_dataset_page("<html></html>", &link).expect("parse").is_none());
    }

    #[test]
    fn only_links_on_the_configured_host_are_followed() {
        let connector =
            GoogleDatasetConnector::new(GoogleDatasetConfig::default(), 5, None).expect("build");
        assert!(connector
            .dataset_link("https://datasetsearch.research.google.com/search?docid=abc")
            .is_ok());
        for id in ["https://evil.example.com/search?docid=abc", "google_0123456789abcdef"] {
            let err = connector.dataset_link(id).unwrap_err();
            assert_eq!(err.kind, crate::error::ConnectorErrorKind::NotFound, "{id}");
        }
    }

    #[test]
    fn parse_empty_html_returns_empty() {
        let items =
            parse_dataset_cards("<html><body></body></html>", &base(), 10).expect("should parse");
        assert!(items.is_empty());
    }
}
