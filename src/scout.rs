//! The end-to-end search pipeline.
//!
//! [`Scout`] wires the intent translator, the connector registry and the
//! query cache together: request text is translated (with fallback), the
//! caller's source override is applied, and the resulting query goes through
//! the cache to the aggregator. Single datasets can be looked up by id, and
//! a finished search can be turned into a recommendation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use scout_search::{
    AggregateResult, ConnectorError, ConnectorRegistry, DatasetRecord, IntentTranslator,
    LlmCapability, Lookup, QueryCache, Recommendation, Recommender, ResultStatus, SearchConfig,
    SourceId, Translation,
};
use serde::{Deserialize, Serialize};

use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::llm::OpenAiCapability;

/// One user search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Natural-language request text.
    pub text: String,
    /// Catalogs chosen by the user. When non-empty this replaces whatever
    /// sources the language model suggested.
    pub sources: BTreeSet<SourceId>,
    pub lookup: Lookup,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = SourceId>) -> Self {
        self.sources = sources.into_iter().collect();
        self
    }

    pub fn with_lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = lookup;
        self
    }
}

/// Result of [`Scout::search`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// How the request was understood.
    pub translation: Translation,
    pub status: ResultStatus,
    /// `true` if the result came from the cache.
    pub cache_hit: bool,
    pub result: Arc<AggregateResult>,
}

/// Dataset search pipeline.
pub struct Scout {
    capability: Arc<dyn LlmCapability>,
    connectors: ConnectorRegistry,
    cache: QueryCache,
    search: SearchConfig,
    translator: IntentTranslator,
    recommender: Recommender,
}

impl std::fmt::Debug for Scout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scout")
            .field("connectors", &self.connectors)
            .field("cache", &self.cache)
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

impl Scout {
    /// Assemble a pipeline from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`](crate::error::ScoutError::Config) if
    /// `search` is invalid.
    pub fn new(
        capability: Arc<dyn LlmCapability>,
        connectors: ConnectorRegistry,
        search: SearchConfig,
    ) -> Result<Self> {
        search.validate()?;
        Ok(Self {
            capability,
            connectors,
            cache: QueryCache::from_config(&search),
            translator: IntentTranslator::from_config(&search),
            recommender: Recommender::from_config(&search),
            search,
        })
    }

    /// Build the production pipeline: OpenAI translation and HTTP connectors
    /// for every enabled catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, no API key is set, or an
    /// HTTP client cannot be built.
    pub fn from_config(config: &ScoutConfig) -> Result<Self> {
        config.validate()?;
        let capability = OpenAiCapability::from_config(&config.llm)?;
        let connectors = ConnectorRegistry::with_http_defaults(
            &config.connectors(),
            config.search.max_results_per_source,
        )?;
        Self::new(Arc::new(capability), connectors, config.search.clone())
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn config(&self) -> &SearchConfig {
        &self.search
    }

    /// Translate request text without searching.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Translation`](crate::error::ScoutError::Translation)
    /// for empty requests or an unreachable language model.
    pub async fn translate(&self, text: &str) -> Result<Translation> {
        Ok(self
            .translator
            .translate_with_fallback(text, self.capability.as_ref())
            .await?)
    }

    /// Run one search end to end.
    ///
    /// # Errors
    ///
    /// Translation failures, [`AllSourcesFailed`](scout_search::AggregationError::AllSourcesFailed),
    /// [`NoConnectors`](scout_search::AggregationError::NoConnectors) and cache
    /// failures. Partial catalog failures are reported in the outcome, not
    /// as errors.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let started = Instant::now();
        let mut translation = self.translate(&request.text).await?;

        if !request.sources.is_empty() {
            translation.query = translation
                .query
                .with_target_sources(request.sources.clone());
        }
        tracing::trace!(keywords = ?translation.query.keywords(), "structured query");

        let lookup = scout_search::search_cached(
            &translation.query,
            &self.connectors,
            &self.search,
            &self.cache,
            request.lookup,
        )
        .await?;

        let status = lookup.value.status();
        tracing::info!(
            strategy = ?translation.strategy,
            records = lookup.value.records.len(),
            cache_hit = lookup.hit,
            degraded = lookup.value.partial_failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search finished"
        );

        Ok(SearchOutcome {
            translation,
            status,
            cache_hit: lookup.hit,
            result: lookup.value,
        })
    }

    /// Recommend datasets from a finished search for its request text.
    ///
    /// Falls back to a keyword-overlap heuristic when the language model is
    /// unavailable, so this only fails for blank request text.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Translation`] for an empty request.
    pub async fn recommend(&self, text: &str, outcome: &SearchOutcome) -> Result<Recommendation> {
        let recommendation = self
            .recommender
            .recommend(text, &outcome.result.records, self.capability.as_ref())
            .await?;
        tracing::info!(
            strategy = ?recommendation.strategy,
            picks = recommendation.picks.len(),
            "recommendation ready"
        );
        Ok(recommendation)
    }

    /// Look up one dataset by its catalog id, bounded by the per-source
    /// deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::DatasetLookup`] if `source` is not enabled, the
    /// id is unknown, or the catalog request fails.
    pub async fn get_dataset(&self, source: SourceId, id: &str) -> Result<DatasetRecord> {
        let lookup_error = |error| ScoutError::DatasetLookup {
            catalog: source,
            error,
        };
        let connector = self.connectors.get(source).ok_or_else(|| {
            lookup_error(ConnectorError::not_found(format!("{source} is not enabled")))
        })?;
        let deadline = self.search.per_source_deadline();
        match tokio::time::timeout(deadline, connector.get_dataset(id, deadline)).await {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(error)) => Err(lookup_error(error)),
            Err(_) => Err(lookup_error(ConnectorError::timeout(format!(
                "no response within {deadline:?}"
            )))),
        }
    }
}
