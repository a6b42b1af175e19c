//! Trait definition for pluggable catalog connectors and the registry the
//! aggregator dispatches through.
//!
//! Each catalog (Kaggle, Hugging Face, Google Dataset Search) implements
//! [`Connector`] to provide a uniform, classified-failure interface.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConnectorError;
use crate::types::{DatasetRecord, RawSourceResult, SourceId, StructuredQuery};

/// A pluggable catalog backend.
///
/// Implementors translate a [`StructuredQuery`] into a provider request and
/// return the provider-shaped payload untouched; normalisation happens
/// later. Failures must be classified into a
/// [`ConnectorErrorKind`](crate::error::ConnectorErrorKind) and never panic
/// on bad provider data.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Query the catalog.
    ///
    /// `deadline` bounds this single attempt. The aggregator also enforces
    /// it externally, so implementations may use it only as a hint for
    /// their HTTP timeouts.
    async fn fetch(
        &self,
        query: &StructuredQuery,
        deadline: Duration,
    ) -> Result<RawSourceResult, ConnectorError>;

    /// Look up one dataset by its catalog id (the record's `external_id`).
    ///
    /// An unknown id is reported as
    /// [`ConnectorErrorKind::NotFound`](crate::error::ConnectorErrorKind::NotFound).
    /// Catalogs without a detail lookup keep the default, which reports
    /// every id as not found.
    async fn get_dataset(
        &self,
        id: &str,
        _deadline: Duration,
    ) -> Result<DatasetRecord, ConnectorError> {
        Err(ConnectorError::not_found(format!(
            "{} does not support lookup of {id}",
            self.source()
        )))
    }

    /// Returns which catalog this connector serves.
    fn source(&self) -> SourceId;
}

/// Mapping from [`SourceId`] to the connector serving it.
///
/// The aggregator only dispatches to sources present here; registering a
/// second connector for the same source replaces the first.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: BTreeMap<SourceId, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under the source it reports.
    pub fn register<C>(&mut self, connector: C) -> &mut Self
    where
        C: Connector + 'static,
    {
        self.register_arc(Arc::new(connector))
    }

    /// Register an already shared connector.
    pub fn register_arc(&mut self, connector: Arc<dyn Connector>) -> &mut Self {
        let source = connector.source();
        if self.connectors.insert(source, connector).is_some() {
            tracing::debug!(%source, "replaced existing connector");
        }
        self
    }

    pub fn get(&self, source: SourceId) -> Option<Arc<dyn Connector>> {
        self.connectors.get(&source).cloned()
    }

    pub fn contains(&self, source: SourceId) -> bool {
        self.connectors.contains_key(&source)
    }

    /// Registered sources in [`SourceId`] order.
    pub fn sources(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.connectors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("sources", &self.connectors.keys().collect::<Vec<_>>())
            .finish()
    }
}
