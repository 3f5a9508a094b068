// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use lookout_domain::{
    ConnectorId, ConnectorType, InternalId, MediaType, RawRelease, SearchCandidate,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleaseQueryOptions {
    pub min_seeders: u32,
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("connector responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("deserialization failed: {0}")]
    Deserialization(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Uniform capability interface of one configured service instance.
#[async_trait]
pub trait Connector: Send + Sync {
    fn id(&self) -> &ConnectorId;

    fn connector_type(&self) -> ConnectorType;

    /// Timeout applied to every network call made through this connector.
    fn request_timeout(&self) -> Duration {
        DEFAULT_REQUEST_TIMEOUT
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, ConnectorError>;

    /// Look the item up by its catalog IDs. Candidates are matched on their
    /// IDs by the caller. Services without such a lookup return nothing.
    async fn lookup_by_catalog_id(
        &self,
        _catalog_id: Option<u64>,
        _secondary_catalog_id: Option<u64>,
    ) -> Result<Vec<SearchCandidate>, ConnectorError> {
        Ok(Vec::new())
    }

    /// The library item stored under `internal_id`, if this instance has one.
    /// Used to confirm IDs obtained from another service.
    async fn library_item(
        &self,
        _internal_id: InternalId,
    ) -> Result<Option<SearchCandidate>, ConnectorError> {
        Ok(None)
    }

    async fn get_releases(
        &self,
        internal_id: InternalId,
        options: &ReleaseQueryOptions,
    ) -> Result<Vec<RawRelease>, ConnectorError>;
}

/// Configured connector instances, in configuration order.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.push(connector);
    }

    pub fn get(&self, id: &ConnectorId) -> Option<Arc<dyn Connector>> {
        self.connectors
            .iter()
            .find(|connector| connector.id() == id)
            .cloned()
    }

    /// All instances whose connector type serves the given media type.
    pub fn for_media_type(&self, media_type: MediaType) -> Vec<Arc<dyn Connector>> {
        self.connectors
            .iter()
            .filter(|connector| connector.connector_type().serves(media_type))
            .cloned()
            .collect()
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
        f.debug_list()
            .entries(self.connectors.iter().map(|connector| connector.id()))
            .finish()
    }
}
