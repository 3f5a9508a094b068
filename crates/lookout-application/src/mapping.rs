// SPDX-License-Identifier: GPL-3.0-or-later

//! Cross-service ID mapping through a request-management service.
//!
//! A request manager (Overseerr, Jellyseerr) already knows which internal ID
//! its linked download services use for a catalog entry. When several
//! request-manager instances are configured, the user picks one once and the
//! choice is persisted through the [`SettingsStore`] port.

use crate::connectors::DEFAULT_REQUEST_TIMEOUT;
use crate::settings::{SettingsError, SettingsStore};
use async_trait::async_trait;
use lookout_domain::{ConnectorType, InternalId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("mapping request failed: {0}")]
    Request(String),
    #[error("mapping source responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("deserialization failed: {0}")]
    Deserialization(String),
    #[error("mapping request timed out after {0:?}")]
    Timeout(Duration),
}

/// One request-management instance able to map catalog IDs to connector internal IDs.
#[async_trait]
pub trait MappingSource: Send + Sync {
    fn id(&self) -> &str;

    fn request_timeout(&self) -> Duration {
        DEFAULT_REQUEST_TIMEOUT
    }

    async fn map_to_connector_internal_id(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Option<InternalId>, MappingError>;

    /// Every internal ID the source links to the catalog entry, one per linked
    /// service instance. An ID is only valid on its own instance, so callers
    /// confirm each one against the connector before using it.
    async fn candidate_internal_ids(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Vec<InternalId>, MappingError> {
        Ok(self
            .map_to_connector_internal_id(catalog_id, target)
            .await?
            .into_iter()
            .collect())
    }
}

/// Question put to the user when several mapping sources are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePrompt {
    pub message: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooserOutcome {
    Selected(String),
    OpenSettings,
    Cancelled,
}

/// UI round-trip used to obtain a single user choice.
#[async_trait]
pub trait MappingSourceChooser: Send + Sync {
    async fn choose(&self, prompt: &ChoicePrompt) -> ChooserOutcome;
}

/// Chooser for headless contexts: never picks anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineChooser;

#[async_trait]
impl MappingSourceChooser for DeclineChooser {
    async fn choose(&self, _prompt: &ChoicePrompt) -> ChooserOutcome {
        ChooserOutcome::Cancelled
    }
}

/// Mapping source selected for one query. Empty when mapping is unavailable.
#[derive(Clone, Default)]
pub struct MappingSession {
    source: Option<Arc<dyn MappingSource>>,
}

impl MappingSession {
    pub fn none() -> Self {
        Self { source: None }
    }

    pub fn with_source(source: Arc<dyn MappingSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source.as_ref().map(|source| source.id())
    }

    pub fn is_available(&self) -> bool {
        self.source.is_some()
    }

    pub async fn map_catalog_id(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Option<InternalId>, MappingError> {
        let Some(source) = self.source.as_ref() else {
            return Ok(None);
        };

        let timeout = source.request_timeout();
        match tokio::time::timeout(
            timeout,
            source.map_to_connector_internal_id(catalog_id, target),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MappingError::Timeout(timeout)),
        }
    }

    /// Candidate IDs for every linked instance, bounded by the source timeout.
    pub async fn candidate_ids(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Vec<InternalId>, MappingError> {
        let Some(source) = self.source.as_ref() else {
            return Ok(Vec::new());
        };

        let timeout = source.request_timeout();
        match tokio::time::timeout(timeout, source.candidate_internal_ids(catalog_id, target)).await
        {
            Ok(result) => result,
            Err(_) => Err(MappingError::Timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for MappingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingSession")
            .field("source", &self.source_id())
            .finish()
    }
}

pub struct CrossServiceMappingHelper {
    sources: Vec<Arc<dyn MappingSource>>,
    settings: Arc<dyn SettingsStore>,
    chooser: Arc<dyn MappingSourceChooser>,
    prompt_lock: Mutex<()>,
}

impl CrossServiceMappingHelper {
    pub fn new(
        sources: Vec<Arc<dyn MappingSource>>,
        settings: Arc<dyn SettingsStore>,
        chooser: Arc<dyn MappingSourceChooser>,
    ) -> Self {
        Self {
            sources,
            settings,
            chooser,
            prompt_lock: Mutex::new(()),
        }
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.id()).collect()
    }

    /// Map a catalog ID to the internal ID used by the given connector type.
    ///
    /// Selects the mapping source first, which may prompt the user.
    pub async fn map_catalog_id(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Option<InternalId>, MappingError> {
        self.session().await.map_catalog_id(catalog_id, target).await
    }

    /// Select the mapping source for one query.
    ///
    /// * zero sources: empty session
    /// * one source: used without asking
    /// * several: the persisted preference, otherwise a single user prompt
    pub async fn session(&self) -> MappingSession {
        match self.sources.len() {
            0 => {
                debug!(target: "mapping", "no mapping sources configured");
                MappingSession::none()
            }
            1 => MappingSession::with_source(Arc::clone(&self.sources[0])),
            _ => self.select_among_several().await,
        }
    }

    /// Forget the persisted preference; the next query with several sources prompts again.
    pub async fn clear_preference(&self) -> Result<(), SettingsError> {
        self.settings.clear_preferred_mapping_source().await?;
        info!(target: "mapping", "preferred mapping source cleared");
        Ok(())
    }

    async fn select_among_several(&self) -> MappingSession {
        if let Some(source) = self.preferred_source().await {
            return MappingSession::with_source(source);
        }

        // Concurrent queries must not stack prompts; re-check once the lock is held.
        let _guard = self.prompt_lock.lock().await;
        if let Some(source) = self.preferred_source().await {
            return MappingSession::with_source(source);
        }

        let prompt = ChoicePrompt {
            message: "Several request managers can map catalog IDs. Which one should be used?"
                .to_string(),
            options: self.source_ids().into_iter().map(str::to_string).collect(),
        };

        match self.chooser.choose(&prompt).await {
            ChooserOutcome::Selected(choice) => {
                let Some(source) = self.find_source(&choice) else {
                    warn!(target: "mapping", choice = %choice, "chooser returned an unknown mapping source");
                    return MappingSession::none();
                };

                if let Err(error) = self.settings.set_preferred_mapping_source(&choice).await {
                    warn!(target: "mapping", choice = %choice, error = %error, "failed to persist preferred mapping source");
                } else {
                    info!(target: "mapping", source_id = %choice, "preferred mapping source saved");
                }

                MappingSession::with_source(source)
            }
            ChooserOutcome::OpenSettings => {
                info!(target: "mapping", "mapping source choice deferred to settings");
                MappingSession::none()
            }
            ChooserOutcome::Cancelled => {
                info!(target: "mapping", "mapping source choice cancelled");
                MappingSession::none()
            }
        }
    }

    async fn preferred_source(&self) -> Option<Arc<dyn MappingSource>> {
        let preferred = match self.settings.preferred_mapping_source().await {
            Ok(preferred) => preferred?,
            Err(error) => {
                warn!(target: "mapping", error = %error, "failed to read preferred mapping source");
                return None;
            }
        };

        let source = self.find_source(&preferred);
        if source.is_none() {
            warn!(
                target: "mapping",
                source_id = %preferred,
                "preferred mapping source is no longer configured"
            );
        }
        source
    }

    fn find_source(&self, id: &str) -> Option<Arc<dyn MappingSource>> {
        self.sources
            .iter()
            .find(|source| source.id() == id)
            .cloned()
    }
}
