// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings storage failed: {0}")]
    Storage(String),
}

/// Read/write port for the persisted preferred mapping-source instance.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn preferred_mapping_source(&self) -> Result<Option<String>, SettingsError>;

    async fn set_preferred_mapping_source(&self, source_id: &str) -> Result<(), SettingsError>;

    async fn clear_preferred_mapping_source(&self) -> Result<(), SettingsError>;
}

/// Process-local store, used when no persistent backend is configured.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    preferred_mapping_source: RwLock<Option<String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferred_mapping_source(source_id: impl Into<String>) -> Self {
        Self {
            preferred_mapping_source: RwLock::new(Some(source_id.into())),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn preferred_mapping_source(&self) -> Result<Option<String>, SettingsError> {
        Ok(self.preferred_mapping_source.read().await.clone())
    }

    async fn set_preferred_mapping_source(&self, source_id: &str) -> Result<(), SettingsError> {
        *self.preferred_mapping_source.write().await = Some(source_id.to_string());
        Ok(())
    }

    async fn clear_preferred_mapping_source(&self) -> Result<(), SettingsError> {
        *self.preferred_mapping_source.write().await = None;
        Ok(())
    }
}
