// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use lookout_application::{MappingError, MappingSource};
use lookout_config::MappingSourceConfig;
use lookout_domain::{ConnectorType, InternalId};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Overseerr/Jellyseerr instance used to map TMDB IDs to Radarr/Sonarr IDs.
pub struct OverseerrMappingSource {
    id: String,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl OverseerrMappingSource {
    pub fn new(
        id: impl Into<String>,
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout,
            client,
        }
    }

    pub fn from_config(config: &MappingSourceConfig, client: Client) -> Self {
        Self::new(
            config.id.clone(),
            &config.base_url,
            config.api_key.clone(),
            config.timeout(),
            client,
        )
    }

    /// `mediaInfo` of the catalog entry; `None` when the entry is unknown or
    /// not linked to any service.
    async fn media_info(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Option<MediaInfo>, MappingError> {
        let resource = match target {
            ConnectorType::Radarr => "movie",
            ConnectorType::Sonarr => "tv",
        };
        let url = format!("{}/api/v1/{}/{}", self.base_url, resource, catalog_id);
        debug!(target: "mapping", url = %url, "requesting media details");

        let mut request = self.client.get(&url).timeout(self.timeout);
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.header("X-Api-Key", api_key.trim());
        }

        let response = request.send().await.map_err(|error| self.request_error(error))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|error| self.request_error(error))?;
        if !status.is_success() {
            return Err(MappingError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let details: MediaDetails = serde_json::from_str(&body)
            .map_err(|error| MappingError::Deserialization(error.to_string()))?;
        Ok(details.media_info)
    }

    fn request_error(&self, error: reqwest::Error) -> MappingError {
        if error.is_timeout() {
            MappingError::Timeout(self.timeout)
        } else {
            MappingError::Request(error.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaDetails {
    #[serde(default)]
    media_info: Option<MediaInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaInfo {
    #[serde(default)]
    external_service_id: Option<InternalId>,
    #[serde(default, rename = "externalServiceId4k")]
    external_service_id_4k: Option<InternalId>,
}

#[async_trait]
impl MappingSource for OverseerrMappingSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self), fields(source_id = %self.id))]
    async fn map_to_connector_internal_id(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Option<InternalId>, MappingError> {
        Ok(self
            .media_info(catalog_id, target)
            .await?
            .and_then(|info| info.external_service_id)
            .filter(|id| *id > 0))
    }

    /// The regular and the 4K instance each keep their own internal ID.
    #[instrument(skip(self), fields(source_id = %self.id))]
    async fn candidate_internal_ids(
        &self,
        catalog_id: u64,
        target: ConnectorType,
    ) -> Result<Vec<InternalId>, MappingError> {
        let Some(info) = self.media_info(catalog_id, target).await? else {
            return Ok(Vec::new());
        };

        let mut ids = Vec::new();
        for id in [info.external_service_id, info.external_service_id_4k]
            .into_iter()
            .flatten()
        {
            if id > 0 && !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
