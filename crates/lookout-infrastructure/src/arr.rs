// SPDX-License-Identifier: GPL-3.0-or-later

//! Radarr/Sonarr v3 REST connector.
//!
//! Both services share the same API shape; the connector type only decides
//! the resource names (`movie` vs `series`) and the release query parameter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lookout_application::{Connector, ConnectorError, ReleaseQueryOptions};
use lookout_config::{ConnectorConfig, ConnectorKind};
use lookout_domain::{
    ConnectorId, ConnectorType, InternalId, Protocol, RawRelease, RawSize, SearchCandidate,
};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, trace};

const API_KEY_HEADER: &str = "X-Api-Key";

pub struct ArrConnector {
    id: ConnectorId,
    connector_type: ConnectorType,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl ArrConnector {
    pub fn new(
        id: impl Into<ConnectorId>,
        connector_type: ConnectorType,
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        client: Client,
    ) -> Result<Self, ConnectorError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|error| ConnectorError::InvalidBaseUrl(format!("{base_url}: {error}")))?;

        Ok(Self {
            id: id.into(),
            connector_type,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &ConnectorConfig, client: Client) -> Result<Self, ConnectorError> {
        let connector_type = match config.kind {
            ConnectorKind::Radarr => ConnectorType::Radarr,
            ConnectorKind::Sonarr => ConnectorType::Sonarr,
        };
        Self::new(
            config.id.as_str(),
            connector_type,
            &config.base_url,
            config.api_key.clone(),
            config.timeout(),
            client,
        )
    }

    fn resource(&self) -> &'static str {
        match self.connector_type {
            ConnectorType::Radarr => "movie",
            ConnectorType::Sonarr => "series",
        }
    }

    fn release_query_param(&self) -> &'static str {
        match self.connector_type {
            ConnectorType::Radarr => "movieId",
            ConnectorType::Sonarr => "seriesId",
        }
    }

    /// The lookup term that finds an item by catalog ID, if the service
    /// supports one for the IDs given.
    fn catalog_lookup_term(
        &self,
        catalog_id: Option<u64>,
        secondary_catalog_id: Option<u64>,
    ) -> Option<String> {
        match self.connector_type {
            ConnectorType::Radarr => catalog_id.map(|id| format!("tmdb:{id}")),
            ConnectorType::Sonarr => secondary_catalog_id
                .map(|id| format!("tvdb:{id}"))
                .or_else(|| catalog_id.map(|id| format!("tmdb:{id}"))),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ConnectorError> {
        let (status, body) = self.get(path, query).await?;
        if !status.is_success() {
            return Err(ConnectorError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        parse_body(&body)
    }

    /// Like [`Self::get_json`], with 404 mapped to `None`.
    async fn get_optional_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ConnectorError> {
        let (status, body) = self.get(path, &[]).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ConnectorError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        parse_body(&body).map(Some)
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(StatusCode, String), ConnectorError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(target: "connector", connector_id = %self.id, url = %url, "GET");

        let mut request = self.client.get(&url).query(query).timeout(self.timeout);
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.header(API_KEY_HEADER, api_key.trim());
        }

        let response = request.send().await.map_err(|error| self.request_error(error))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.request_error(error))?;
        Ok((status, body))
    }

    fn request_error(&self, error: reqwest::Error) -> ConnectorError {
        if error.is_timeout() {
            ConnectorError::Timeout(self.timeout)
        } else {
            ConnectorError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl Connector for ArrConnector {
    fn id(&self) -> &ConnectorId {
        &self.id
    }

    fn connector_type(&self) -> ConnectorType {
        self.connector_type
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self), fields(connector_id = %self.id))]
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, ConnectorError> {
        let path = format!("/api/v3/{}/lookup", self.resource());
        let items: Vec<LookupItem> = self
            .get_json(&path, &[("term", query.to_string())])
            .await?;

        debug!(target: "connector", connector_id = %self.id, results = items.len(), "lookup complete");
        Ok(items.into_iter().map(LookupItem::into_candidate).collect())
    }

    #[instrument(skip(self), fields(connector_id = %self.id))]
    async fn lookup_by_catalog_id(
        &self,
        catalog_id: Option<u64>,
        secondary_catalog_id: Option<u64>,
    ) -> Result<Vec<SearchCandidate>, ConnectorError> {
        match self.catalog_lookup_term(catalog_id, secondary_catalog_id) {
            Some(term) => self.search(&term).await,
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self), fields(connector_id = %self.id))]
    async fn library_item(
        &self,
        internal_id: InternalId,
    ) -> Result<Option<SearchCandidate>, ConnectorError> {
        let path = format!("/api/v3/{}/{}", self.resource(), internal_id);
        let item: Option<LookupItem> = self.get_optional_json(&path).await?;
        Ok(item.map(LookupItem::into_candidate))
    }

    #[instrument(skip(self, _options), fields(connector_id = %self.id))]
    async fn get_releases(
        &self,
        internal_id: InternalId,
        _options: &ReleaseQueryOptions,
    ) -> Result<Vec<RawRelease>, ConnectorError> {
        let items: Vec<ReleaseItem> = self
            .get_json(
                "/api/v3/release",
                &[(self.release_query_param(), internal_id.to_string())],
            )
            .await?;

        let total = items.len();
        let releases: Vec<RawRelease> = items
            .into_iter()
            .filter_map(ReleaseItem::into_raw_release)
            .collect();

        if releases.len() < total {
            debug!(
                target: "connector",
                connector_id = %self.id,
                skipped = total - releases.len(),
                "skipped releases with unknown protocol"
            );
        }
        Ok(releases)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupItem {
    #[serde(default)]
    id: Option<InternalId>,
    title: String,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    tmdb_id: Option<u64>,
    #[serde(default)]
    tvdb_id: Option<u64>,
    #[serde(default)]
    imdb_id: Option<String>,
}

impl LookupItem {
    fn into_candidate(self) -> SearchCandidate {
        SearchCandidate {
            // Lookup results not yet added to the library carry id 0 or none.
            internal_id: self.id.filter(|id| *id > 0),
            title: self.title,
            year: self.year.filter(|year| *year > 0),
            catalog_id: self.tmdb_id.filter(|id| *id > 0),
            secondary_catalog_id: self.tvdb_id.filter(|id| *id > 0),
            external_id: self.imdb_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseItem {
    title: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    seeders: Option<u32>,
    #[serde(default)]
    leechers: Option<u32>,
    #[serde(default)]
    quality: Option<QualityWrapper>,
    protocol: String,
    #[serde(default)]
    indexer: Option<String>,
    #[serde(default)]
    custom_format_score: Option<i64>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    publish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct QualityWrapper {
    quality: QualityDefinition,
}

#[derive(Debug, Deserialize)]
struct QualityDefinition {
    name: String,
}

impl ReleaseItem {
    fn into_raw_release(self) -> Option<RawRelease> {
        let protocol = parse_protocol(&self.protocol)?;
        let mut release = RawRelease::new(self.title, protocol);
        release.size = self.size.map(RawSize::Bytes);
        release.seeders = self.seeders;
        release.leechers = self.leechers;
        release.quality = self.quality.map(|wrapper| wrapper.quality.name);
        release.indexer = self.indexer;
        release.custom_score = self.custom_format_score;
        release.download_url = self.download_url;
        release.published_at = self.publish_date;
        Some(release)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ConnectorError> {
    serde_json::from_str(body).map_err(|error| ConnectorError::Deserialization(error.to_string()))
}

fn parse_protocol(value: &str) -> Option<Protocol> {
    match value.trim().to_ascii_lowercase().as_str() {
        "torrent" => Some(Protocol::Torrent),
        "usenet" => Some(Protocol::Usenet),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base_url() {
        let result = ArrConnector::new(
            "radarr",
            ConnectorType::Radarr,
            "not a url",
            None,
            Duration::from_secs(5),
            Client::new(),
        );
        assert!(matches!(result, Err(ConnectorError::InvalidBaseUrl(_))));
    }

    #[test]
    fn trims_trailing_slash_and_blank_api_key() {
        let connector = ArrConnector::new(
            "sonarr",
            ConnectorType::Sonarr,
            "http://localhost:8989/",
            Some("  ".to_string()),
            Duration::from_secs(5),
            Client::new(),
        )
        .unwrap();

        assert_eq!(connector.base_url, "http://localhost:8989");
        assert!(connector.api_key.is_none());
        assert_eq!(connector.resource(), "series");
        assert_eq!(connector.release_query_param(), "seriesId");
    }

    #[test]
    fn catalog_lookup_term_follows_service_ids() {
        let radarr = ArrConnector::new(
            "radarr",
            ConnectorType::Radarr,
            "http://localhost:7878",
            None,
            Duration::from_secs(5),
            Client::new(),
        )
        .unwrap();
        assert_eq!(
            radarr.catalog_lookup_term(Some(603), None).as_deref(),
            Some("tmdb:603")
        );
        assert_eq!(radarr.catalog_lookup_term(None, Some(81189)), None);

        let sonarr = ArrConnector::new(
            "sonarr",
            ConnectorType::Sonarr,
            "http://localhost:8989",
            None,
            Duration::from_secs(5),
            Client::new(),
        )
        .unwrap();
        assert_eq!(
            sonarr.catalog_lookup_term(Some(1396), Some(81189)).as_deref(),
            Some("tvdb:81189")
        );
        assert_eq!(
            sonarr.catalog_lookup_term(Some(1396), None).as_deref(),
            Some("tmdb:1396")
        );
        assert_eq!(sonarr.catalog_lookup_term(None, None), None);
    }

    #[test]
    fn parses_protocol_names() {
        assert_eq!(parse_protocol("torrent"), Some(Protocol::Torrent));
        assert_eq!(parse_protocol("Usenet"), Some(Protocol::Usenet));
        assert_eq!(parse_protocol("unknown"), None);
    }

    #[test]
    fn lookup_item_without_library_id_has_no_internal_id() {
        let item: LookupItem = serde_json::from_value(serde_json::json!({
            "title": "Movie A",
            "year": 1999,
            "tmdbId": 603,
            "imdbId": "tt0133093"
        }))
        .unwrap();

        let candidate = item.into_candidate();
        assert_eq!(candidate.internal_id, None);
        assert_eq!(candidate.catalog_id, Some(603));
        assert_eq!(candidate.external_id.as_deref(), Some("tt0133093"));
    }
}
