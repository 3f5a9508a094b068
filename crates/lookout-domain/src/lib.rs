// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects & IDs
// ============================================================================

/// Connector-specific numeric identifier, meaningful only within one service instance.
pub type InternalId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(pub String);

impl ConnectorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Media Identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstract media item a caller wants releases for.
///
/// `catalog_id` is the primary catalog (TMDB), `secondary_catalog_id` the
/// secondary one (TVDB) and `external_id` a cross-catalog key such as an IMDB id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaIdentity {
    pub media_type: MediaType,
    pub catalog_id: Option<u64>,
    pub secondary_catalog_id: Option<u64>,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<u32>,
}

impl MediaIdentity {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            catalog_id: None,
            secondary_catalog_id: None,
            external_id: None,
            title: None,
            year: None,
        }
    }

    pub fn movie(catalog_id: u64) -> Self {
        Self::new(MediaType::Movie).with_catalog_id(catalog_id)
    }

    pub fn series(catalog_id: u64) -> Self {
        Self::new(MediaType::Series).with_catalog_id(catalog_id)
    }

    pub fn with_catalog_id(mut self, catalog_id: u64) -> Self {
        self.catalog_id = Some(catalog_id);
        self
    }

    pub fn with_secondary_catalog_id(mut self, secondary_catalog_id: u64) -> Self {
        self.secondary_catalog_id = Some(secondary_catalog_id);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    /// Whether at least one identifier usable for resolution is present.
    pub fn has_identifier(&self) -> bool {
        self.catalog_id.is_some()
            || self.secondary_catalog_id.is_some()
            || self
                .external_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty())
    }
}

// ============================================================================
// Connectors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    /// Movie download-automation service.
    Radarr,
    /// Series download-automation service.
    Sonarr,
}

impl ConnectorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Radarr => "radarr",
            Self::Sonarr => "sonarr",
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Radarr => MediaType::Movie,
            Self::Sonarr => MediaType::Series,
        }
    }

    pub fn serves(&self, media_type: MediaType) -> bool {
        self.media_type() == media_type
    }
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connector instance paired with the internal ID it knows the media item by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub connector_id: ConnectorId,
    pub connector_type: ConnectorType,
    pub internal_id: InternalId,
}

/// One entry of a connector's free-text search.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchCandidate {
    /// Absent when the item is known to the service but not part of its library.
    pub internal_id: Option<InternalId>,
    pub title: String,
    pub year: Option<u32>,
    pub catalog_id: Option<u64>,
    pub secondary_catalog_id: Option<u64>,
    pub external_id: Option<String>,
}

// ============================================================================
// Releases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Usenet,
    Torrent,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usenet => "usenet",
            Self::Torrent => "torrent",
        }
    }

    pub fn has_seeders(&self) -> bool {
        matches!(self, Self::Torrent)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release size as reported by a connector: either a byte count or a human label like `"1.4 GB"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSize {
    Bytes(u64),
    Label(String),
}

/// Connector-specific release candidate, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelease {
    pub title: String,
    pub size: Option<RawSize>,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub quality: Option<String>,
    pub protocol: Protocol,
    pub indexer: Option<String>,
    pub custom_score: Option<i64>,
    pub download_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Download-progress fields some services attach; dropped during normalization.
    pub size_left: Option<u64>,
    pub time_left: Option<String>,
}

impl RawRelease {
    pub fn new(title: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            title: title.into(),
            size: None,
            seeders: None,
            leechers: None,
            quality: None,
            protocol,
            indexer: None,
            custom_score: None,
            download_url: None,
            published_at: None,
            size_left: None,
            time_left: None,
        }
    }
}

/// Canonical release shape shared by every connector.
///
/// `score` stays `None` until the ranker orders the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRelease {
    pub title: String,
    pub size_bytes: u64,
    pub seeders: u32,
    pub leechers: u32,
    pub quality_rank: u32,
    pub quality_label: Option<String>,
    pub protocol: Protocol,
    pub indexer_name: String,
    pub source_connector_id: ConnectorId,
    pub custom_score: Option<i64>,
    pub download_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub score: Option<u64>,
}

/// Identity of a physical release across indexers and connectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    pub normalized_title: String,
    /// Size bucket on a 1% geometric grid.
    pub size_bucket: i64,
    pub protocol: Protocol,
}
