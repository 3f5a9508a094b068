// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://lookout.db".to_string(),
            pool_max_size: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Defaults and cache policy for release discovery queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub prefer_quality: bool,
    pub min_seeders: u32,
    /// Age after which a cached result is served only as a fallback.
    pub cache_freshness_secs: u64,
    /// Age after which a cached result is evicted entirely.
    pub cache_retention_secs: u64,
    pub cache_capacity: u64,
    /// Maximum characters of a connector error kept in fetch-failure logs.
    pub error_message_limit: usize,
}

impl DiscoveryConfig {
    pub fn cache_freshness(&self) -> Duration {
        Duration::from_secs(self.cache_freshness_secs)
    }

    pub fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_retention_secs.max(self.cache_freshness_secs))
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            prefer_quality: true,
            min_seeders: 0,
            cache_freshness_secs: 10 * 60,
            cache_retention_secs: 30 * 60,
            cache_capacity: 1_000,
            error_message_limit: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Radarr,
    Sonarr,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_enabled() -> bool {
    true
}

/// One configured download-automation service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub id: String,
    pub kind: ConnectorKind,
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ConnectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One configured request-management instance used for cross-service ID mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSourceConfig {
    pub id: String,
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl MappingSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
    #[serde(default)]
    pub mapping_sources: Vec<MappingSourceConfig>,
}

impl AppConfig {
    pub fn enabled_connectors(&self) -> impl Iterator<Item = &ConnectorConfig> {
        self.connectors.iter().filter(|connector| connector.enabled)
    }

    pub fn enabled_mapping_sources(&self) -> impl Iterator<Item = &MappingSourceConfig> {
        self.mapping_sources.iter().filter(|source| source.enabled)
    }
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: LOOKOUT_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("LOOKOUT_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(
        target: "config",
        connectors = config.connectors.len(),
        mapping_sources = config.mapping_sources.len(),
        "configuration loaded"
    );
    Ok(config)
}
