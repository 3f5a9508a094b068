// SPDX-License-Identifier: GPL-3.0-or-later
pub mod arr;
pub mod overseerr;
pub mod settings_store;

pub use arr::ArrConnector;
pub use overseerr::OverseerrMappingSource;
pub use settings_store::SqliteSettingsStore;

use anyhow::Result;
use lookout_application::{Connector, ConnectorRegistry, MappingSource};
use lookout_config::AppConfig;
use reqwest::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared HTTP client. Per-request timeouts come from each connector's configuration.
pub fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .pool_max_idle_per_host(8)
        .user_agent(concat!("lookout/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Build a connector for every enabled configuration entry.
///
/// Entries with an unusable base URL are skipped with a warning so one bad
/// entry does not disable discovery.
pub fn build_connector_registry(config: &AppConfig, client: &Client) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::default();
    for connector in config.enabled_connectors() {
        match ArrConnector::from_config(connector, client.clone()) {
            Ok(arr) => {
                info!(target: "infrastructure", connector_id = %connector.id, kind = ?connector.kind, "connector configured");
                registry.register(Arc::new(arr) as Arc<dyn Connector>);
            }
            Err(error) => {
                warn!(target: "infrastructure", connector_id = %connector.id, error = %error, "skipping connector");
            }
        }
    }
    registry
}

pub fn build_mapping_sources(config: &AppConfig, client: &Client) -> Vec<Arc<dyn MappingSource>> {
    config
        .enabled_mapping_sources()
        .map(|source| {
            Arc::new(OverseerrMappingSource::from_config(source, client.clone()))
                as Arc<dyn MappingSource>
        })
        .collect()
}

pub async fn init_database(config: &AppConfig) -> Result<SqlitePool> {
    info!(target: "infrastructure", "initializing database");

    let db_url = sqlite_url(&config.database.url)?;
    info!(target: "infrastructure", db_url = %db_url, "connecting to database");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.pool_max_size)
        .connect(&db_url)
        .await?;

    info!(target: "infrastructure", "running migrations");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!(target: "infrastructure", "database initialized successfully");
    Ok(pool)
}

fn sqlite_url(url: &str) -> Result<String> {
    if !url.starts_with("sqlite://") || url.starts_with("sqlite://:memory:") {
        return Ok(url.to_string());
    }

    let db_path = url.trim_start_matches("sqlite://");
    let path = Path::new(db_path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    // SQLite accepts forward slashes on every platform.
    let path_str = absolute_path.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite://{}?mode=rwc", path_str))
}
