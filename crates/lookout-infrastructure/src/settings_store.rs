// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use chrono::Utc;
use lookout_application::{SettingsError, SettingsStore};
use sqlx::{Row, SqlitePool};
use tracing::debug;

const PREFERRED_MAPPING_SOURCE_KEY: &str = "mapping.preferred_source";

/// SQLx-backed settings store
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ? LIMIT 1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(|r| r.try_get::<String, _>("value"))
            .transpose()
            .map_err(storage_error)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        debug!(target: "settings", key, value, "storing setting");
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SettingsError> {
        debug!(target: "settings", key, "deleting setting");
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

fn storage_error(error: sqlx::Error) -> SettingsError {
    SettingsError::Storage(error.to_string())
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn preferred_mapping_source(&self) -> Result<Option<String>, SettingsError> {
        self.get(PREFERRED_MAPPING_SOURCE_KEY).await
    }

    async fn set_preferred_mapping_source(&self, source_id: &str) -> Result<(), SettingsError> {
        self.put(PREFERRED_MAPPING_SOURCE_KEY, source_id).await
    }

    async fn clear_preferred_mapping_source(&self) -> Result<(), SettingsError> {
        self.delete(PREFERRED_MAPPING_SOURCE_KEY).await
    }
}
