//! `SQLite` implementation of the `SettingsRepository` trait.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use narrate_core::{NarrationSettings, RepositoryError, SettingsRepository};

use super::row_mappers::now_timestamp;

/// `SQLite` implementation of the `SettingsRepository` trait.
///
/// Stores settings as a JSON blob in a key-value table for flexibility.
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    /// Create a new `SQLite` settings repository.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SETTINGS_KEY: &str = "narration_settings";

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn load(&self) -> Result<NarrationSettings, RepositoryError> {
        let row = sqlx::query("SELECT value FROM settings_kv WHERE key = ?")
            .bind(SETTINGS_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        match row {
            Some(r) => {
                let json: String = r.get("value");
                serde_json::from_str(&json)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))
            }
            None => Ok(NarrationSettings::with_defaults()),
        }
    }

    async fn save(&self, settings: &NarrationSettings) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(settings)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        sqlx::query("INSERT OR REPLACE INTO settings_kv (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(SETTINGS_KEY)
            .bind(&json)
            .bind(now_timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }
}
