//! `SQLite` implementation of the `ProgressStore` trait.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use narrate_core::{ProgressStore, RepositoryError};

use super::row_mappers::now_timestamp;

/// Key/value progress markers in the `progress_kv` table.
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All entries whose key starts with `prefix`, sorted by key.
    pub async fn entries_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT key, value FROM progress_kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| (r.get("key"), r.get("value")))
            .collect())
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM progress_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT OR REPLACE INTO progress_kv (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(now_timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM progress_kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use narrate_core::keys;

    async fn store() -> SqliteProgressStore {
        SqliteProgressStore::new(setup_test_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = store().await;
        let key = keys::chapter_progress(5);

        assert_eq!(store.get(&key).await.unwrap(), None);
        store.set(&key, "12").await.unwrap();
        store.set(&key, "14").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("14"));

        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_number_helpers() {
        let store = store().await;

        store.set_number(keys::LAST_TTS_CHAPTER_ID, 42).await.unwrap();
        store.set(keys::PENDING_TTS_RESUME_CHAPTER_ID, "oops").await.unwrap();

        assert_eq!(store.get_number(keys::LAST_TTS_CHAPTER_ID).await.unwrap(), Some(42));
        assert_eq!(
            store.get_number(keys::PENDING_TTS_RESUME_CHAPTER_ID).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_prefix_listing() {
        let store = store().await;
        store.set(&keys::chapter_progress(2), "3").await.unwrap();
        store.set(&keys::chapter_progress(10), "7").await.unwrap();
        store.set(keys::LAST_TTS_CHAPTER_ID, "2").await.unwrap();

        let entries = store.entries_with_prefix("chapter_progress_").await.unwrap();

        assert_eq!(
            entries,
            vec![
                ("chapter_progress_10".to_string(), "7".to_string()),
                ("chapter_progress_2".to_string(), "3".to_string()),
            ]
        );
    }
}
