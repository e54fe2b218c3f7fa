//! Composition utilities for wiring `SQLite` adapters into the coordinator.
//!
//! Construction only; no domain logic lives here.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::repositories::{SqliteChapterRepository, SqliteProgressStore, SqliteSettingsRepository};

/// Every `SQLite` adapter backed by one pool.
///
/// Fields are concrete so callers can reach the inherent catalogue helpers;
/// they coerce to the `narrate_core` port trait objects where needed.
#[derive(Clone)]
pub struct Repos {
    pub chapters: Arc<SqliteChapterRepository>,
    pub progress: Arc<SqliteProgressStore>,
    pub settings: Arc<SqliteSettingsRepository>,
}

/// Factory for creating repository instances with `SQLite` backends.
pub struct StorageFactory;

impl StorageFactory {
    /// Create a `SQLite` connection pool from a URL (e.g. `sqlite:narrate.db`).
    ///
    /// Does not create the schema; prefer [`crate::setup_database`] for a file path.
    pub async fn create_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
        let pool = SqlitePool::connect(db_url).await?;
        Ok(pool)
    }

    /// Build all `SQLite` repositories from a pool.
    pub fn build_repos(pool: SqlitePool) -> Repos {
        Repos {
            chapters: Self::chapter_repository(pool.clone()),
            progress: Self::progress_store(pool.clone()),
            settings: Self::settings_repository(pool),
        }
    }

    pub fn chapter_repository(pool: SqlitePool) -> Arc<SqliteChapterRepository> {
        Arc::new(SqliteChapterRepository::new(pool))
    }

    pub fn progress_store(pool: SqlitePool) -> Arc<SqliteProgressStore> {
        Arc::new(SqliteProgressStore::new(pool))
    }

    pub fn settings_repository(pool: SqlitePool) -> Arc<SqliteSettingsRepository> {
        Arc::new(SqliteSettingsRepository::new(pool))
    }
}

/// Test database helper for integration tests.
///
/// In-memory database with the production schema applied.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestDb {
    pool: SqlitePool,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestDb {
    pub async fn new() -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self { pool })
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn repos(&self) -> Repos {
        StorageFactory::build_repos(self.pool.clone())
    }
}
