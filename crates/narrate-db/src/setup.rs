//! Database setup and initialization.
//!
//! Entry points call [`setup_database`] with the resolved database path; tests
//! use [`setup_test_database`] for a fresh in-memory schema.

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::path::Path;

/// Sets up the `SQLite` database connection and ensures the schema exists.
///
/// Creates the parent directory and the database file when missing, then
/// creates all tables and indexes.
///
/// # Errors
///
/// Returns an error if the database file cannot be opened or created, or if
/// schema creation fails.
///
/// # Example
///
/// ```rust,no_run
/// use narrate_db::setup_database;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = setup_database(Path::new("/path/to/narrate.db")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true),
    )
    .await?;

    create_schema(&pool).await?;

    tracing::debug!(path = %db_path.display(), "Database ready");
    Ok(pool)
}

/// Sets up an in-memory `SQLite` database with the full production schema.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
///
/// Safe to call multiple times; every statement uses IF NOT EXISTS.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS novels (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // unread is 0/1; read_time is a sortable UTC timestamp string
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            id INTEGER PRIMARY KEY,
            novel_id INTEGER NOT NULL REFERENCES novels(id) ON DELETE CASCADE,
            name TEXT,
            chapter_number REAL,
            position INTEGER NOT NULL,
            progress INTEGER,
            unread INTEGER NOT NULL DEFAULT 1,
            tts_state TEXT,
            read_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chapters_novel_position ON chapters(novel_id, position)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chapters_novel_read_time ON chapters(novel_id, read_time)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress_kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings_kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
