//! Row mapping helpers for `SQLite` queries.

use narrate_core::{Chapter, RepositoryError};
use sqlx::Row;

/// Shared SELECT column list for chapter queries.
pub const CHAPTER_SELECT_COLUMNS: &str =
    "id, novel_id, name, chapter_number, position, progress, unread, tts_state";

/// Timestamp written to `updated_at` and `read_time` columns.
///
/// Millisecond precision keeps `ORDER BY read_time` stable for chapters
/// touched within the same second.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Parse a database row into a Chapter.
pub fn row_to_chapter(row: &sqlx::sqlite::SqliteRow) -> Result<Chapter, RepositoryError> {
    Ok(Chapter {
        id: row
            .try_get::<i64, _>("id")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        novel_id: row
            .try_get::<i64, _>("novel_id")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        chapter_number: row
            .try_get("chapter_number")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        position: row
            .try_get::<i64, _>("position")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        progress: row
            .try_get("progress")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        unread: row
            .try_get::<i64, _>("unread")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?
            != 0,
        tts_state: row
            .try_get("tts_state")
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
    })
}
