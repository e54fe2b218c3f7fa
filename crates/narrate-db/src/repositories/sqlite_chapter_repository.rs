//! `SQLite` implementation of the `ChapterRepository` trait.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use narrate_core::{
    Chapter, ChapterDirection, ChapterId, ChapterRepository, ForwardResetMode, ForwardResetScope,
    Novel, NovelId, RepositoryError, TtsPersistenceState,
};

use super::row_mappers::{CHAPTER_SELECT_COLUMNS, now_timestamp, row_to_chapter};

/// `SQLite` implementation of the `ChapterRepository` trait.
///
/// Besides the port operations this exposes the small amount of catalogue
/// management the CLI needs to seed and inspect a library.
pub struct SqliteChapterRepository {
    pool: SqlitePool,
}

impl SqliteChapterRepository {
    /// Create a new `SQLite` chapter repository.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or rename a novel.
    pub async fn upsert_novel(&self, novel: &Novel) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO novels (id, name) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(novel.id)
        .bind(&novel.name)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }

    pub async fn get_novel(&self, id: NovelId) -> Result<Option<Novel>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM novels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(row.map(|r| Novel {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    /// Insert or replace a chapter row. The novel must exist.
    pub async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO chapters
                (id, novel_id, name, chapter_number, position, progress, unread, tts_state)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                novel_id = excluded.novel_id,
                name = excluded.name,
                chapter_number = excluded.chapter_number,
                position = excluded.position,
                progress = excluded.progress,
                unread = excluded.unread,
                tts_state = excluded.tts_state
            "#,
        )
        .bind(chapter.id)
        .bind(chapter.novel_id)
        .bind(&chapter.name)
        .bind(chapter.chapter_number)
        .bind(chapter.position)
        .bind(chapter.progress)
        .bind(i64::from(chapter.unread))
        .bind(&chapter.tts_state)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("FOREIGN KEY") {
                RepositoryError::Constraint(msg)
            } else {
                RepositoryError::Storage(msg)
            }
        })?;

        Ok(())
    }

    /// All chapters of a novel in reading order.
    pub async fn list_chapters(&self, novel_id: NovelId) -> Result<Vec<Chapter>, RepositoryError> {
        let query = format!(
            "SELECT {CHAPTER_SELECT_COLUMNS} FROM chapters WHERE novel_id = ? ORDER BY position ASC"
        );
        let rows = sqlx::query(&query)
            .bind(novel_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        rows.iter().map(row_to_chapter).collect()
    }

    /// The chapter immediately before or after `chapter` in its novel.
    pub async fn adjacent_chapter(
        &self,
        chapter: &Chapter,
        direction: ChapterDirection,
    ) -> Result<Option<Chapter>, RepositoryError> {
        let query = match direction {
            ChapterDirection::Next => format!(
                "SELECT {CHAPTER_SELECT_COLUMNS} FROM chapters WHERE novel_id = ? AND position > ? ORDER BY position ASC LIMIT 1"
            ),
            ChapterDirection::Prev => format!(
                "SELECT {CHAPTER_SELECT_COLUMNS} FROM chapters WHERE novel_id = ? AND position < ? ORDER BY position DESC LIMIT 1"
            ),
        };
        let row = sqlx::query(&query)
            .bind(chapter.novel_id)
            .bind(chapter.position)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        row.as_ref().map(row_to_chapter).transpose()
    }

    async fn position_of(
        &self,
        novel_id: NovelId,
        chapter_id: ChapterId,
    ) -> Result<Option<i64>, RepositoryError> {
        sqlx::query_scalar::<_, i64>("SELECT position FROM chapters WHERE id = ? AND novel_id = ?")
            .bind(chapter_id)
            .bind(novel_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))
    }
}

#[async_trait]
impl ChapterRepository for SqliteChapterRepository {
    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, RepositoryError> {
        let query = format!("SELECT {CHAPTER_SELECT_COLUMNS} FROM chapters WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        row.as_ref().map(row_to_chapter).transpose()
    }

    async fn recent_reading_chapters(
        &self,
        novel_id: NovelId,
        limit: u32,
    ) -> Result<Vec<Chapter>, RepositoryError> {
        let query = format!(
            "SELECT {CHAPTER_SELECT_COLUMNS} FROM chapters WHERE novel_id = ? AND read_time IS NOT NULL ORDER BY read_time DESC, id DESC LIMIT ?"
        );
        let rows = sqlx::query(&query)
            .bind(novel_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        rows.iter().map(row_to_chapter).collect()
    }

    async fn mark_chapters_before_position_read(
        &self,
        novel_id: NovelId,
        position: i64,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE chapters SET unread = 0, progress = 100 WHERE novel_id = ? AND position < ?",
        )
        .bind(novel_id)
        .bind(position)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        tracing::debug!(novel_id, position, rows = result.rows_affected(), "Marked earlier chapters read");
        Ok(result.rows_affected())
    }

    async fn reset_future_chapters_progress(
        &self,
        novel_id: NovelId,
        chapter_id: ChapterId,
        mode: ForwardResetMode,
        scope: ForwardResetScope,
    ) -> Result<u64, RepositoryError> {
        let sql = match mode {
            ForwardResetMode::None => return Ok(0),
            ForwardResetMode::Position => {
                r#"
                UPDATE chapters SET progress = 0, tts_state = NULL
                WHERE id IN (
                    SELECT id FROM chapters
                    WHERE novel_id = ? AND position > ?
                    ORDER BY position ASC LIMIT ?
                )
                "#
            }
            ForwardResetMode::Unread => {
                r#"
                UPDATE chapters SET progress = 0, unread = 1, tts_state = NULL
                WHERE id IN (
                    SELECT id FROM chapters
                    WHERE novel_id = ? AND position > ?
                    ORDER BY position ASC LIMIT ?
                )
                "#
            }
        };

        let Some(position) = self.position_of(novel_id, chapter_id).await? else {
            tracing::debug!(novel_id, chapter_id, "Forward reset skipped: chapter not found");
            return Ok(0);
        };

        // LIMIT -1 is unbounded in SQLite
        let limit = scope.limit().map_or(-1, i64::from);
        let result = sqlx::query(sql)
            .bind(novel_id)
            .bind(position)
            .bind(limit)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn chapter_ids_between(
        &self,
        novel_id: NovelId,
        from_position: i64,
        to_position: i64,
    ) -> Result<Vec<ChapterId>, RepositoryError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM chapters WHERE novel_id = ? AND position > ? AND position < ? ORDER BY position ASC",
        )
        .bind(novel_id)
        .bind(from_position)
        .bind(to_position)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))
    }

    async fn update_progress(
        &self,
        chapter_id: ChapterId,
        progress: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chapters SET progress = ?, read_time = ? WHERE id = ?")
            .bind(progress.clamp(0, 100))
            .bind(now_timestamp())
            .bind(chapter_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("chapter {chapter_id}")));
        }

        Ok(())
    }

    async fn save_tts_state(
        &self,
        chapter_id: ChapterId,
        state: Option<&TtsPersistenceState>,
    ) -> Result<(), RepositoryError> {
        let json = state
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        sqlx::query("UPDATE chapters SET tts_state = ? WHERE id = ?")
            .bind(json)
            .bind(chapter_id)
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

    fn chapter(id: ChapterId, position: i64) -> Chapter {
        Chapter {
            id,
            novel_id: 1,
            name: Some(format!("Chapter {id}")),
            chapter_number: None,
            position,
            progress: Some(40),
            unread: true,
            tts_state: None,
        }
    }

    async fn seeded(count: i64) -> SqliteChapterRepository {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteChapterRepository::new(pool);
        repo.upsert_novel(&Novel {
            id: 1,
            name: "The Long Road".to_string(),
        })
        .await
        .unwrap();
        for id in 1..=count {
            repo.upsert_chapter(&chapter(id, id * 10)).await.unwrap();
        }
        repo
    }

    async fn get(repo: &SqliteChapterRepository, id: ChapterId) -> Chapter {
        repo.get_chapter(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_get_chapter_round_trips_row() {
        let repo = seeded(1).await;

        assert_eq!(get(&repo, 1).await, chapter(1, 10));
        assert!(repo.get_chapter(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_before_position_read() {
        let repo = seeded(4).await;

        let touched = repo.mark_chapters_before_position_read(1, 30).await.unwrap();

        assert_eq!(touched, 2);
        for id in [1, 2] {
            let c = get(&repo, id).await;
            assert!(!c.unread);
            assert_eq!(c.progress, Some(100));
        }
        assert!(get(&repo, 3).await.unread);
    }

    #[tokio::test]
    async fn test_reset_position_mode_keeps_unread_flag() {
        let repo = seeded(4).await;
        repo.mark_chapters_before_position_read(1, 100).await.unwrap();
        repo.save_tts_state(
            3,
            Some(&TtsPersistenceState {
                paragraph_index: 4,
                timestamp: 1,
                is_reading: None,
                chapter_id: None,
            }),
        )
        .await
        .unwrap();

        let touched = repo
            .reset_future_chapters_progress(1, 2, ForwardResetMode::Position, ForwardResetScope::All)
            .await
            .unwrap();

        assert_eq!(touched, 2);
        let c = get(&repo, 3).await;
        assert_eq!(c.progress, Some(0));
        assert_eq!(c.tts_state, None);
        assert!(!c.unread);
        assert_eq!(get(&repo, 2).await.progress, Some(100));
    }

    #[tokio::test]
    async fn test_reset_unread_mode_respects_scope() {
        let repo = seeded(5).await;
        repo.mark_chapters_before_position_read(1, 100).await.unwrap();

        let touched = repo
            .reset_future_chapters_progress(1, 1, ForwardResetMode::Unread, ForwardResetScope::Next)
            .await
            .unwrap();

        assert_eq!(touched, 1);
        assert!(get(&repo, 2).await.unread);
        assert_eq!(get(&repo, 2).await.progress, Some(0));
        assert!(!get(&repo, 3).await.unread);
    }

    #[tokio::test]
    async fn test_reset_is_noop_for_none_mode_or_unknown_chapter() {
        let repo = seeded(3).await;

        let none = repo
            .reset_future_chapters_progress(1, 1, ForwardResetMode::None, ForwardResetScope::All)
            .await
            .unwrap();
        let missing = repo
            .reset_future_chapters_progress(1, 42, ForwardResetMode::Unread, ForwardResetScope::All)
            .await
            .unwrap();

        assert_eq!((none, missing), (0, 0));
        assert_eq!(get(&repo, 3).await.progress, Some(40));
    }

    #[tokio::test]
    async fn test_chapter_ids_between_is_exclusive_and_ordered() {
        let repo = seeded(6).await;

        let ids = repo.chapter_ids_between(1, 20, 60).await.unwrap();

        assert_eq!(ids, vec![3, 4, 5]);
        assert!(repo.chapter_ids_between(1, 60, 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_progress_feeds_recent_list() {
        let repo = seeded(4).await;
        assert!(repo.recent_reading_chapters(1, 3).await.unwrap().is_empty());

        repo.update_progress(2, 150).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.update_progress(4, 30).await.unwrap();

        let recent = repo.recent_reading_chapters(1, 3).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 2]);
        assert_eq!(recent[1].progress, Some(100));
    }

    #[tokio::test]
    async fn test_update_progress_unknown_chapter() {
        let repo = seeded(1).await;

        let result = repo.update_progress(77, 10).await;

        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_tts_state_save_and_clear() {
        let repo = seeded(1).await;
        let state = TtsPersistenceState {
            paragraph_index: 9,
            timestamp: 1_700_000_000_000,
            is_reading: Some(true),
            chapter_id: Some(1),
        };

        repo.save_tts_state(1, Some(&state)).await.unwrap();
        let stored = get(&repo, 1).await.tts_state;
        assert_eq!(TtsPersistenceState::parse(stored.as_deref()), Some(state));

        repo.save_tts_state(1, None).await.unwrap();
        assert_eq!(get(&repo, 1).await.tts_state, None);
    }

    #[tokio::test]
    async fn test_adjacent_chapters() {
        let repo = seeded(3).await;
        let middle = get(&repo, 2).await;

        let next = repo.adjacent_chapter(&middle, ChapterDirection::Next).await.unwrap();
        let prev = repo.adjacent_chapter(&middle, ChapterDirection::Prev).await.unwrap();
        let past_end = repo
            .adjacent_chapter(&get(&repo, 3).await, ChapterDirection::Next)
            .await
            .unwrap();

        assert_eq!(next.map(|c| c.id), Some(3));
        assert_eq!(prev.map(|c| c.id), Some(1));
        assert!(past_end.is_none());
        assert_eq!(repo.list_chapters(1).await.unwrap().len(), 3);
    }
}
