//! Chapter history port.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{Chapter, ChapterId, NovelId, TtsPersistenceState};
use crate::settings::{ForwardResetMode, ForwardResetScope};

/// Read and update chapter history.
///
/// This is the slow, durable mirror of reading progress. The coordinator
/// treats every write as fire-and-forget and every lookup failure as "nothing
/// found".
///
/// # Design Rules
///
/// - No `sqlx` types in signatures
/// - Progress values are percentages (0-100)
#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// Look up a chapter by id.
    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, RepositoryError>;

    /// Most recently read chapters of a novel, newest first.
    async fn recent_reading_chapters(
        &self,
        novel_id: NovelId,
        limit: u32,
    ) -> Result<Vec<Chapter>, RepositoryError>;

    /// Mark every chapter of the novel before `position` as fully read.
    async fn mark_chapters_before_position_read(
        &self,
        novel_id: NovelId,
        position: i64,
    ) -> Result<u64, RepositoryError>;

    /// Reset progress of chapters after `chapter_id`.
    ///
    /// Returns the number of chapters touched. `ForwardResetMode::None` is a no-op.
    async fn reset_future_chapters_progress(
        &self,
        novel_id: NovelId,
        chapter_id: ChapterId,
        mode: ForwardResetMode,
        scope: ForwardResetScope,
    ) -> Result<u64, RepositoryError>;

    /// Ids of the chapters strictly between two positions, in position order.
    async fn chapter_ids_between(
        &self,
        novel_id: NovelId,
        from_position: i64,
        to_position: i64,
    ) -> Result<Vec<ChapterId>, RepositoryError>;

    /// Record reading progress and stamp the chapter as read now.
    async fn update_progress(
        &self,
        chapter_id: ChapterId,
        progress: i64,
    ) -> Result<(), RepositoryError>;

    /// Store (or clear) the background narration snapshot.
    async fn save_tts_state(
        &self,
        chapter_id: ChapterId,
        state: Option<&TtsPersistenceState>,
    ) -> Result<(), RepositoryError>;
}
