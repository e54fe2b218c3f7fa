//! Durable key/value store for fast progress markers.

use async_trait::async_trait;

use super::RepositoryError;

/// Key names shared with the rest of the reader application.
pub mod keys {
    use crate::domain::{ChapterId, NovelId};

    /// Chapter narration was last active in.
    pub const LAST_TTS_CHAPTER_ID: &str = "lastTTSChapterId";

    /// Chapter that should offer the resume dialog on its next load.
    pub const PENDING_TTS_RESUME_CHAPTER_ID: &str = "pendingTTSResumeChapterId";

    /// Ephemeral position of the floating narration button.
    pub const TTS_BUTTON_POSITION: &str = "tts_button_position";

    /// Last persisted paragraph index of a chapter.
    pub fn chapter_progress(chapter_id: ChapterId) -> String {
        format!("chapter_progress_{chapter_id}")
    }

    /// Per-novel voice override.
    pub fn novel_tts_settings(novel_id: NovelId) -> String {
        format!("NOVEL_TTS_SETTINGS_{novel_id}")
    }
}

/// Durable key/value store.
///
/// Survives process restarts. Values are strings; the provided number helpers
/// parse and format integers.
///
/// # Design Rules
///
/// - Writes are cheap and may happen on every position change
/// - A value that fails to parse as a number reads as absent
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError>;

    async fn delete(&self, key: &str) -> Result<(), RepositoryError>;

    async fn get_number(&self, key: &str) -> Result<Option<i64>, RepositoryError> {
        Ok(self.get(key).await?.and_then(|v| v.trim().parse().ok()))
    }

    async fn set_number(&self, key: &str, value: i64) -> Result<(), RepositoryError> {
        self.set(key, &value.to_string()).await
    }
}
