//! Conflict & resume arbitration.
//!
//! Decides what a resume request from the rendering surface should turn into:
//! a fresh start (the user scrolled away), a chapter-selection prompt (other
//! chapters were read more recently), or a plain resume prompt.

use std::sync::Arc;
use std::time::Duration;

use narrate_core::{
    ChapterId, ChapterRepository, ConflictingChapter, NovelId, ProgressStore, keys,
};

/// Tunables for arbitration and the timing guards around it.
#[derive(Debug, Clone)]
pub struct ArbitrationConfig {
    /// Confirmations this soon after a pause skip scroll-conflict detection.
    pub grace_period_ms: i64,
    /// Largest tolerated gap between the live position and the saved index.
    pub scroll_gap_threshold: i64,
    /// Recently-read chapters inspected for conflicts.
    pub recent_chapter_limit: u32,
    /// Delay before a new chapter's surface counts as synced.
    pub surface_sync_delay: Duration,
    /// Delay before media-navigation tracking is cleared.
    pub media_nav_clear_after: Duration,
    /// Media actions closer together than this are dropped.
    pub media_debounce_ms: i64,
    /// Window after a chapter change in which saves are filtered harder.
    pub save_grace: Duration,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 3000,
            scroll_gap_threshold: 5,
            recent_chapter_limit: 4,
            surface_sync_delay: Duration::from_millis(300),
            media_nav_clear_after: Duration::from_millis(2300),
            media_debounce_ms: 500,
            save_grace: Duration::from_millis(1000),
        }
    }
}

/// Whether a confirmation at `now_ms` falls within the post-pause grace period.
///
/// With no recorded pause the pause time counts as 0, which is never in grace.
pub fn in_grace_period(last_pause_ms: Option<i64>, now_ms: i64, grace_ms: i64) -> bool {
    now_ms - last_pause_ms.unwrap_or(0) < grace_ms
}

/// Whether the live position has drifted from the saved index by more than
/// `threshold` paragraphs.
pub fn is_scroll_conflict(current_index: Option<i64>, saved_index: i64, threshold: i64) -> bool {
    current_index.is_some_and(|current| current >= 0 && (current - saved_index).abs() > threshold)
}

/// Inputs of one confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub novel_id: NovelId,
    pub chapter_id: ChapterId,
    pub saved_index: i64,
    pub current_index: Option<i64>,
    pub last_pause_ms: Option<i64>,
    pub now_ms: i64,
}

/// Outcome of arbitration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationDecision {
    /// The user scrolled away; start fresh from the tracked position.
    ScrollConflict { current_index: i64, saved_index: i64 },
    /// Other recent chapters compete with this one.
    ChapterSelection(Vec<ConflictingChapter>),
    /// Offer to resume at the saved index.
    Resume,
}

pub struct ConflictArbiter {
    config: ArbitrationConfig,
    chapters: Arc<dyn ChapterRepository>,
    store: Arc<dyn ProgressStore>,
}

impl ConflictArbiter {
    pub fn new(
        config: ArbitrationConfig,
        chapters: Arc<dyn ChapterRepository>,
        store: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            config,
            chapters,
            store,
        }
    }

    pub const fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    pub async fn decide(&self, request: ConfirmationRequest) -> ConfirmationDecision {
        let in_grace = in_grace_period(
            request.last_pause_ms,
            request.now_ms,
            self.config.grace_period_ms,
        );

        if in_grace {
            tracing::debug!(
                since_pause_ms = request.now_ms - request.last_pause_ms.unwrap_or(0),
                "Within pause grace period, trusting saved index"
            );
        } else if is_scroll_conflict(
            request.current_index,
            request.saved_index,
            self.config.scroll_gap_threshold,
        ) {
            let current_index = request.current_index.unwrap_or_default();
            tracing::info!(
                current_index,
                saved_index = request.saved_index,
                "Scroll conflict, discarding saved index"
            );
            return ConfirmationDecision::ScrollConflict {
                current_index,
                saved_index: request.saved_index,
            };
        }

        let conflicts = self
            .conflicting_chapters(request.novel_id, request.chapter_id)
            .await;
        if conflicts.is_empty() {
            ConfirmationDecision::Resume
        } else {
            tracing::info!(count = conflicts.len(), "Found conflicting chapters");
            ConfirmationDecision::ChapterSelection(conflicts)
        }
    }

    /// Recently-read chapters other than `current`, with their last known
    /// paragraph. Lookup failures count as "no conflicts".
    pub async fn conflicting_chapters(
        &self,
        novel_id: NovelId,
        current: ChapterId,
    ) -> Vec<ConflictingChapter> {
        let recent = match self
            .chapters
            .recent_reading_chapters(novel_id, self.config.recent_chapter_limit)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                tracing::warn!(novel_id, error = %e, "Recent chapter lookup failed, assuming no conflicts");
                return Vec::new();
            }
        };

        let mut conflicts = Vec::new();
        for chapter in recent.into_iter().filter(|c| c.id != current) {
            let paragraph = match self
                .store
                .get_number(&keys::chapter_progress(chapter.id))
                .await
            {
                Ok(value) => value.unwrap_or(0),
                Err(e) => {
                    tracing::debug!(chapter_id = chapter.id, error = %e, "Progress lookup failed");
                    0
                }
            };
            conflicts.push(ConflictingChapter {
                id: chapter.id,
                name: chapter.display_name(),
                paragraph,
            });
        }
        conflicts
    }
}
