//! Position & persistence tracker.
//!
//! Owns every notion of "where narration is": the live paragraph, the latest
//! known paragraph, the pending resume index, the last pause time, and the
//! last chapter narration was active in. Progress writes go to the fast
//! key/value store and the slower chapter record; both are fire-and-forget.

use std::sync::Arc;

use narrate_core::{
    Chapter, ChapterId, ChapterRepository, ProgressStore, TtsPersistenceState, keys,
};

/// Clamp `target` into `[0, total - 1]`. Returns 0 for an empty chapter.
pub fn clamp_paragraph_index(target: i64, total: usize) -> usize {
    if total == 0 || target < 0 {
        return 0;
    }
    let max = total - 1;
    match usize::try_from(target) {
        Ok(index) if index <= max => index,
        _ => {
            tracing::warn!(target, max, "Paragraph index out of range, clamping to last paragraph");
            max
        }
    }
}

/// Best resume position across the three sources; missing sources count as -1.
pub fn resolve_resume_index(in_memory: Option<i64>, persisted: Option<i64>, pending: i64) -> i64 {
    in_memory
        .unwrap_or(-1)
        .max(persisted.unwrap_or(-1))
        .max(pending)
}

/// A `save` message reduced to what the filter needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveRequest {
    pub chapter_id: Option<ChapterId>,
    pub paragraph_index: Option<i64>,
}

/// State the save filter compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveContext {
    pub chapter_id: ChapterId,
    pub is_reading: bool,
    pub current_index: Option<i64>,
    pub latest_index: Option<i64>,
    /// A chapter change happened within the save grace window.
    pub in_transition_grace: bool,
}

/// Why a `save` message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRejection {
    MissingChapter,
    StaleChapter,
    NonTtsWhileReading,
    Backwards,
    BehindLatestDuringTransition,
    ZeroDuringTransition,
}

/// Decide whether a `save` message should be persisted.
pub fn evaluate_save(save: SaveRequest, ctx: SaveContext) -> Result<(), SaveRejection> {
    let Some(chapter_id) = save.chapter_id else {
        return Err(SaveRejection::MissingChapter);
    };
    if chapter_id != ctx.chapter_id {
        return Err(SaveRejection::StaleChapter);
    }

    let current = ctx.current_index.unwrap_or(-1);
    if ctx.is_reading {
        let Some(index) = save.paragraph_index else {
            return Err(SaveRejection::NonTtsWhileReading);
        };
        if current >= 0 && index < current - 1 {
            return Err(SaveRejection::Backwards);
        }
    }

    if ctx.in_transition_grace {
        if let Some(index) = save.paragraph_index {
            let latest = ctx.latest_index.unwrap_or(-1);
            if index < latest {
                return Err(SaveRejection::BehindLatestDuringTransition);
            }
            if index == 0 && current.max(latest) > 0 {
                return Err(SaveRejection::ZeroDuringTransition);
            }
        }
    }

    Ok(())
}

pub struct PositionTracker {
    store: Arc<dyn ProgressStore>,
    chapters: Arc<dyn ChapterRepository>,
    current_index: Option<i64>,
    latest_index: Option<i64>,
    pending_resume_index: i64,
    last_pause_ms: Option<i64>,
    last_tts_chapter_id: Option<ChapterId>,
    snapshot: Option<TtsPersistenceState>,
}

impl PositionTracker {
    pub fn new(store: Arc<dyn ProgressStore>, chapters: Arc<dyn ChapterRepository>) -> Self {
        Self {
            store,
            chapters,
            current_index: None,
            latest_index: None,
            pending_resume_index: -1,
            last_pause_ms: None,
            last_tts_chapter_id: None,
            snapshot: None,
        }
    }

    pub const fn current_index(&self) -> Option<i64> {
        self.current_index
    }

    pub const fn latest_index(&self) -> Option<i64> {
        self.latest_index
    }

    pub const fn pending_resume_index(&self) -> i64 {
        self.pending_resume_index
    }

    pub const fn last_pause_ms(&self) -> Option<i64> {
        self.last_pause_ms
    }

    pub const fn last_tts_chapter_id(&self) -> Option<ChapterId> {
        self.last_tts_chapter_id
    }

    pub const fn snapshot(&self) -> Option<&TtsPersistenceState> {
        self.snapshot.as_ref()
    }

    /// Live paragraph reported by the engine or the surface.
    pub fn set_current(&mut self, index: i64) {
        self.current_index = Some(index);
    }

    pub fn set_latest(&mut self, index: i64) {
        self.latest_index = Some(index);
    }

    /// Record that narration moved to `index` (both live and latest).
    pub fn advance_to(&mut self, index: i64) {
        self.current_index = Some(index);
        self.latest_index = Some(self.latest_index.map_or(index, |l| l.max(index)));
    }

    pub fn set_pending_resume(&mut self, index: i64) {
        self.pending_resume_index = index;
    }

    pub fn mark_paused(&mut self, now_ms: i64) {
        self.last_pause_ms = Some(now_ms);
    }

    pub fn clear_pause(&mut self) {
        self.last_pause_ms = None;
    }

    /// Cache a snapshot reported by the surface.
    pub fn cache_snapshot(&mut self, snapshot: TtsPersistenceState) {
        self.current_index = Some(snapshot.paragraph_index);
        self.snapshot = Some(snapshot);
    }

    /// Forget per-chapter positions when a different chapter loads.
    pub fn reset_for_chapter(&mut self, initial_index: Option<i64>) {
        self.current_index = initial_index;
        self.latest_index = initial_index;
        self.pending_resume_index = -1;
        self.snapshot = None;
    }

    /// Forget every position marker, including the last active chapter.
    pub fn clear_markers(&mut self) {
        self.reset_for_chapter(None);
        self.last_pause_ms = None;
        self.last_tts_chapter_id = None;
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Remember which chapter narration was last active in.
    pub async fn update_last_known_chapter(&mut self, chapter_id: ChapterId) {
        self.last_tts_chapter_id = Some(chapter_id);
        if let Err(e) = self
            .store
            .set_number(keys::LAST_TTS_CHAPTER_ID, chapter_id)
            .await
        {
            tracing::warn!(chapter_id, error = %e, "Failed to persist last TTS chapter");
        }
    }

    /// Persisted paragraph index for a chapter; lookup failures read as absent.
    pub async fn persisted_index(&self, chapter_id: ChapterId) -> Option<i64> {
        match self.store.get_number(&keys::chapter_progress(chapter_id)).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "Failed to read persisted progress");
                None
            }
        }
    }

    /// Persist a paragraph position, and the percentage when known.
    pub async fn persist_position(
        &mut self,
        chapter_id: ChapterId,
        index: i64,
        percent: Option<i64>,
    ) {
        self.latest_index = Some(index);
        if let Err(e) = self
            .store
            .set_number(&keys::chapter_progress(chapter_id), index)
            .await
        {
            tracing::warn!(chapter_id, index, error = %e, "Failed to persist paragraph index");
        }
        if let Some(percent) = percent {
            if let Err(e) = self.chapters.update_progress(chapter_id, percent).await {
                tracing::warn!(chapter_id, percent, error = %e, "Failed to update chapter progress");
            }
        }
    }

    /// Resolve the resume position and write it back to the in-memory and
    /// pending slots.
    pub async fn resolve_resume(&mut self, chapter_id: ChapterId) -> i64 {
        let persisted = self.persisted_index(chapter_id).await;
        let resolved =
            resolve_resume_index(self.latest_index, persisted, self.pending_resume_index);
        tracing::info!(
            chapter_id,
            in_memory = ?self.latest_index,
            persisted = ?persisted,
            pending = self.pending_resume_index,
            resolved,
            "Resolved resume position"
        );
        self.latest_index = Some(resolved);
        self.pending_resume_index = resolved;
        resolved
    }

    /// Merge `index` into the chapter's previous snapshot and store it.
    pub async fn save_snapshot(
        &mut self,
        chapter: &Chapter,
        index: i64,
        now_ms: i64,
        is_reading: Option<bool>,
    ) -> TtsPersistenceState {
        let previous = self
            .snapshot
            .take()
            .or_else(|| TtsPersistenceState::parse(chapter.tts_state.as_deref()));
        let mut state = TtsPersistenceState::merged(previous, index, now_ms);
        state.chapter_id = Some(chapter.id);
        if is_reading.is_some() {
            state.is_reading = is_reading;
        }
        if let Err(e) = self.chapters.save_tts_state(chapter.id, Some(&state)).await {
            tracing::warn!(chapter_id = chapter.id, error = %e, "Failed to save TTS snapshot");
        }
        self.snapshot = Some(state.clone());
        state
    }

    /// Delete every persisted key for `chapter_ids` plus the chapter markers.
    pub async fn clear_persisted(&mut self, chapter_ids: &[ChapterId]) {
        for &chapter_id in chapter_ids {
            if let Err(e) = self.store.delete(&keys::chapter_progress(chapter_id)).await {
                tracing::warn!(chapter_id, error = %e, "Failed to clear chapter progress");
            }
            if let Err(e) = self.chapters.save_tts_state(chapter_id, None).await {
                tracing::warn!(chapter_id, error = %e, "Failed to clear TTS snapshot");
            }
        }
        for key in [
            keys::LAST_TTS_CHAPTER_ID,
            keys::PENDING_TTS_RESUME_CHAPTER_ID,
            keys::TTS_BUTTON_POSITION,
        ] {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(key, error = %e, "Failed to clear marker");
            }
        }
        self.clear_markers();
    }

    /// Take the pending-resume marker if it names `chapter_id`.
    pub async fn take_pending_resume_marker(&self, chapter_id: ChapterId) -> bool {
        match self.store.get_number(keys::PENDING_TTS_RESUME_CHAPTER_ID).await {
            Ok(Some(id)) if id == chapter_id => {
                if let Err(e) = self.store.delete(keys::PENDING_TTS_RESUME_CHAPTER_ID).await {
                    tracing::warn!(chapter_id, error = %e, "Failed to clear pending resume marker");
                }
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "Failed to read pending resume marker");
                false
            }
        }
    }
}
