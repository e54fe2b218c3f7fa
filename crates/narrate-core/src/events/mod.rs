//! Canonical event union emitted by the coordinator.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "narration_started", "chapterId": 12, "paragraphIndex": 40 }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{ChapterId, ConflictingChapter, PlaybackState};

/// Recovery workflow kinds, one per dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Resume,
    ChapterSelection,
    ScrollSync,
    ManualMode,
    Exit,
    WakeSync,
}

/// Why narration stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Explicit stop from the user or the surface.
    User,
    /// Auto-stop budget exhausted.
    AutoStop { detail: String },
    /// Last paragraph of the chapter finished.
    EndOfChapter,
    /// User switched to manual reading.
    ManualMode,
    /// Reader is being left.
    Exit,
}

/// Events emitted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    /// Queue manager state transition.
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },

    /// Narration (re)started at a paragraph.
    NarrationStarted {
        #[serde(rename = "chapterId")]
        chapter_id: ChapterId,
        #[serde(rename = "paragraphIndex")]
        paragraph_index: i64,
    },

    /// Narration paused; position kept.
    NarrationPaused {
        #[serde(rename = "chapterId")]
        chapter_id: ChapterId,
        #[serde(rename = "paragraphIndex")]
        paragraph_index: i64,
    },

    /// Narration stopped.
    NarrationStopped {
        #[serde(rename = "chapterId")]
        chapter_id: Option<ChapterId>,
        reason: StopReason,
    },

    /// The engine started a new paragraph.
    ParagraphChanged {
        #[serde(rename = "chapterId")]
        chapter_id: ChapterId,
        #[serde(rename = "paragraphIndex")]
        paragraph_index: i64,
    },

    /// A recovery workflow became visible.
    WorkflowOpened { workflow: WorkflowKind },

    /// A recovery workflow was dismissed.
    WorkflowClosed { workflow: WorkflowKind },

    /// Other recently-read chapters conflict with the current one.
    ConflictsFound { chapters: Vec<ConflictingChapter> },

    /// Narration audio may be degraded.
    AudioDegraded { message: String },

    /// The current chapter's content finished playing.
    ChapterFinished {
        #[serde(rename = "chapterId")]
        chapter_id: ChapterId,
    },

    /// The rendering surface settled after a chapter change.
    SurfaceSynced {
        #[serde(rename = "chapterId")]
        chapter_id: ChapterId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_type_tag() {
        let json = serde_json::to_value(CoordinatorEvent::NarrationStarted {
            chapter_id: 12,
            paragraph_index: 40,
        })
        .unwrap();
        assert_eq!(json["type"], "narration_started");
        assert_eq!(json["chapterId"], 12);
        assert_eq!(json["paragraphIndex"], 40);
    }

    #[test]
    fn stop_reason_is_tagged() {
        let json = serde_json::to_value(StopReason::AutoStop {
            detail: "30 minutes".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "auto_stop");
    }
}
