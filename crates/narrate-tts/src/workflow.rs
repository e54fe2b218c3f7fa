//! Dialog workflow orchestration.
//!
//! At most one recovery workflow is visible at a time. The orchestrator holds
//! the single active [`DialogWorkflow`] value; entering a new workflow while
//! another is visible is refused with [`WorkflowError::Busy`].

use std::sync::Arc;

use narrate_core::{
    ChapterId, ConflictingChapter, CoordinatorEvent, CoordinatorEventEmitter, ExitDialogData,
    WorkflowKind,
};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// One chapter inside a stitched view, in global paragraph coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchedSegment {
    pub chapter_id: ChapterId,
    #[serde(default)]
    pub name: Option<String>,
    pub start_index: i64,
    pub paragraph_count: i64,
}

/// Data behind the scroll-sync dialog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollSyncPrompt {
    /// Where narration is, in the surface's coordinates.
    pub current_index: i64,
    /// Where the reader scrolled to.
    pub visible_index: i64,
    pub current_chapter_name: Option<String>,
    pub visible_chapter_name: Option<String>,
    pub is_stitched: bool,
    /// Set when the prompt was raised by a resume attempt.
    pub is_resume: bool,
    /// Chapters of the stitched view, when the surface reports them.
    pub chapters: Vec<StitchedSegment>,
}

impl ScrollSyncPrompt {
    /// Map a global paragraph index of the stitched view to
    /// `(chapter, local index)`.
    pub fn locate(&self, global_index: i64) -> Option<(ChapterId, i64)> {
        self.chapters
            .iter()
            .find(|s| {
                global_index >= s.start_index && global_index < s.start_index + s.paragraph_count
            })
            .map(|s| (s.chapter_id, global_index - s.start_index))
    }
}

/// Status of a wake-sync recovery. Reaching the target chapter closes the
/// workflow instead of recording a final status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Syncing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WakeSyncState {
    pub status: SyncStatus,
    pub target_chapter_id: Option<ChapterId>,
    pub retry_count: u32,
}

/// The active recovery workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogWorkflow {
    #[default]
    None,
    Resume,
    ChapterSelection {
        candidates: Vec<ConflictingChapter>,
    },
    ScrollSync(ScrollSyncPrompt),
    ManualMode,
    Exit(ExitDialogData),
    WakeSync(WakeSyncState),
}

impl DialogWorkflow {
    pub const fn kind(&self) -> Option<WorkflowKind> {
        match self {
            Self::None => None,
            Self::Resume => Some(WorkflowKind::Resume),
            Self::ChapterSelection { .. } => Some(WorkflowKind::ChapterSelection),
            Self::ScrollSync(_) => Some(WorkflowKind::ScrollSync),
            Self::ManualMode => Some(WorkflowKind::ManualMode),
            Self::Exit(_) => Some(WorkflowKind::Exit),
            Self::WakeSync(_) => Some(WorkflowKind::WakeSync),
        }
    }
}

/// A user's answer to the visible dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowResponse {
    /// Resume / scroll-sync confirm.
    Confirm,
    /// Resume / scroll-sync / chapter-selection cancel.
    Cancel,
    /// Resume dialog: start the chapter over.
    RestartChapter,
    /// Chapter selection: continue from this chapter.
    #[serde(rename_all = "camelCase")]
    SelectChapter { chapter_id: ChapterId },
    ManualStop,
    ManualContinue,
    ExitWithTtsPosition,
    ExitWithReaderPosition,
    Retry,
    Dismiss,
}

impl WorkflowResponse {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
            Self::RestartChapter => "restart_chapter",
            Self::SelectChapter { .. } => "select_chapter",
            Self::ManualStop => "manual_stop",
            Self::ManualContinue => "manual_continue",
            Self::ExitWithTtsPosition => "exit_with_tts_position",
            Self::ExitWithReaderPosition => "exit_with_reader_position",
            Self::Retry => "retry",
            Self::Dismiss => "dismiss",
        }
    }
}

pub struct WorkflowOrchestrator {
    active: DialogWorkflow,
    emitter: Arc<dyn CoordinatorEventEmitter>,
}

impl WorkflowOrchestrator {
    pub fn new(emitter: Arc<dyn CoordinatorEventEmitter>) -> Self {
        Self {
            active: DialogWorkflow::None,
            emitter,
        }
    }

    pub const fn active(&self) -> &DialogWorkflow {
        &self.active
    }

    pub const fn kind(&self) -> Option<WorkflowKind> {
        self.active.kind()
    }

    pub const fn is_visible(&self) -> bool {
        !matches!(self.active, DialogWorkflow::None)
    }

    /// Show `workflow`. Refused while another workflow is visible.
    pub fn enter(&mut self, workflow: DialogWorkflow) -> Result<(), WorkflowError> {
        let Some(requested) = workflow.kind() else {
            self.dismiss();
            return Ok(());
        };
        if let Some(active) = self.active.kind() {
            return Err(WorkflowError::Busy { active, requested });
        }
        tracing::info!(workflow = ?requested, "Workflow opened");
        self.active = workflow;
        self.emitter
            .emit(CoordinatorEvent::WorkflowOpened { workflow: requested });
        Ok(())
    }

    /// Replace the data of the visible workflow of the same kind (wake-sync
    /// status updates).
    pub fn update(&mut self, workflow: DialogWorkflow) -> Result<(), WorkflowError> {
        match (self.active.kind(), workflow.kind()) {
            (Some(active), Some(next)) if active == next => {
                self.active = workflow;
                Ok(())
            }
            (Some(active), Some(requested)) => Err(WorkflowError::Busy { active, requested }),
            (None, _) => Err(WorkflowError::NoneActive),
            (Some(_), None) => {
                self.dismiss();
                Ok(())
            }
        }
    }

    /// Hide the visible workflow and return it.
    pub fn dismiss(&mut self) -> DialogWorkflow {
        let previous = std::mem::take(&mut self.active);
        if let Some(workflow) = previous.kind() {
            tracing::info!(?workflow, "Workflow closed");
            self.emitter.emit(CoordinatorEvent::WorkflowClosed { workflow });
        }
        previous
    }
}
