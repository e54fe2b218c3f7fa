//! Rendering surface port (coordinator → surface direction).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ChapterId;

/// Choice made in the manual-mode dialog, forwarded to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualModeChoice {
    Stop,
    Continue,
}

/// Instructions injected into the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SurfaceCommand {
    /// Restore narration at a paragraph, optionally starting playback.
    #[serde(rename_all = "camelCase")]
    RestoreState {
        paragraph_index: i64,
        should_resume: bool,
        auto_start: bool,
    },
    #[serde(rename_all = "camelCase")]
    Highlight { paragraph_index: i64 },
    ApplySettings {
        rate: f32,
        pitch: f32,
        voice: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ChangeParagraphPosition { paragraph_index: i64 },
    Resume { force: bool },
    Pause,
    /// Mark auto-resume as handled and start narration afresh from the
    /// surface's own reading position.
    StartFresh,
    /// Start at the first readable paragraph, or the default start if none.
    StartFromFirstReadable,
    /// Record where narration restarts after the stitched view is cleared.
    #[serde(rename_all = "camelCase")]
    SetRestartIntent {
        chapter_id: ChapterId,
        local_index: i64,
        auto_resume: bool,
    },
    ClearStitchedChapters,
    ManualMode { choice: ManualModeChoice },
    Stop,
}

/// The embedded rendering surface.
///
/// The surface may be missing or not yet loaded; callers check `is_ready`
/// and treat an unready surface as a no-op, not an error.
#[async_trait]
pub trait ReaderSurface: Send + Sync {
    /// Whether the surface can accept commands.
    fn is_ready(&self) -> bool;

    /// Inject a command. Fire-and-forget.
    fn inject(&self, command: &SurfaceCommand);

    /// Paragraph currently visible on screen, if the surface can tell.
    async fn visible_paragraph(&self) -> Option<i64>;
}

/// Surface that is never ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSurface;

#[async_trait]
impl ReaderSurface for NoopSurface {
    fn is_ready(&self) -> bool {
        false
    }

    fn inject(&self, _command: &SurfaceCommand) {}

    async fn visible_paragraph(&self) -> Option<i64> {
        None
    }
}
