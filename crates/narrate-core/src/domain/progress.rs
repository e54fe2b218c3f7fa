use serde::{Deserialize, Serialize};

use super::ChapterId;

/// Snapshot serialized when the app is backgrounded mid-narration.
///
/// Superseded by fresh progress writes once narration resumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsPersistenceState {
    pub paragraph_index: i64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reading: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<ChapterId>,
}

impl TtsPersistenceState {
    /// Parse a stored snapshot, treating malformed JSON as absent.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        match serde_json::from_str(raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed TTS snapshot");
                None
            }
        }
    }

    /// Merge a new position into a previous snapshot, keeping the fields the
    /// position does not override.
    pub fn merged(previous: Option<Self>, paragraph_index: i64, timestamp: i64) -> Self {
        match previous {
            Some(prev) => Self {
                paragraph_index,
                timestamp,
                ..prev
            },
            None => Self {
                paragraph_index,
                timestamp,
                is_reading: None,
                chapter_id: None,
            },
        }
    }
}

/// Positions offered by the exit workflow.
///
/// `tts_paragraph` and `reader_paragraph` are distinct on purpose: one is where
/// narration was, the other where the reader scrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitDialogData {
    pub tts_paragraph: i64,
    pub reader_paragraph: i64,
    pub total_paragraphs: i64,
}

/// Percentage of a chapter reached once paragraph `index` has been read.
pub fn progress_percent(index: i64, total: usize) -> i64 {
    if total == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let percent = (((index + 1) as f64 / total as f64) * 100.0).round() as i64;
    percent.clamp(0, 100)
}
