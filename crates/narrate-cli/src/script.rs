//! Replay script format.
//!
//! One JSON object per line, tagged by `step`. Blank lines and lines starting
//! with `#` are skipped:
//!
//! ```text
//! # seed a novel, open chapter 1, start narration
//! {"step":"novel","id":1,"name":"The Long Road"}
//! {"step":"chapter","id":1,"novelId":1,"position":1}
//! {"step":"load","chapterId":1,"paragraphs":["One.","Two."]}
//! {"step":"message","message":{"type":"speak","data":"One.","paragraphIndex":0}}
//! {"step":"advance","count":2}
//! ```

use narrate_core::{Chapter, ChapterId, EngineEvent, NovelId, SettingsUpdate};
use narrate_tts::WorkflowResponse;
use serde::Deserialize;

use crate::error::CliError;

/// Chapter row to seed. Unlisted fields take the values of a fresh chapter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSeed {
    pub id: ChapterId,
    pub novel_id: NovelId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub chapter_number: Option<f64>,
    pub position: i64,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default = "default_unread")]
    pub unread: bool,
}

const fn default_unread() -> bool {
    true
}

impl From<ChapterSeed> for Chapter {
    fn from(seed: ChapterSeed) -> Self {
        Self {
            id: seed.id,
            novel_id: seed.novel_id,
            name: seed.name,
            chapter_number: seed.chapter_number,
            position: seed.position,
            progress: seed.progress,
            unread: seed.unread,
            tts_state: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Insert or rename a novel.
    Novel { id: NovelId, name: String },
    /// Insert or replace a chapter row.
    Chapter(ChapterSeed),
    /// Open a stored chapter with the given paragraphs; waits for the surface
    /// to sync.
    #[serde(rename_all = "camelCase")]
    Load {
        chapter_id: ChapterId,
        paragraphs: Vec<String>,
    },
    /// Post a raw surface message. The current nonce is added when missing.
    Message { message: serde_json::Value },
    /// Media-notification action name (`PLAY_PAUSE`, `SEEK_BACK`, ...).
    Media { action: String },
    Respond { response: WorkflowResponse },
    Back,
    Restart { index: i64 },
    /// Deliver one engine signal verbatim.
    Engine { event: EngineEvent },
    /// Let the engine speak the next `count` queued utterances.
    Advance {
        #[serde(default = "default_count")]
        count: u32,
    },
    /// Set the paragraph the simulated reader is looking at.
    Visible { index: Option<i64> },
    Background,
    WakeSyncFailed { target: Option<ChapterId> },
    Settings { update: SettingsUpdate },
    Wait { ms: u64 },
    Snapshot,
}

const fn default_count() -> u32 {
    1
}

/// A parsed step and the 1-based line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub step: ScriptStep,
}

/// Parse a whole script, failing on the first malformed line.
pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>, CliError> {
    text.lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.trim()))
        .filter(|(_, raw)| !raw.is_empty() && !raw.starts_with('#'))
        .map(|(line, raw)| {
            serde_json::from_str(raw)
                .map(|step| ScriptLine { line, step })
                .map_err(|e| CliError::script(line, e.to_string()))
        })
        .collect()
}
