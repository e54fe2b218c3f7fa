//! Domain types shared by the coordinator and its adapters.
//!
//! These types are pure data: no I/O, no runtime handles. Wire-facing types
//! serialize in camelCase to match the rendering surface's JSON.

mod chapter;
mod playback;
mod progress;
mod speech;

pub use chapter::{Chapter, ChapterDirection, ChapterId, ConflictingChapter, Novel, NovelId};
pub use playback::PlaybackState;
pub use progress::{ExitDialogData, TtsPersistenceState, progress_percent};
pub use speech::{
    Utterance, VoiceInfo, VoiceParams, parse_utterance_id, parse_utterance_index, utterance_id,
};
