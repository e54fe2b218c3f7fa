//! Core domain types and port definitions for the narration coordinator.
//!
//! This crate has no I/O. Adapters (`narrate-db`, platform bridges) implement
//! the traits in [`ports`]; `narrate-tts` consumes them.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;

pub use domain::{
    Chapter, ChapterDirection, ChapterId, ConflictingChapter, ExitDialogData, Novel, NovelId,
    PlaybackState, TtsPersistenceState, Utterance, VoiceInfo, VoiceParams, parse_utterance_id,
    parse_utterance_index, progress_percent, utterance_id,
};
pub use events::{CoordinatorEvent, StopReason, WorkflowKind};
pub use ports::{
    ChannelEmitter, ChapterRepository, Clock, CoordinatorEventEmitter, CoreError, EngineError,
    EngineEvent, ManualModeChoice, MediaNotifier, MediaSessionState, NoopEmitter,
    NoopMediaNotifier, NoopSurface, ProgressStore, ReaderHost, ReaderSurface, RepositoryError,
    SettingsRepository, SpeechEngine, SurfaceCommand, SystemClock, keys,
};
pub use settings::{
    AutoStopConfig, AutoStopMode, ContinueMode, ForwardResetMode, ForwardResetScope,
    NarrationSettings, NovelTtsSettings, SettingsError, SettingsUpdate, validate_settings,
};

// Used by integration tests only
#[cfg(test)]
use mockall as _;
