//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the coordinator uses to reach the speech
//! engine, storage, the rendering surface, and the host application. Adapters
//! implement them; the coordinator only ever holds `Arc<dyn Port>`.
//!
//! # Design Rules
//!
//! - No storage or platform types in signatures
//! - Traits are `Send + Sync` so adapters can be shared across tasks
//! - Fallible operations return typed errors; callers decide how to degrade

use thiserror::Error;

mod chapter_repository;
mod clock;
mod event_emitter;
mod media_notifier;
mod progress_store;
mod reader_host;
mod reader_surface;
mod settings_repository;
mod speech_engine;

pub use chapter_repository::ChapterRepository;
pub use clock::{Clock, SystemClock};
pub use event_emitter::{ChannelEmitter, CoordinatorEventEmitter, NoopEmitter};
pub use media_notifier::{MediaNotifier, MediaSessionState, NoopMediaNotifier};
pub use progress_store::{ProgressStore, keys};
pub use reader_host::ReaderHost;
pub use reader_surface::{ManualModeChoice, NoopSurface, ReaderSurface, SurfaceCommand};
pub use settings_repository::SettingsRepository;
pub use speech_engine::{EngineError, EngineEvent, SpeechEngine};

/// Domain-specific errors for storage operations.
///
/// This error type abstracts away storage implementation details
/// and provides a clean interface for the coordinator to handle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A constraint was violated (e.g., foreign key, unique constraint).
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Root error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Speech engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Settings validation error.
    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),
}
