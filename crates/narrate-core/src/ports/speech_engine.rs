//! Speech engine port.
//!
//! The platform speech engine is the only shared mutable resource outside the
//! process. All access funnels through the queue manager, which owns the
//! single instance injected here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::{Utterance, VoiceInfo, VoiceParams};

/// Errors reported by a speech engine adapter.
///
/// All of these are treated as transient by the coordinator: they are retried,
/// degraded to the default voice, or end in "no audio, narration paused".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine is not initialised or has been released.
    #[error("Speech engine unavailable: {0}")]
    Unavailable(String),

    /// The requested voice is busy or not installed.
    #[error("Voice busy: {0}")]
    VoiceBusy(String),

    /// The engine refused the request.
    #[error("Speech engine rejected request: {0}")]
    Rejected(String),

    /// The event stream closed.
    #[error("Speech engine event stream closed")]
    Closed,
}

/// Signals emitted by the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine began speaking an utterance.
    SpeechStart { utterance_id: String },
    /// The engine finished an utterance.
    SpeechDone { utterance_id: String },
    /// The native queue ran dry.
    QueueEmpty,
    /// The engine reported an error for an utterance.
    SpeechError {
        utterance_id: Option<String>,
        message: String,
    },
}

/// Platform speech engine.
///
/// # Design Rules
///
/// - Calls may suspend for arbitrary time and may fail; callers must tolerate both
/// - `subscribe` may be called more than once; each receiver sees every event
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak a single utterance immediately, replacing whatever is queued.
    async fn speak(&self, utterance: &Utterance, params: &VoiceParams) -> Result<(), EngineError>;

    /// Clear the native queue and enqueue a fresh batch.
    async fn speak_batch(
        &self,
        utterances: &[Utterance],
        params: &VoiceParams,
    ) -> Result<(), EngineError>;

    /// Append to the native queue using the parameters of the current batch.
    async fn add_to_batch(&self, utterances: &[Utterance]) -> Result<(), EngineError>;

    /// Number of utterances still queued natively.
    async fn queue_size(&self) -> Result<usize, EngineError>;

    /// Halt speech and clear the native queue.
    async fn stop(&self) -> Result<(), EngineError>;

    /// Halt speech without discarding the notion of position.
    async fn pause(&self) -> Result<(), EngineError>;

    /// Voices offered by the engine.
    async fn voices(&self) -> Result<Vec<VoiceInfo>, EngineError>;

    /// Subscribe to engine events.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}
