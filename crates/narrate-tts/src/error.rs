//! Coordinator error types.

use narrate_core::{EngineError, RepositoryError, WorkflowKind};

/// Errors from the audio queue manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Nothing to speak.
    #[error("Narration queue is empty")]
    EmptyQueue,

    /// Every attempt, including the voice fallbacks, failed.
    #[error("Speech engine failed after fallbacks: {0}")]
    Engine(#[from] EngineError),
}

/// Errors from workflow orchestration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// Another workflow is already visible.
    #[error("Cannot open {requested:?} while {active:?} is visible")]
    Busy {
        active: WorkflowKind,
        requested: WorkflowKind,
    },

    /// No workflow is visible.
    #[error("No workflow is visible")]
    NoneActive,

    /// The response does not belong to the visible workflow.
    #[error("{action} is not a valid response to {workflow:?}")]
    UnexpectedResponse {
        workflow: WorkflowKind,
        action: &'static str,
    },
}

/// Errors that can occur in the narration coordinator.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// No chapter is loaded.
    #[error("No chapter loaded")]
    NoChapter,

    /// The loaded chapter has no readable paragraphs.
    #[error("Chapter {0} has no readable paragraphs")]
    EmptyChapter(i64),

    /// Queue manager failure.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Workflow orchestration failure.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Speech engine failure outside the queue.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The coordinator service has shut down.
    #[error("Coordinator service stopped")]
    ServiceStopped,
}
