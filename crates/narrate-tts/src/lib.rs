//! Narration coordinator for a novel reader.
//!
//! Drives a platform speech engine through a bounded, self-refilling queue,
//! tracks and persists the narration position, arbitrates between competing
//! resume candidates, and mediates the recovery dialogs shown to the user.
//!
//! The [`PlaybackCoordinator`] holds all session state. Hosts normally run it
//! behind [`CoordinatorService`], which serializes every input on one task.

#![deny(unused_crate_dependencies)]

pub mod arbitration;
pub mod auto_stop;
pub mod back;
pub mod coordinator;
pub mod error;
pub mod media;
pub mod position;
pub mod protocol;
pub mod queue;
pub mod service;
pub mod state;
pub mod transition;
pub mod workflow;

pub use arbitration::{ArbitrationConfig, ConfirmationDecision, ConflictArbiter};
pub use coordinator::{
    ChapterContext, CoordinatorConfig, CoordinatorPorts, CoordinatorSnapshot, PlaybackCoordinator,
};
pub use error::{QueueError, TtsError, WorkflowError};
pub use media::{MediaAction, UnknownMediaAction};
pub use position::PositionTracker;
pub use protocol::{SurfaceMessage, parse_surface_message};
pub use queue::{AudioQueueManager, QueueConfig, QueueDiagnostics, QueueProgress};
pub use service::{CoordinatorCommand, CoordinatorHandle, CoordinatorService};
pub use workflow::{DialogWorkflow, ScrollSyncPrompt, SyncStatus, WakeSyncState, WorkflowResponse};
