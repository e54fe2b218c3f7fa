//! Event emitter trait for coordinator events.
//!
//! Implementations handle transport details (channels, platform bridges, logs).

use tokio::sync::mpsc;

use crate::events::CoordinatorEvent;

/// Trait for emitting coordinator events.
///
/// This abstraction keeps channel types out of the coordinator's public API.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and contexts that don't need events
/// - `ChannelEmitter` - Forwards into an unbounded channel
pub trait CoordinatorEventEmitter: Send + Sync {
    /// Emit an event. Must not block.
    fn emit(&self, event: CoordinatorEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn CoordinatorEventEmitter>;
}

/// A no-op event emitter.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl CoordinatorEventEmitter for NoopEmitter {
    fn emit(&self, _event: CoordinatorEvent) {}

    fn clone_box(&self) -> Box<dyn CoordinatorEventEmitter> {
        Box::new(self.clone())
    }
}

/// Emitter that forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CoordinatorEventEmitter for ChannelEmitter {
    fn emit(&self, event: CoordinatorEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("Coordinator event receiver dropped");
        }
    }

    fn clone_box(&self) -> Box<dyn CoordinatorEventEmitter> {
        Box::new(self.clone())
    }
}
