//! Playback state machine.
//!
//! Wraps [`PlaybackState`] with transition validation. Invalid transitions are
//! logged as errors and applied anyway: narration continuity wins over strict
//! enforcement.

use narrate_core::PlaybackState;

/// A transition that changed the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PlaybackState,
    pub to: PlaybackState,
}

#[derive(Debug, Default)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
    invalid_transitions: u64,
}

impl PlaybackStateMachine {
    pub const fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            invalid_transitions: 0,
        }
    }

    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Number of out-of-table transitions applied so far.
    pub const fn invalid_transitions(&self) -> u64 {
        self.invalid_transitions
    }

    /// Move to `next`. Returns the transition when the state actually changed.
    pub fn transition(&mut self, next: PlaybackState) -> Option<Transition> {
        let from = self.state;
        if !from.can_transition_to(next) {
            self.invalid_transitions += 1;
            tracing::error!(
                from = %from,
                to = %next,
                "Invalid playback state transition, applying anyway"
            );
        }
        if from == next {
            return None;
        }
        tracing::debug!(old = %from, new = %next, "Playback state transition");
        self.state = next;
        Some(Transition { from, to: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackState::{Idle, Playing, Refilling, Starting, Stopping};

    #[test]
    fn starts_idle() {
        let machine = PlaybackStateMachine::new();
        assert_eq!(machine.state(), Idle);
    }

    #[test]
    fn full_cycle_is_valid() {
        let mut machine = PlaybackStateMachine::new();
        for next in [Starting, Playing, Refilling, Playing, Stopping, Idle] {
            assert!(machine.transition(next).is_some());
        }
        assert_eq!(machine.invalid_transitions(), 0);
    }

    #[test]
    fn self_transition_is_silent() {
        let mut machine = PlaybackStateMachine::new();
        assert_eq!(machine.transition(Idle), None);
        assert_eq!(machine.invalid_transitions(), 0);
    }

    #[test]
    fn invalid_transition_is_applied_and_counted() {
        let mut machine = PlaybackStateMachine::new();
        let t = machine.transition(Playing);
        assert_eq!(
            t,
            Some(Transition {
                from: Idle,
                to: Playing
            })
        );
        assert_eq!(machine.state(), Playing);
        assert_eq!(machine.invalid_transitions(), 1);
    }

    #[test]
    fn restart_from_stopping_is_valid() {
        let mut machine = PlaybackStateMachine::new();
        machine.transition(Starting);
        machine.transition(Stopping);
        machine.transition(Starting);
        assert_eq!(machine.invalid_transitions(), 0);
    }
}
