use serde::{Deserialize, Serialize};

/// Lifecycle of one narration cycle.
///
/// `Idle` is both the initial state and the state every cycle returns to;
/// there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    #[default]
    Idle,
    Starting,
    Playing,
    Refilling,
    Stopping,
}

impl PlaybackState {
    /// Whether moving from `self` to `next` is part of the transition table.
    ///
    /// Self-transitions are always valid.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use PlaybackState::{Idle, Playing, Refilling, Starting, Stopping};

        if self as u8 == next as u8 {
            return true;
        }
        matches!(
            (self, next),
            (Idle | Stopping, Starting)
                | (Starting | Refilling, Playing)
                | (Playing, Refilling)
                | (Playing | Starting | Refilling, Stopping)
                | (Stopping, Idle)
        )
    }

    /// Narration is live: audio is queued or about to be.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Playing | Self::Refilling)
    }

    /// States in which a native "queue empty" signal is expected noise.
    pub const fn is_transitional(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping | Self::Refilling)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Starting => "STARTING",
            Self::Playing => "PLAYING",
            Self::Refilling => "REFILLING",
            Self::Stopping => "STOPPING",
        };
        f.write_str(name)
    }
}
