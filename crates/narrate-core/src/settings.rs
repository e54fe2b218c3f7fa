//! Narration settings and validation.
//!
//! Pure domain types with no infrastructure dependencies. Persisted as a single
//! JSON document by a [`crate::ports::SettingsRepository`].

use serde::{Deserialize, Serialize};

use crate::domain::VoiceParams;

/// Lowest accepted speech rate and pitch.
pub const MIN_VOICE_SCALE: f32 = 0.1;

/// Highest accepted speech rate and pitch.
pub const MAX_VOICE_SCALE: f32 = 4.0;

/// What happens to chapters ahead of the one narration restarts in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardResetMode {
    /// Leave following chapters untouched.
    #[default]
    None,
    /// Clear saved positions and progress of following chapters.
    Position,
    /// Clear positions and progress, and mark following chapters unread.
    Unread,
}

/// How many following chapters a forward reset touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardResetScope {
    Next,
    Next5,
    Next10,
    #[default]
    All,
}

impl ForwardResetScope {
    /// Maximum number of chapters reset, `None` for unbounded.
    pub const fn limit(self) -> Option<u32> {
        match self {
            Self::Next => Some(1),
            Self::Next5 => Some(5),
            Self::Next10 => Some(10),
            Self::All => None,
        }
    }
}

/// Whether narration carries on into the next chapter when one finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinueMode {
    #[default]
    None,
    /// Chain at most this many chapters, then stop.
    Chapters(u32),
    Continuous,
}

/// Unit of the auto-stop budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoStopMode {
    #[default]
    Off,
    Minutes,
    Chapters,
    Paragraphs,
}

/// Sleep-timer style limit on narration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoStopConfig {
    pub mode: AutoStopMode,
    pub amount: u32,
}

impl AutoStopConfig {
    pub const fn off() -> Self {
        Self {
            mode: AutoStopMode::Off,
            amount: 0,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        !matches!(self.mode, AutoStopMode::Off) && self.amount > 0
    }
}

/// Global narration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NarrationSettings {
    /// Engine voice identifier; `None` uses the system default.
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub forward_reset: ForwardResetMode,
    pub forward_reset_scope: ForwardResetScope,
    pub continue_to_next_chapter: ContinueMode,
    pub auto_stop: AutoStopConfig,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl NarrationSettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            forward_reset: ForwardResetMode::None,
            forward_reset_scope: ForwardResetScope::All,
            continue_to_next_chapter: ContinueMode::None,
            auto_stop: AutoStopConfig::off(),
        }
    }

    /// Voice parameters for a novel, honouring its override when enabled.
    pub fn voice_params(&self, novel: Option<&NovelTtsSettings>) -> VoiceParams {
        match novel {
            Some(n) if n.enabled => VoiceParams {
                voice: n.voice.clone().or_else(|| self.voice.clone()),
                rate: n.rate.unwrap_or(self.rate),
                pitch: n.pitch.unwrap_or(self.pitch),
            },
            _ => VoiceParams {
                voice: self.voice.clone(),
                rate: self.rate,
                pitch: self.pitch,
            },
        }
    }

    /// Merge a partial update into these settings.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(ref voice) = other.voice {
            self.voice.clone_from(voice);
        }
        if let Some(rate) = other.rate {
            self.rate = rate;
        }
        if let Some(pitch) = other.pitch {
            self.pitch = pitch;
        }
        if let Some(mode) = other.forward_reset {
            self.forward_reset = mode;
        }
        if let Some(scope) = other.forward_reset_scope {
            self.forward_reset_scope = scope;
        }
        if let Some(mode) = other.continue_to_next_chapter {
            self.continue_to_next_chapter = mode;
        }
        if let Some(auto_stop) = other.auto_stop {
            self.auto_stop = auto_stop;
        }
    }
}

/// Partial settings update.
///
/// `None` leaves a field unchanged; for `voice`, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub voice: Option<Option<String>>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub forward_reset: Option<ForwardResetMode>,
    pub forward_reset_scope: Option<ForwardResetScope>,
    pub continue_to_next_chapter: Option<ContinueMode>,
    pub auto_stop: Option<AutoStopConfig>,
}

/// Per-novel voice override, stored under `NOVEL_TTS_SETTINGS_{novelId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NovelTtsSettings {
    pub enabled: bool,
    pub voice: Option<String>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
}

/// Errors from settings validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Speech rate must be between 0.1 and 4.0, got {0}")]
    InvalidRate(f32),

    #[error("Speech pitch must be between 0.1 and 4.0, got {0}")]
    InvalidPitch(f32),

    #[error("Auto-stop amount must be greater than zero")]
    ZeroAutoStopAmount,

    #[error("Chapter continuation limit must be greater than zero")]
    ZeroContinueLimit,

    #[error("Voice identifier cannot be empty")]
    EmptyVoice,
}

/// Validate settings values.
pub fn validate_settings(settings: &NarrationSettings) -> Result<(), SettingsError> {
    let scale = MIN_VOICE_SCALE..=MAX_VOICE_SCALE;
    if !scale.contains(&settings.rate) {
        return Err(SettingsError::InvalidRate(settings.rate));
    }
    if !scale.contains(&settings.pitch) {
        return Err(SettingsError::InvalidPitch(settings.pitch));
    }

    if !matches!(settings.auto_stop.mode, AutoStopMode::Off) && settings.auto_stop.amount == 0 {
        return Err(SettingsError::ZeroAutoStopAmount);
    }

    if settings.continue_to_next_chapter == ContinueMode::Chapters(0) {
        return Err(SettingsError::ZeroContinueLimit);
    }

    if let Some(ref voice) = settings.voice {
        if voice.trim().is_empty() {
            return Err(SettingsError::EmptyVoice);
        }
    }

    Ok(())
}
