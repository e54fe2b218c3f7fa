//! Boundary protocol with the rendering surface.
//!
//! # Wire Format
//!
//! The surface posts JSON envelopes:
//!
//! ```json
//! { "type": "save", "data": 42, "paragraphIndex": 17, "chapterId": 9, "nonce": "…" }
//! ```
//!
//! Envelopes that fail to parse, carry an unknown type, carry a nonce other
//! than the one bound to the current page load, or carry wrongly-typed fields
//! are dropped without error.

use std::collections::VecDeque;
use std::time::Duration;

use narrate_core::{ChapterId, TtsPersistenceState};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::workflow::ScrollSyncPrompt;

/// A decoded message from the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceMessage {
    /// Dismiss the reading UI.
    Hide,
    Next {
        auto_start_tts: bool,
    },
    Prev,
    Save {
        percent: Option<i64>,
        paragraph_index: Option<i64>,
        chapter_id: Option<ChapterId>,
    },
    /// Start narrating at `paragraph_index`; `text` is that paragraph.
    Speak {
        text: String,
        paragraph_index: Option<i64>,
    },
    StopSpeak,
    TtsState(TtsPersistenceState),
    RequestTtsConfirmation {
        saved_index: i64,
    },
    RequestTtsExit {
        visible: i64,
        tts_index: i64,
    },
    ExitAllowed,
    /// `tts-scroll-prompt` and `tts-resume-location-prompt`; the latter
    /// arrives with `is_resume` set.
    ScrollPrompt(ScrollSyncPrompt),
    ManualModePrompt,
    SaveButtonPosition(Value),
    ShowToast(String),
}

impl SurfaceMessage {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Next { .. } => "next",
            Self::Prev => "prev",
            Self::Save { .. } => "save",
            Self::Speak { .. } => "speak",
            Self::StopSpeak => "stop-speak",
            Self::TtsState(_) => "tts-state",
            Self::RequestTtsConfirmation { .. } => "request-tts-confirmation",
            Self::RequestTtsExit { .. } => "request-tts-exit",
            Self::ExitAllowed => "exit-allowed",
            Self::ScrollPrompt(_) => "tts-scroll-prompt",
            Self::ManualModePrompt => "tts-manual-mode-prompt",
            Self::SaveButtonPosition(_) => "save-tts-position",
            Self::ShowToast(_) => "show-toast",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    paragraph_index: Value,
    #[serde(default)]
    chapter_id: Value,
    #[serde(default, rename = "autoStartTTS")]
    auto_start_tts: Value,
}

/// Decode a raw surface message bound to `expected_nonce`.
pub fn parse_surface_message(raw: &str, expected_nonce: &str) -> Option<SurfaceMessage> {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::trace!(error = %e, "Dropping unparsable surface message");
            return None;
        }
    };

    if envelope.nonce.as_deref() != Some(expected_nonce) {
        tracing::debug!(kind = %envelope.kind, "Dropping surface message with stale nonce");
        return None;
    }

    let message = decode(envelope);
    if message.is_none() {
        tracing::trace!("Dropping malformed surface message");
    }
    message
}

fn decode(envelope: Envelope) -> Option<SurfaceMessage> {
    let Envelope {
        kind,
        data,
        paragraph_index,
        chapter_id,
        auto_start_tts,
        ..
    } = envelope;

    let message = match kind.as_str() {
        "hide" => SurfaceMessage::Hide,
        "next" => SurfaceMessage::Next {
            auto_start_tts: auto_start_tts.as_bool().unwrap_or(false),
        },
        "prev" => SurfaceMessage::Prev,
        "save" => {
            let percent = as_int(&data).or_else(|| data.get("percent").and_then(as_int));
            let paragraph_index = as_int(&paragraph_index);
            if percent.is_none() && paragraph_index.is_none() {
                return None;
            }
            SurfaceMessage::Save {
                percent,
                paragraph_index,
                chapter_id: as_lenient_int(&chapter_id),
            }
        }
        "speak" => SurfaceMessage::Speak {
            text: data.as_str().filter(|t| !t.is_empty())?.to_string(),
            paragraph_index: as_int(&paragraph_index),
        },
        "stop-speak" => SurfaceMessage::StopSpeak,
        "tts-state" => SurfaceMessage::TtsState(serde_json::from_value(data).ok()?),
        "request-tts-confirmation" => SurfaceMessage::RequestTtsConfirmation {
            saved_index: as_int(&data)
                .or_else(|| data.get("savedIndex").and_then(as_int))?,
        },
        "request-tts-exit" => SurfaceMessage::RequestTtsExit {
            visible: data.get("visible").and_then(as_int)?,
            tts_index: data.get("ttsIndex").and_then(as_int)?,
        },
        "exit-allowed" => SurfaceMessage::ExitAllowed,
        "tts-scroll-prompt" | "tts-resume-location-prompt" => {
            let mut prompt: ScrollSyncPrompt = serde_json::from_value(data).ok()?;
            if kind == "tts-resume-location-prompt" {
                prompt.is_resume = true;
            }
            SurfaceMessage::ScrollPrompt(prompt)
        }
        "tts-manual-mode-prompt" => SurfaceMessage::ManualModePrompt,
        "save-tts-position" => {
            if !data.is_object() {
                return None;
            }
            SurfaceMessage::SaveButtonPosition(data)
        }
        "show-toast" => SurfaceMessage::ShowToast(data.as_str().filter(|t| !t.is_empty())?.to_string()),
        _ => return None,
    };
    Some(message)
}

/// Integral JSON number. Fractional values are truncated the way the surface
/// reports them.
#[allow(clippy::cast_possible_truncation)]
fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Number or numeric string.
fn as_lenient_int(value: &Value) -> Option<i64> {
    as_int(value).or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

// ── Rate limiting ──────────────────────────────────────────────────

/// Sliding-window limiter for inbound surface messages.
#[derive(Debug)]
pub struct MessageRateLimiter {
    max_messages: usize,
    window: Duration,
    accepted: VecDeque<Instant>,
    dropped: u64,
}

impl Default for MessageRateLimiter {
    fn default() -> Self {
        Self::new(80, Duration::from_millis(1000))
    }
}

impl MessageRateLimiter {
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            accepted: VecDeque::with_capacity(max_messages),
            dropped: 0,
        }
    }

    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Record a message arriving now; `false` means drop it.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        while self
            .accepted
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            self.accepted.pop_front();
        }
        if self.accepted.len() >= self.max_messages {
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                tracing::warn!(dropped = self.dropped, "Surface message rate limit hit");
            }
            return false;
        }
        self.accepted.push_back(now);
        true
    }
}
