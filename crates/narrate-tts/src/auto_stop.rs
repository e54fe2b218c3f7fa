//! Sleep-timer style auto-stop.
//!
//! The service only keeps counters and a deadline; the coordinator loop waits
//! on [`AutoStop::deadline`] and calls [`AutoStop::on_deadline`].

use std::time::Duration;

use narrate_core::{AutoStopConfig, AutoStopMode};
use tokio::time::Instant;

/// Which budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStopReason {
    Minutes,
    Chapters,
    Paragraphs,
}

impl AutoStopReason {
    pub fn describe(self, amount: u32) -> String {
        match self {
            Self::Minutes => format!("{amount} minutes"),
            Self::Chapters => format!("{amount} chapters"),
            Self::Paragraphs => format!("{amount} paragraphs"),
        }
    }
}

#[derive(Debug, Default)]
pub struct AutoStop {
    config: Option<AutoStopConfig>,
    deadline: Option<Instant>,
    paragraphs_spoken: u32,
    chapters_finished: u32,
}

impl AutoStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn is_armed(&self) -> bool {
        self.config.is_some()
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arm with `config`, replacing any previous budget.
    pub fn start(&mut self, config: AutoStopConfig) {
        self.stop();
        if !config.is_enabled() {
            return;
        }
        tracing::debug!(mode = ?config.mode, amount = config.amount, "Auto-stop armed");
        self.config = Some(config);
        self.arm_deadline();
    }

    /// Disarm and clear the counters.
    pub fn stop(&mut self) {
        self.config = None;
        self.deadline = None;
        self.paragraphs_spoken = 0;
        self.chapters_finished = 0;
    }

    /// Clear the counters and restart the minutes timer.
    pub fn reset_counters(&mut self) {
        self.paragraphs_spoken = 0;
        self.chapters_finished = 0;
        self.arm_deadline();
    }

    pub fn on_paragraph_spoken(&mut self) -> Option<(AutoStopReason, u32)> {
        let amount = self.amount_for(AutoStopMode::Paragraphs)?;
        self.paragraphs_spoken += 1;
        (self.paragraphs_spoken >= amount).then(|| self.trigger(AutoStopReason::Paragraphs, amount))
    }

    pub fn on_chapter_finished(&mut self) -> Option<(AutoStopReason, u32)> {
        let amount = self.amount_for(AutoStopMode::Chapters)?;
        self.chapters_finished += 1;
        (self.chapters_finished >= amount).then(|| self.trigger(AutoStopReason::Chapters, amount))
    }

    /// The minutes deadline passed.
    pub fn on_deadline(&mut self) -> Option<(AutoStopReason, u32)> {
        let amount = self.amount_for(AutoStopMode::Minutes)?;
        let deadline = self.deadline?;
        (Instant::now() >= deadline).then(|| self.trigger(AutoStopReason::Minutes, amount))
    }

    fn amount_for(&self, mode: AutoStopMode) -> Option<u32> {
        self.config
            .filter(|c| c.mode == mode && c.amount > 0)
            .map(|c| c.amount)
    }

    fn arm_deadline(&mut self) {
        if let Some(minutes) = self.amount_for(AutoStopMode::Minutes) {
            self.deadline = Some(Instant::now() + Duration::from_secs(u64::from(minutes) * 60));
        }
    }

    fn trigger(&mut self, reason: AutoStopReason, amount: u32) -> (AutoStopReason, u32) {
        tracing::info!(?reason, amount, "Auto-stop budget reached");
        self.stop();
        (reason, amount)
    }
}
