//! Settings subcommands and their value parsers.

use clap::Subcommand;
use narrate_core::{AutoStopConfig, AutoStopMode, ContinueMode, ForwardResetMode, ForwardResetScope};

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show the stored narration settings
    Show,
    /// Update narration settings
    Set {
        /// Engine voice identifier
        #[arg(long, conflicts_with = "clear_voice")]
        voice: Option<String>,
        /// Use the system default voice
        #[arg(long)]
        clear_voice: bool,
        /// Speech rate (0.1-4.0)
        #[arg(long)]
        rate: Option<f32>,
        /// Speech pitch (0.1-4.0)
        #[arg(long)]
        pitch: Option<f32>,
        /// What happens to later chapters on a chapter switch: none, position, unread
        #[arg(long, value_parser = parse_forward_reset)]
        forward_reset: Option<ForwardResetMode>,
        /// How many later chapters are reset: next, next5, next10, all
        #[arg(long, value_parser = parse_forward_reset_scope)]
        forward_reset_scope: Option<ForwardResetScope>,
        /// Continue into the next chapter: none, continuous, or a chapter count
        #[arg(long = "continue", value_parser = parse_continue_mode)]
        continue_mode: Option<ContinueMode>,
        /// Auto-stop budget: off, or minutes:N, chapters:N, paragraphs:N
        #[arg(long, value_parser = parse_auto_stop)]
        auto_stop: Option<AutoStopConfig>,
    },
    /// Reset narration settings to defaults
    Reset,
}

fn parse_keyword<T: serde::de::DeserializeOwned>(s: &str, expected: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
        .map_err(|_| format!("expected one of {expected}, got '{s}'"))
}

pub fn parse_forward_reset(s: &str) -> Result<ForwardResetMode, String> {
    parse_keyword(s, "none, position, unread")
}

pub fn parse_forward_reset_scope(s: &str) -> Result<ForwardResetScope, String> {
    parse_keyword(s, "next, next5, next10, all")
}

pub fn parse_continue_mode(s: &str) -> Result<ContinueMode, String> {
    match s.trim() {
        "none" => Ok(ContinueMode::None),
        "continuous" => Ok(ContinueMode::Continuous),
        n => n
            .parse::<u32>()
            .map(ContinueMode::Chapters)
            .map_err(|_| format!("expected none, continuous, or a chapter count, got '{s}'")),
    }
}

pub fn parse_auto_stop(s: &str) -> Result<AutoStopConfig, String> {
    let s = s.trim();
    if s == "off" {
        return Ok(AutoStopConfig::off());
    }
    let (mode, amount) = s
        .split_once(':')
        .ok_or_else(|| format!("expected off or MODE:AMOUNT, got '{s}'"))?;
    let mode: AutoStopMode = parse_keyword(mode, "minutes, chapters, paragraphs")?;
    let amount = amount
        .parse()
        .map_err(|_| format!("auto-stop amount must be a whole number, got '{amount}'"))?;
    Ok(AutoStopConfig { mode, amount })
}
