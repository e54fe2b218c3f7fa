//! Top-level subcommands.

use std::path::PathBuf;

use clap::Subcommand;

use crate::progress_commands::ProgressCommand;
use crate::settings_commands::SettingsCommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines session script and print coordinator output
    Replay {
        /// Script file, one step per line (`-` reads stdin)
        script: PathBuf,
        /// Only print coordinator events, not engine/surface/host traffic
        #[arg(long)]
        events_only: bool,
    },

    /// Inspect or clear stored narration progress
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },

    /// View or change narration settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}
