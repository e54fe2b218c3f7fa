//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Narration coordinator command-line tool.
///
/// Replays reader sessions against a console speech engine and inspects the
/// progress and settings stored in the database.
#[derive(Parser)]
#[command(name = "narrate")]
#[command(about = "Drive and inspect the novel narration coordinator")]
#[command(version)]
pub struct Cli {
    /// Path to the SQLite database
    #[arg(long = "db", env = "NARRATE_DB", default_value = "narrate.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
