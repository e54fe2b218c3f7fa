//! `narrate` command-line tool.
//!
//! Composition root wiring the `SQLite` adapters and console stand-ins for
//! the speech engine, rendering surface, and host into the coordinator.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod console;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod progress_commands;
pub mod script;
pub mod settings_commands;

pub use bootstrap::{CliConfig, CliContext, bootstrap, bootstrap_with};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
pub use progress_commands::ProgressCommand;
pub use settings_commands::SettingsCommand;
