//! CLI-specific error types and exit codes.

use narrate_core::{RepositoryError, SettingsError};
use narrate_tts::TtsError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Settings failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A replay script line could not be parsed or applied.
    #[error("Script line {line}: {message}")]
    Script { line: usize, message: String },

    /// The coordinator service refused or dropped a request.
    #[error("Coordinator error: {0}")]
    Coordinator(String),
}

impl CliError {
    /// Map error to an exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Script { .. } => 65, // EX_DATAERR
            Self::Io(_) => 74,         // EX_IOERR
            Self::Config(_) => 78,     // EX_CONFIG
            Self::Database(_) => 73,   // EX_CANTCREAT
            Self::Coordinator(_) => 70, // EX_SOFTWARE
        }
    }

    pub fn script(line: usize, message: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for CliError {
    fn from(err: RepositoryError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<TtsError> for CliError {
    fn from(err: TtsError) -> Self {
        Self::Coordinator(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
