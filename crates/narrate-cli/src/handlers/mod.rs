//! Command handlers.
//!
//! Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`.
//! Handlers parse CLI input, call the adapters or the coordinator service,
//! and format output for the terminal.

pub mod progress;
pub mod replay;
pub mod settings;
