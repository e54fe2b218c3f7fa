//! CLI bootstrap - the composition root.
//!
//! The only place where the database is opened and the `SQLite` adapters are
//! built. Handlers receive the composed [`CliContext`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use narrate_core::{NarrationSettings, SettingsRepository};
use narrate_db::{Repos, StorageFactory, setup_database};

use crate::error::CliError;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: PathBuf,
}

/// Composed application context for CLI commands.
pub struct CliContext {
    repos: Repos,
}

impl CliContext {
    pub const fn repos(&self) -> &Repos {
        &self.repos
    }

    /// Stored narration settings, or defaults when none are saved.
    pub async fn settings(&self) -> Result<NarrationSettings> {
        Ok(self.repos.settings.load().await.map_err(CliError::from)?)
    }
}

/// Open the database and build the adapters.
pub async fn bootstrap(config: &CliConfig) -> Result<CliContext> {
    let pool = setup_database(&config.db_path)
        .await
        .map_err(|e| CliError::Database(e.to_string()))
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    tracing::debug!(path = %config.db_path.display(), "Database opened");
    Ok(bootstrap_with(StorageFactory::build_repos(pool)))
}

/// Bootstrap with prebuilt repositories (for testing).
pub const fn bootstrap_with(repos: Repos) -> CliContext {
    CliContext { repos }
}
