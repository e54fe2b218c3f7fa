//! Settings repository trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::settings::NarrationSettings;

/// Repository for narration settings persistence.
///
/// # Design Rules
///
/// - Works with domain `NarrationSettings` directly
/// - Implementation handles JSON serialization internally
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load settings. Returns defaults if none are stored.
    async fn load(&self) -> Result<NarrationSettings, RepositoryError>;

    /// Save settings.
    async fn save(&self, settings: &NarrationSettings) -> Result<(), RepositoryError>;
}
