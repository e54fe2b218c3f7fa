//! System media-notification port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EngineError;
use crate::domain::ChapterId;

/// What the media notification shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSessionState {
    pub novel_name: String,
    pub chapter_label: String,
    pub chapter_id: ChapterId,
    pub paragraph_index: i64,
    pub total_paragraphs: usize,
    pub is_playing: bool,
}

/// Updates the platform media notification. Best-effort.
#[async_trait]
pub trait MediaNotifier: Send + Sync {
    async fn update(&self, state: &MediaSessionState) -> Result<(), EngineError>;
}

/// Notifier for hosts without a media notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMediaNotifier;

#[async_trait]
impl MediaNotifier for NoopMediaNotifier {
    async fn update(&self, _state: &MediaSessionState) -> Result<(), EngineError> {
        Ok(())
    }
}
