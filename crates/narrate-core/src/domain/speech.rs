use serde::{Deserialize, Serialize};

use super::ChapterId;

/// One unit of text handed to the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub id: String,
    pub text: String,
}

impl Utterance {
    /// Utterance for paragraph `index` of `chapter_id`.
    pub fn for_paragraph(chapter_id: ChapterId, index: usize, text: impl Into<String>) -> Self {
        Self {
            id: utterance_id(chapter_id, index),
            text: text.into(),
        }
    }

    /// Absolute paragraph index encoded in the identifier, if any.
    pub fn paragraph_index(&self) -> Option<usize> {
        parse_utterance_index(&self.id)
    }
}

/// Deterministic utterance identifier: `chapter_{chapterId}_utterance_{index}`.
pub fn utterance_id(chapter_id: ChapterId, index: usize) -> String {
    format!("chapter_{chapter_id}_utterance_{index}")
}

/// Split an identifier built by [`utterance_id`] into chapter and paragraph.
pub fn parse_utterance_id(id: &str) -> Option<(ChapterId, usize)> {
    let (chapter, index) = id.strip_prefix("chapter_")?.rsplit_once("_utterance_")?;
    Some((chapter.parse().ok()?, index.parse().ok()?))
}

/// Paragraph index encoded in an identifier built by [`utterance_id`].
pub fn parse_utterance_index(id: &str) -> Option<usize> {
    parse_utterance_id(id).map(|(_, index)| index)
}

/// Voice parameters forwarded with every batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceParams {
    /// Engine voice identifier. `None` selects the system default voice.
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: None,
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

impl VoiceParams {
    /// Same rate and pitch, different voice.
    #[must_use]
    pub fn with_voice(&self, voice: Option<String>) -> Self {
        Self {
            voice,
            ..self.clone()
        }
    }
}

/// A voice offered by the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    pub identifier: String,
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub network_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_ids_are_deterministic() {
        let u = Utterance::for_paragraph(42, 7, "Hello");
        assert_eq!(u.id, "chapter_42_utterance_7");
        assert_eq!(u.paragraph_index(), Some(7));
    }

    #[test]
    fn parse_rejects_foreign_ids() {
        assert_eq!(parse_utterance_index("chapter_1_utterance_x"), None);
        assert_eq!(parse_utterance_index("something-else"), None);
    }

    #[test]
    fn parse_splits_chapter_and_index() {
        assert_eq!(parse_utterance_id("chapter_12_utterance_40"), Some((12, 40)));
        assert_eq!(parse_utterance_id("utterance_40"), None);
    }
}
