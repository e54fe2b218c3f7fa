use serde::{Deserialize, Serialize};

/// Primary key of a chapter row.
pub type ChapterId = i64;

/// Primary key of a novel row.
pub type NovelId = i64;

/// The work being narrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Novel {
    pub id: NovelId,
    pub name: String,
}

/// A chapter as read from the chapter store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: ChapterId,
    pub novel_id: NovelId,
    pub name: Option<String>,
    pub chapter_number: Option<f64>,
    /// Ordering key within the novel.
    pub position: i64,
    /// Reading progress percentage (0-100).
    pub progress: Option<i64>,
    pub unread: bool,
    /// Serialized [`super::TtsPersistenceState`], if narration was backgrounded here.
    pub tts_state: Option<String>,
}

impl Chapter {
    /// Name shown in dialogs: the stored name, or `Chapter {number}` when the
    /// name is missing or blank.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => match self.chapter_number {
                Some(number) => format!("Chapter {number}"),
                None => format!("Chapter {}", self.id),
            },
        }
    }
}

/// Snapshot of another recently-read chapter, offered in the chapter-selection
/// workflow. Discarded when the dialog closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingChapter {
    pub id: ChapterId,
    pub name: String,
    pub paragraph: i64,
}

/// Direction of an adjacent-chapter navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterDirection {
    Prev,
    Next,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(name: Option<&str>, number: Option<f64>) -> Chapter {
        Chapter {
            id: 789,
            novel_id: 1,
            name: name.map(str::to_string),
            chapter_number: number,
            position: 5,
            progress: None,
            unread: true,
            tts_state: None,
        }
    }

    #[test]
    fn display_name_prefers_stored_name() {
        assert_eq!(chapter(Some("Prologue"), Some(1.0)).display_name(), "Prologue");
    }

    #[test]
    fn display_name_falls_back_to_number() {
        assert_eq!(chapter(None, Some(5.0)).display_name(), "Chapter 5");
        assert_eq!(chapter(Some("  "), Some(12.5)).display_name(), "Chapter 12.5");
    }

    #[test]
    fn display_name_falls_back_to_id_without_number() {
        assert_eq!(chapter(None, None).display_name(), "Chapter 789");
    }
}
