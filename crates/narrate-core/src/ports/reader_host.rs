//! Host application port.

use crate::domain::{Chapter, ChapterDirection};

/// Navigation and notices owned by the host application.
///
/// All calls are fire-and-forget: the host schedules the work on its own UI
/// loop and the coordinator does not wait for it.
pub trait ReaderHost: Send + Sync {
    /// Leave the reader.
    fn navigate_back(&self);

    /// Open a specific chapter.
    fn navigate_to_chapter(&self, chapter: &Chapter);

    /// Open the adjacent chapter.
    fn navigate_adjacent(&self, direction: ChapterDirection);

    /// Show a short user-facing notice.
    fn show_toast(&self, message: &str);

    /// Toggle the reading UI chrome.
    fn hide_reader_ui(&self);
}
