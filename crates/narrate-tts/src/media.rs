//! System media-notification actions.

use std::fmt;
use std::str::FromStr;

/// Paragraphs skipped by one seek.
pub const SEEK_STEP: i64 = 5;

/// An action from the platform media notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaAction {
    PlayPause,
    PrevChapter,
    NextChapter,
    SeekBack,
    SeekForward,
    Stop,
}

impl MediaAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlayPause => "PLAY_PAUSE",
            Self::PrevChapter => "PREV_CHAPTER",
            Self::NextChapter => "NEXT_CHAPTER",
            Self::SeekBack => "SEEK_BACK",
            Self::SeekForward => "SEEK_FORWARD",
            Self::Stop => "STOP",
        }
    }
}

impl fmt::Display for MediaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown media action: {0}")]
pub struct UnknownMediaAction(pub String);

impl FromStr for MediaAction {
    type Err = UnknownMediaAction;

    /// Accepts the bare name or a fully-qualified intent action ending in
    /// `.NAME`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.rsplit('.').next().unwrap_or(s);
        match name {
            "PLAY_PAUSE" => Ok(Self::PlayPause),
            "PREV_CHAPTER" => Ok(Self::PrevChapter),
            "NEXT_CHAPTER" => Ok(Self::NextChapter),
            "SEEK_BACK" => Ok(Self::SeekBack),
            "SEEK_FORWARD" => Ok(Self::SeekForward),
            "STOP" => Ok(Self::Stop),
            _ => Err(UnknownMediaAction(s.to_string())),
        }
    }
}

/// Drops actions arriving within the debounce window of the last accepted one.
#[derive(Debug, Clone)]
pub struct MediaDebouncer {
    window_ms: i64,
    last_accepted_ms: Option<i64>,
}

impl MediaDebouncer {
    pub const fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            last_accepted_ms: None,
        }
    }

    /// Whether an action at `now_ms` should be handled.
    pub fn accept(&mut self, now_ms: i64) -> bool {
        if self
            .last_accepted_ms
            .is_some_and(|last| now_ms - last < self.window_ms)
        {
            return false;
        }
        self.last_accepted_ms = Some(now_ms);
        true
    }
}

/// Target paragraph of a seek, kept inside the chapter.
pub fn seek_target(current: Option<i64>, total: usize, forward: bool) -> i64 {
    let index = current.unwrap_or(0).max(0);
    if forward {
        let last = if total > 0 {
            i64::try_from(total - 1).unwrap_or(i64::MAX)
        } else {
            index
        };
        (index + SEEK_STEP).min(last)
    } else {
        (index - SEEK_STEP).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_qualified_names() {
        assert_eq!("PLAY_PAUSE".parse(), Ok(MediaAction::PlayPause));
        assert_eq!(
            "com.example.reader.TTS.PREV_CHAPTER".parse(),
            Ok(MediaAction::PrevChapter)
        );
        assert!("com.example.reader.TTS.REWIND".parse::<MediaAction>().is_err());
    }

    #[test]
    fn debounce_window_is_exclusive() {
        let mut debouncer = MediaDebouncer::new(500);
        assert!(debouncer.accept(1_000));
        assert!(!debouncer.accept(1_499));
        assert!(debouncer.accept(1_500));
    }

    #[test]
    fn seek_stays_inside_chapter() {
        assert_eq!(seek_target(Some(10), 40, true), 15);
        assert_eq!(seek_target(Some(37), 40, true), 39);
        assert_eq!(seek_target(Some(3), 40, false), 0);
        assert_eq!(seek_target(Some(10), 40, false), 5);
        assert_eq!(seek_target(None, 0, true), 0);
    }
}
