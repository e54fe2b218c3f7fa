//! Console adapters for the coordinator ports.
//!
//! The speech engine does not synthesize anything: it keeps the queued
//! utterance ids and lets the replay script (or [`ConsoleEngine::advance`])
//! deliver start/done signals. Every adapter echoes its traffic to stdout
//! unless it was built quiet.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use narrate_core::{
    Chapter, ChapterDirection, EngineError, EngineEvent, MediaNotifier, MediaSessionState,
    ReaderHost, ReaderSurface, SpeechEngine, SurfaceCommand, Utterance, VoiceInfo, VoiceParams,
};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

// ── Speech engine ──────────────────────────────────────────────────

/// Speech engine that only tracks its queue.
pub struct ConsoleEngine {
    echo: bool,
    events: broadcast::Sender<EngineEvent>,
    queued: Mutex<VecDeque<Utterance>>,
}

impl ConsoleEngine {
    pub fn new(echo: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            echo,
            events,
            queued: Mutex::new(VecDeque::new()),
        })
    }

    fn queued(&self) -> std::sync::MutexGuard<'_, VecDeque<Utterance>> {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn print(&self, line: &str) {
        if self.echo {
            println!("engine  {line}");
        }
    }

    /// Deliver a scripted engine signal, keeping the queue consistent.
    pub fn emit(&self, event: EngineEvent) {
        match &event {
            EngineEvent::SpeechDone { utterance_id } => {
                let mut queued = self.queued();
                if queued.front().is_some_and(|u| &u.id == utterance_id) {
                    queued.pop_front();
                }
            }
            EngineEvent::QueueEmpty => self.queued().clear(),
            EngineEvent::SpeechStart { .. } | EngineEvent::SpeechError { .. } => {}
        }
        if self.events.send(event).is_err() {
            tracing::debug!("No engine subscribers");
        }
    }

    /// Speak the head of the queue: emits start and done for it, then queue
    /// empty once nothing is left. Returns the utterance spoken.
    pub fn advance(&self) -> Option<Utterance> {
        let head = self.queued().front().cloned();
        match head {
            Some(utterance) => {
                self.print(&format!("speaks  {}: {}", utterance.id, utterance.text));
                self.emit(EngineEvent::SpeechStart {
                    utterance_id: utterance.id.clone(),
                });
                self.emit(EngineEvent::SpeechDone {
                    utterance_id: utterance.id.clone(),
                });
                if self.queued().is_empty() {
                    self.emit(EngineEvent::QueueEmpty);
                }
                Some(utterance)
            }
            None => {
                self.emit(EngineEvent::QueueEmpty);
                None
            }
        }
    }
}

#[async_trait]
impl SpeechEngine for ConsoleEngine {
    async fn speak(&self, utterance: &Utterance, params: &VoiceParams) -> Result<(), EngineError> {
        self.print(&format!("speak   {} (rate {})", utterance.id, params.rate));
        let mut queued = self.queued();
        queued.clear();
        queued.push_back(utterance.clone());
        Ok(())
    }

    async fn speak_batch(
        &self,
        utterances: &[Utterance],
        params: &VoiceParams,
    ) -> Result<(), EngineError> {
        if let (Some(first), Some(last)) = (utterances.first(), utterances.last()) {
            self.print(&format!(
                "batch   {}..{} ({} items, voice {})",
                first.id,
                last.id,
                utterances.len(),
                params.voice.as_deref().unwrap_or("default")
            ));
        }
        let mut queued = self.queued();
        queued.clear();
        queued.extend(utterances.iter().cloned());
        Ok(())
    }

    async fn add_to_batch(&self, utterances: &[Utterance]) -> Result<(), EngineError> {
        self.print(&format!("append  {} items", utterances.len()));
        self.queued().extend(utterances.iter().cloned());
        Ok(())
    }

    async fn queue_size(&self) -> Result<usize, EngineError> {
        Ok(self.queued().len())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.print("stop");
        self.queued().clear();
        Ok(())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.print("pause");
        self.queued().clear();
        Ok(())
    }

    async fn voices(&self) -> Result<Vec<VoiceInfo>, EngineError> {
        Ok(vec![VoiceInfo {
            identifier: "console".to_string(),
            name: "Console".to_string(),
            language: "en".to_string(),
            network_required: false,
        }])
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

// ── Rendering surface ──────────────────────────────────────────────

/// Surface that prints injected commands as JSON.
pub struct ConsoleSurface {
    echo: bool,
    visible: Mutex<Option<i64>>,
}

impl ConsoleSurface {
    pub fn new(echo: bool) -> Arc<Self> {
        Arc::new(Self {
            echo,
            visible: Mutex::new(None),
        })
    }

    /// Paragraph the simulated reader has scrolled to.
    pub fn set_visible(&self, index: Option<i64>) {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner) = index;
    }
}

#[async_trait]
impl ReaderSurface for ConsoleSurface {
    fn is_ready(&self) -> bool {
        true
    }

    fn inject(&self, command: &SurfaceCommand) {
        if !self.echo {
            return;
        }
        match serde_json::to_string(command) {
            Ok(json) => println!("surface {json}"),
            Err(e) => tracing::warn!(error = %e, "Unprintable surface command"),
        }
    }

    async fn visible_paragraph(&self) -> Option<i64> {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Host & notifier ────────────────────────────────────────────────

/// Host that prints navigation requests and toasts.
pub struct ConsoleHost {
    echo: bool,
}

impl ConsoleHost {
    pub fn new(echo: bool) -> Arc<Self> {
        Arc::new(Self { echo })
    }

    fn print(&self, line: &str) {
        if self.echo {
            println!("host    {line}");
        }
    }
}

impl ReaderHost for ConsoleHost {
    fn navigate_back(&self) {
        self.print("back");
    }

    fn navigate_to_chapter(&self, chapter: &Chapter) {
        self.print(&format!("open chapter {} ({})", chapter.id, chapter.display_name()));
    }

    fn navigate_adjacent(&self, direction: ChapterDirection) {
        let label = match direction {
            ChapterDirection::Prev => "previous",
            ChapterDirection::Next => "next",
        };
        self.print(&format!("open {label} chapter"));
    }

    fn show_toast(&self, message: &str) {
        self.print(&format!("toast \"{message}\""));
    }

    fn hide_reader_ui(&self) {
        self.print("toggle reader ui");
    }
}

/// Media notifier that logs state at debug level.
pub struct LogNotifier;

#[async_trait]
impl MediaNotifier for LogNotifier {
    async fn update(&self, state: &MediaSessionState) -> Result<(), EngineError> {
        tracing::debug!(
            chapter_id = state.chapter_id,
            paragraph = state.paragraph_index,
            total = state.total_paragraphs,
            playing = state.is_playing,
            "{} - {}",
            state.novel_name,
            state.chapter_label
        );
        Ok(())
    }
}
