//! Hand-rolled port mocks shared by the coordinator integration tests.
//!
//! Every mock records what it was asked to do behind a `std::sync::Mutex` so
//! tests can assert on calls after driving the coordinator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use narrate_core::{
    ChannelEmitter, Chapter, ChapterDirection, ChapterId, ChapterRepository, Clock,
    CoordinatorEvent, EngineError, EngineEvent, ForwardResetMode, ForwardResetScope,
    MediaNotifier, MediaSessionState, NarrationSettings, Novel, NovelId, ProgressStore,
    ReaderHost, ReaderSurface, RepositoryError, SpeechEngine, SurfaceCommand,
    TtsPersistenceState, Utterance, VoiceInfo, VoiceParams,
};
use narrate_tts::coordinator::{ChapterContext, CoordinatorConfig, CoordinatorPorts, PlaybackCoordinator};
use narrate_tts::transition::TransitionTimer;
use tokio::sync::{broadcast, mpsc};

pub const NONCE: &str = "nonce-1";

// ── Speech engine ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Speak { id: String },
    SpeakBatch { ids: Vec<String>, voice: Option<String> },
    AddToBatch { ids: Vec<String> },
    QueueSize,
    Stop,
    Pause,
}

pub struct MockEngine {
    events: broadcast::Sender<EngineEvent>,
    calls: Mutex<Vec<EngineCall>>,
    batch_failures: AtomicU32,
    append_failures: AtomicU32,
    queue_size: AtomicUsize,
    queue_size_fails: AtomicBool,
    append_delay: Mutex<Option<Duration>>,
    subscriptions: AtomicUsize,
}

impl Default for MockEngine {
    fn default() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            events,
            calls: Mutex::new(Vec::new()),
            batch_failures: AtomicU32::new(0),
            append_failures: AtomicU32::new(0),
            queue_size: AtomicUsize::new(0),
            queue_size_fails: AtomicBool::new(false),
            append_delay: Mutex::new(None),
            subscriptions: AtomicUsize::new(0),
        }
    }
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` `speak_batch` calls.
    pub fn fail_batches(&self, n: u32) {
        self.batch_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` `add_to_batch` calls.
    pub fn fail_appends(&self, n: u32) {
        self.append_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_queue_size(&self, size: usize) {
        self.queue_size.store(size, Ordering::SeqCst);
    }

    pub fn set_append_delay(&self, delay: Duration) {
        *self.append_delay.lock().unwrap() = Some(delay);
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// How many event subscriptions were taken.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn batches(&self) -> Vec<(Vec<String>, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::SpeakBatch { ids, voice } => Some((ids, voice)),
                _ => None,
            })
            .collect()
    }

    pub fn appends(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::AddToBatch { ids } => Some(ids),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn ids(utterances: &[Utterance]) -> Vec<String> {
    utterances.iter().map(|u| u.id.clone()).collect()
}

#[async_trait]
impl SpeechEngine for MockEngine {
    async fn speak(&self, utterance: &Utterance, _params: &VoiceParams) -> Result<(), EngineError> {
        self.record(EngineCall::Speak {
            id: utterance.id.clone(),
        });
        Ok(())
    }

    async fn speak_batch(
        &self,
        utterances: &[Utterance],
        params: &VoiceParams,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SpeakBatch {
            ids: ids(utterances),
            voice: params.voice.clone(),
        });
        if Self::take_failure(&self.batch_failures) {
            return Err(EngineError::VoiceBusy("mock".to_string()));
        }
        Ok(())
    }

    async fn add_to_batch(&self, utterances: &[Utterance]) -> Result<(), EngineError> {
        self.record(EngineCall::AddToBatch {
            ids: ids(utterances),
        });
        let delay = *self.append_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if Self::take_failure(&self.append_failures) {
            return Err(EngineError::Unavailable("mock".to_string()));
        }
        Ok(())
    }

    async fn queue_size(&self) -> Result<usize, EngineError> {
        self.record(EngineCall::QueueSize);
        if self.queue_size_fails.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("mock".to_string()));
        }
        Ok(self.queue_size.load(Ordering::SeqCst))
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Stop);
        Ok(())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Pause);
        Ok(())
    }

    async fn voices(&self) -> Result<Vec<VoiceInfo>, EngineError> {
        Ok(Vec::new())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.events.subscribe()
    }
}

// ── Storage ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: impl Into<String>, value: impl ToString) {
        self.values
            .lock()
            .unwrap()
            .insert(key.into(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardReset {
    pub novel_id: NovelId,
    pub chapter_id: ChapterId,
    pub mode: ForwardResetMode,
    pub scope: ForwardResetScope,
}

#[derive(Default)]
pub struct MockChapters {
    chapters: Mutex<HashMap<ChapterId, Chapter>>,
    recent: Mutex<Vec<Chapter>>,
    recent_fails: AtomicBool,
    pub progress_updates: Mutex<Vec<(ChapterId, i64)>>,
    pub tts_states: Mutex<Vec<(ChapterId, Option<TtsPersistenceState>)>>,
    pub marked_before: Mutex<Vec<(NovelId, i64)>>,
    pub resets: Mutex<Vec<ForwardReset>>,
}

impl MockChapters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, chapter: Chapter) {
        self.chapters.lock().unwrap().insert(chapter.id, chapter);
    }

    pub fn set_recent(&self, recent: Vec<Chapter>) {
        *self.recent.lock().unwrap() = recent;
    }

    pub fn fail_recent(&self) {
        self.recent_fails.store(true, Ordering::SeqCst);
    }

    pub fn progress_updates(&self) -> Vec<(ChapterId, i64)> {
        self.progress_updates.lock().unwrap().clone()
    }

    pub fn tts_states(&self) -> Vec<(ChapterId, Option<TtsPersistenceState>)> {
        self.tts_states.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChapterRepository for MockChapters {
    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, RepositoryError> {
        Ok(self.chapters.lock().unwrap().get(&id).cloned())
    }

    async fn recent_reading_chapters(
        &self,
        _novel_id: NovelId,
        limit: u32,
    ) -> Result<Vec<Chapter>, RepositoryError> {
        if self.recent_fails.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("mock".to_string()));
        }
        let recent = self.recent.lock().unwrap();
        Ok(recent.iter().take(limit as usize).cloned().collect())
    }

    async fn mark_chapters_before_position_read(
        &self,
        novel_id: NovelId,
        position: i64,
    ) -> Result<u64, RepositoryError> {
        self.marked_before.lock().unwrap().push((novel_id, position));
        Ok(0)
    }

    async fn reset_future_chapters_progress(
        &self,
        novel_id: NovelId,
        chapter_id: ChapterId,
        mode: ForwardResetMode,
        scope: ForwardResetScope,
    ) -> Result<u64, RepositoryError> {
        self.resets.lock().unwrap().push(ForwardReset {
            novel_id,
            chapter_id,
            mode,
            scope,
        });
        Ok(1)
    }

    async fn chapter_ids_between(
        &self,
        novel_id: NovelId,
        from_position: i64,
        to_position: i64,
    ) -> Result<Vec<ChapterId>, RepositoryError> {
        let chapters = self.chapters.lock().unwrap();
        let mut between: Vec<&Chapter> = chapters
            .values()
            .filter(|c| {
                c.novel_id == novel_id && c.position > from_position && c.position < to_position
            })
            .collect();
        between.sort_by_key(|c| c.position);
        Ok(between.into_iter().map(|c| c.id).collect())
    }

    async fn update_progress(
        &self,
        chapter_id: ChapterId,
        progress: i64,
    ) -> Result<(), RepositoryError> {
        self.progress_updates
            .lock()
            .unwrap()
            .push((chapter_id, progress));
        Ok(())
    }

    async fn save_tts_state(
        &self,
        chapter_id: ChapterId,
        state: Option<&TtsPersistenceState>,
    ) -> Result<(), RepositoryError> {
        self.tts_states
            .lock()
            .unwrap()
            .push((chapter_id, state.cloned()));
        Ok(())
    }
}

// ── Surface, host, notifier, clock ─────────────────────────────────

pub struct RecordingSurface {
    ready: AtomicBool,
    visible: Mutex<Option<i64>>,
    commands: Mutex<Vec<SurfaceCommand>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(true),
            visible: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_visible(&self, index: Option<i64>) {
        *self.visible.lock().unwrap() = index;
    }

    pub fn commands(&self) -> Vec<SurfaceCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn received(&self, command: &SurfaceCommand) -> bool {
        self.commands.lock().unwrap().contains(command)
    }
}

#[async_trait]
impl ReaderSurface for RecordingSurface {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn inject(&self, command: &SurfaceCommand) {
        self.commands.lock().unwrap().push(command.clone());
    }

    async fn visible_paragraph(&self) -> Option<i64> {
        *self.visible.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Back,
    ToChapter(ChapterId),
    Adjacent(ChapterDirection),
    Toast(String),
    HideUi,
}

#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Toast(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ReaderHost for RecordingHost {
    fn navigate_back(&self) {
        self.record(HostCall::Back);
    }

    fn navigate_to_chapter(&self, chapter: &Chapter) {
        self.record(HostCall::ToChapter(chapter.id));
    }

    fn navigate_adjacent(&self, direction: ChapterDirection) {
        self.record(HostCall::Adjacent(direction));
    }

    fn show_toast(&self, message: &str) {
        self.record(HostCall::Toast(message.to_string()));
    }

    fn hide_reader_ui(&self) {
        self.record(HostCall::HideUi);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    states: Mutex<Vec<MediaSessionState>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> Option<MediaSessionState> {
        self.states.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MediaNotifier for RecordingNotifier {
    async fn update(&self, state: &MediaSessionState) -> Result<(), EngineError> {
        self.states.lock().unwrap().push(state.clone());
        Ok(())
    }
}

pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(now),
        })
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

pub fn novel() -> Novel {
    Novel {
        id: 1,
        name: "The Long Road".to_string(),
    }
}

pub fn chapter(id: ChapterId, position: i64) -> Chapter {
    Chapter {
        id,
        novel_id: 1,
        name: Some(format!("Part {id}")),
        chapter_number: None,
        position,
        progress: None,
        unread: true,
        tts_state: None,
    }
}

pub fn paragraphs(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Paragraph {i}.")).collect()
}

pub fn context(
    chapter: Chapter,
    paragraph_count: usize,
    prev_chapter: Option<Chapter>,
    next_chapter: Option<Chapter>,
) -> ChapterContext {
    ChapterContext {
        novel: novel(),
        chapter,
        paragraphs: paragraphs(paragraph_count),
        prev_chapter,
        next_chapter,
        nonce: NONCE.to_string(),
    }
}

/// Wrap a message the way the surface posts it.
pub fn envelope(kind: &str, rest: &str) -> String {
    if rest.is_empty() {
        format!(r#"{{"type":"{kind}","nonce":"{NONCE}"}}"#)
    } else {
        format!(r#"{{"type":"{kind}","nonce":"{NONCE}",{rest}}}"#)
    }
}

pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub coordinator: PlaybackCoordinator,
    pub timers: mpsc::UnboundedReceiver<TransitionTimer>,
    pub events: mpsc::UnboundedReceiver<CoordinatorEvent>,
    pub engine: Arc<MockEngine>,
    pub store: Arc<MemoryStore>,
    pub chapters: Arc<MockChapters>,
    pub surface: Arc<RecordingSurface>,
    pub host: Arc<RecordingHost>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(NarrationSettings::default())
    }

    pub fn with_settings(settings: NarrationSettings) -> Self {
        let engine = MockEngine::new();
        let store = MemoryStore::new();
        let chapters = MockChapters::new();
        let surface = RecordingSurface::new();
        let host = RecordingHost::new();
        let notifier = RecordingNotifier::new();
        let clock = ManualClock::new(10_000);
        let (emitter, events) = ChannelEmitter::new();

        let ports = CoordinatorPorts {
            engine: engine.clone(),
            chapters: chapters.clone(),
            store: store.clone(),
            surface: surface.clone(),
            notifier: notifier.clone(),
            host: host.clone(),
            clock: clock.clone(),
            emitter: Arc::new(emitter),
        };
        let (coordinator, timers) =
            PlaybackCoordinator::new(ports, CoordinatorConfig::default(), settings);

        Self {
            coordinator,
            timers,
            events,
            engine,
            store,
            chapters,
            surface,
            host,
            notifier,
            clock,
        }
    }

    /// Load `ctx` and wait until the surface has synced.
    pub async fn load_synced(&mut self, ctx: ChapterContext) {
        self.coordinator.load_chapter(ctx).await;
        self.settle().await;
    }

    /// Let the surface-sync delay elapse and apply fired timers.
    pub async fn settle(&mut self) {
        tokio::time::sleep(Duration::from_millis(300)).await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        while let Ok(timer) = self.timers.try_recv() {
            self.coordinator.on_timer(timer);
        }
    }

    pub async fn surface_message(&mut self, kind: &str, rest: &str) {
        self.coordinator
            .handle_surface_message(&envelope(kind, rest))
            .await;
    }

    pub fn events(&mut self) -> Vec<CoordinatorEvent> {
        drain_events(&mut self.events)
    }
}
