//! The playback coordinator.
//!
//! Owns every piece of narration state for one reader session and is driven
//! from a single event loop ([`crate::service`]): surface messages, engine
//! signals, media actions, dialog responses, and timer expiries all arrive as
//! method calls on `&mut self`, so no state is shared across callbacks.
//!
//! Submodules split the handlers by input:
//!
//! - `messages`: rendering-surface protocol
//! - `dialogs`: arbitration, workflow responses, back navigation
//! - `media`: media-notification actions
//! - `engine`: speech-engine signals, chapter end, auto-stop

mod dialogs;
mod engine;
mod media;
mod messages;

use std::sync::Arc;

use narrate_core::{
    Chapter, ChapterId, ChapterRepository, Clock, CoordinatorEvent, CoordinatorEventEmitter,
    MediaNotifier, MediaSessionState, NarrationSettings, Novel, NovelTtsSettings, ProgressStore,
    ReaderHost, ReaderSurface, SpeechEngine, StopReason, SurfaceCommand, Utterance, VoiceParams,
    WorkflowKind, keys,
};
use tokio::sync::mpsc;

use crate::arbitration::{ArbitrationConfig, ConflictArbiter};
use crate::auto_stop::AutoStop;
use crate::error::TtsError;
use crate::media::MediaDebouncer;
use crate::position::{PositionTracker, clamp_paragraph_index};
use crate::protocol::MessageRateLimiter;
use crate::queue::{AudioQueueManager, QueueConfig};
use crate::transition::{ChapterTransitionGuard, TimerEffect, TransitionTimer};
use crate::workflow::{DialogWorkflow, SyncStatus, WakeSyncState, WorkflowOrchestrator};

/// Everything the coordinator talks to.
#[derive(Clone)]
pub struct CoordinatorPorts {
    pub engine: Arc<dyn SpeechEngine>,
    pub chapters: Arc<dyn ChapterRepository>,
    pub store: Arc<dyn ProgressStore>,
    pub surface: Arc<dyn ReaderSurface>,
    pub notifier: Arc<dyn MediaNotifier>,
    pub host: Arc<dyn ReaderHost>,
    pub clock: Arc<dyn Clock>,
    pub emitter: Arc<dyn CoordinatorEventEmitter>,
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub queue: QueueConfig,
    pub arbitration: ArbitrationConfig,
}

/// The chapter loaded in the reader.
#[derive(Debug, Clone)]
pub struct ChapterContext {
    pub novel: Novel,
    pub chapter: Chapter,
    /// Readable paragraphs, in order.
    pub paragraphs: Vec<String>,
    pub prev_chapter: Option<Chapter>,
    pub next_chapter: Option<Chapter>,
    /// Anti-replay token bound to this page load.
    pub nonce: String,
}

/// Read-only view of the coordinator, for hosts and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    pub chapter_id: Option<ChapterId>,
    pub state: narrate_core::PlaybackState,
    pub current_index: Option<i64>,
    pub latest_index: Option<i64>,
    pub workflow: Option<WorkflowKind>,
    pub surface_synced: bool,
}

pub struct PlaybackCoordinator {
    chapters: Arc<dyn ChapterRepository>,
    store: Arc<dyn ProgressStore>,
    surface: Arc<dyn ReaderSurface>,
    notifier: Arc<dyn MediaNotifier>,
    host: Arc<dyn ReaderHost>,
    clock: Arc<dyn Clock>,
    emitter: Arc<dyn CoordinatorEventEmitter>,

    queue: Arc<AudioQueueManager>,
    arbiter: ConflictArbiter,
    settings: NarrationSettings,
    novel_settings: Option<NovelTtsSettings>,
    context: Option<ChapterContext>,

    tracker: PositionTracker,
    transition: ChapterTransitionGuard,
    workflows: WorkflowOrchestrator,
    debouncer: MediaDebouncer,
    limiter: MessageRateLimiter,
    auto_stop: AutoStop,

    chapters_auto_played: u32,
    autostart_next_load: bool,
    force_start_from_zero: bool,
    wake_target: Option<ChapterId>,
}

impl PlaybackCoordinator {
    /// Build a coordinator. The returned receiver delivers transition-timer
    /// expiries and must be fed back through [`Self::on_timer`].
    pub fn new(
        ports: CoordinatorPorts,
        config: CoordinatorConfig,
        settings: NarrationSettings,
    ) -> (Self, mpsc::UnboundedReceiver<TransitionTimer>) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let CoordinatorPorts {
            engine,
            chapters,
            store,
            surface,
            notifier,
            host,
            clock,
            emitter,
        } = ports;

        let notice_host = Arc::clone(&host);
        let queue = Arc::new(
            AudioQueueManager::new(engine, config.queue, Arc::clone(&emitter))
                .with_degraded_notice(move |message| notice_host.show_toast(message)),
        );
        let transition = ChapterTransitionGuard::new(
            config.arbitration.surface_sync_delay,
            config.arbitration.media_nav_clear_after,
            timer_tx,
        );
        let debouncer = MediaDebouncer::new(config.arbitration.media_debounce_ms);

        let coordinator = Self {
            tracker: PositionTracker::new(Arc::clone(&store), Arc::clone(&chapters)),
            arbiter: ConflictArbiter::new(
                config.arbitration,
                Arc::clone(&chapters),
                Arc::clone(&store),
            ),
            workflows: WorkflowOrchestrator::new(Arc::clone(&emitter)),
            chapters,
            store,
            surface,
            notifier,
            host,
            clock,
            emitter,
            queue,
            settings,
            novel_settings: None,
            context: None,
            transition,
            debouncer,
            limiter: MessageRateLimiter::default(),
            auto_stop: AutoStop::new(),
            chapters_auto_played: 0,
            autostart_next_load: false,
            force_start_from_zero: false,
            wake_target: None,
        };
        (coordinator, timer_rx)
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub const fn queue(&self) -> &Arc<AudioQueueManager> {
        &self.queue
    }

    pub const fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub const fn workflow(&self) -> &DialogWorkflow {
        self.workflows.active()
    }

    pub const fn transition(&self) -> &ChapterTransitionGuard {
        &self.transition
    }

    pub const fn settings(&self) -> &NarrationSettings {
        &self.settings
    }

    pub const fn context(&self) -> Option<&ChapterContext> {
        self.context.as_ref()
    }

    pub const fn chapters_auto_played(&self) -> u32 {
        self.chapters_auto_played
    }

    pub const fn autostart_pending(&self) -> bool {
        self.autostart_next_load
    }

    /// Narration is running (starting, playing or refilling).
    pub fn is_reading(&self) -> bool {
        self.queue.state().is_active()
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            chapter_id: self.chapter_id(),
            state: self.queue.state(),
            current_index: self.tracker.current_index(),
            latest_index: self.tracker.latest_index(),
            workflow: self.workflows.kind(),
            surface_synced: self.transition.is_surface_synced(),
        }
    }

    /// Next moment the auto-stop timer fires, if armed in minutes mode.
    pub const fn auto_stop_deadline(&self) -> Option<tokio::time::Instant> {
        self.auto_stop.deadline()
    }

    fn chapter_id(&self) -> Option<ChapterId> {
        self.context.as_ref().map(|c| c.chapter.id)
    }

    fn total_paragraphs(&self) -> usize {
        self.context.as_ref().map_or(0, |c| c.paragraphs.len())
    }

    fn voice_params(&self) -> VoiceParams {
        self.settings.voice_params(self.novel_settings.as_ref())
    }

    // ── Chapter lifecycle ──────────────────────────────────────────

    /// The host finished loading a chapter into the reader.
    pub async fn load_chapter(&mut self, context: ChapterContext) {
        let chapter_id = context.chapter.id;
        let changed = self.transition.on_chapter_change(chapter_id);
        if changed && self.is_reading() {
            // Narration of the previous chapter must not leak into this one.
            self.queue.mark_restart_in_progress();
            self.queue.stop().await;
        }
        let wake_synced = self.wake_target == Some(chapter_id);
        if wake_synced {
            self.wake_target = None;
            tracing::info!(chapter_id, "Wake sync reached its target chapter");
        }
        if changed {
            self.tracker.reset_for_chapter(None);
            self.workflows.dismiss();
        } else if wake_synced && matches!(self.workflows.kind(), Some(WorkflowKind::WakeSync)) {
            self.workflows.dismiss();
        }

        self.novel_settings = self.load_novel_settings(context.novel.id).await;
        self.context = Some(context);
        self.apply_settings_to_surface();

        if self.autostart_next_load {
            self.autostart_next_load = false;
            let start = if self.force_start_from_zero {
                0
            } else {
                self.tracker.persisted_index(chapter_id).await.unwrap_or(0)
            };
            self.force_start_from_zero = false;
            tracing::info!(chapter_id, start, "Auto-starting narration on new chapter");
            if let Err(e) = self.restart_from_paragraph_index(start).await {
                tracing::warn!(chapter_id, error = %e, "Auto-start failed");
            }
            return;
        }

        if self.tracker.take_pending_resume_marker(chapter_id).await {
            let saved = self.tracker.persisted_index(chapter_id).await.unwrap_or(-1);
            if saved >= 0 {
                tracing::info!(chapter_id, saved, "Pending resume marker found");
                self.tracker.set_pending_resume(saved);
                self.enter_workflow(DialogWorkflow::Resume);
            }
        }
    }

    /// Replace the global settings and push them to the surface.
    pub fn update_settings(&mut self, settings: NarrationSettings) {
        self.settings = settings;
        self.apply_settings_to_surface();
    }

    async fn load_novel_settings(&self, novel_id: narrate_core::NovelId) -> Option<NovelTtsSettings> {
        let raw = match self.store.get(&keys::novel_tts_settings(novel_id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::debug!(novel_id, error = %e, "Novel voice override unavailable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(novel_id, error = %e, "Ignoring malformed novel voice override");
                None
            }
        }
    }

    fn apply_settings_to_surface(&self) {
        let params = self.voice_params();
        self.inject(SurfaceCommand::ApplySettings {
            rate: params.rate,
            pitch: params.pitch,
            voice: params.voice,
        });
    }

    // ── Narration control ──────────────────────────────────────────

    /// Stop whatever is playing and narrate the loaded chapter from
    /// `target_index`, clamped into the chapter. Returns the clamped index.
    pub async fn restart_from_paragraph_index(&mut self, target_index: i64) -> Result<usize, TtsError> {
        let ctx = self.context.as_ref().ok_or(TtsError::NoChapter)?;
        let chapter_id = ctx.chapter.id;
        let total = ctx.paragraphs.len();
        if total == 0 {
            return Err(TtsError::EmptyChapter(chapter_id));
        }

        let start = clamp_paragraph_index(target_index, total);
        let utterances: Vec<Utterance> = ctx.paragraphs[start..]
            .iter()
            .enumerate()
            .map(|(offset, text)| Utterance::for_paragraph(chapter_id, start + offset, text.clone()))
            .collect();
        let params = self.voice_params();

        self.queue.mark_restart_in_progress();
        self.queue.stop().await;

        let index = to_index(start);
        self.tracker.set_current(index);
        self.tracker.set_latest(index);
        self.tracker.clear_pause();

        tracing::info!(chapter_id, index, target_index, "Restarting narration");
        if let Err(e) = self
            .queue
            .speak_batch(chapter_id, utterances, params, total)
            .await
        {
            tracing::warn!(chapter_id, error = %e, "Narration failed to start");
            self.host.show_toast("TTS failed to start. Please try again.");
            self.notify_media(false).await;
            return Err(e.into());
        }

        self.tracker.update_last_known_chapter(chapter_id).await;
        self.emitter.emit(CoordinatorEvent::NarrationStarted {
            chapter_id,
            paragraph_index: index,
        });
        self.notify_media(true).await;
        Ok(start)
    }

    /// Stop narration for good.
    pub async fn stop_narration(&mut self, reason: StopReason) {
        let was_reading = self.is_reading();
        self.queue.full_stop().await;
        self.auto_stop.stop();
        self.autostart_next_load = false;
        if was_reading {
            tracing::info!(chapter_id = ?self.chapter_id(), ?reason, "Narration stopped");
        }
        self.emitter.emit(CoordinatorEvent::NarrationStopped {
            chapter_id: self.chapter_id(),
            reason,
        });
        self.notify_media(false).await;
    }

    /// Restart the auto-stop budget, arming it from the settings if needed.
    fn rearm_auto_stop(&mut self) {
        if self.auto_stop.is_armed() {
            self.auto_stop.reset_counters();
        } else {
            self.auto_stop.start(self.settings.auto_stop);
        }
    }

    // ── Timers & host signals ──────────────────────────────────────

    /// A chapter-transition timer expired.
    pub fn on_timer(&mut self, timer: TransitionTimer) {
        if let TimerEffect::Synced(chapter_id) = self.transition.apply(timer) {
            tracing::debug!(chapter_id, "Surface synced");
            self.emitter
                .emit(CoordinatorEvent::SurfaceSynced { chapter_id });
        }
    }

    /// The host app went to the background.
    pub async fn on_app_background(&mut self) {
        if matches!(self.workflows.kind(), Some(WorkflowKind::ManualMode)) {
            tracing::debug!("Dismissing manual-mode dialog on background");
            self.workflows.dismiss();
        }

        let Some(chapter) = self.context.as_ref().map(|c| c.chapter.clone()) else {
            return;
        };
        let is_reading = self.is_reading();
        let index = self
            .tracker
            .snapshot()
            .map(|s| s.paragraph_index)
            .or_else(|| self.tracker.current_index().filter(|_| is_reading));
        if let Some(index) = index {
            let now = self.clock.now_ms();
            self.tracker
                .save_snapshot(&chapter, index, now, Some(is_reading))
                .await;
            tracing::debug!(chapter_id = chapter.id, index, "Saved background snapshot");
        }
    }

    /// The host could not resynchronize the reader after a screen wake.
    pub fn report_wake_sync_failure(&mut self, target_chapter_id: Option<ChapterId>) {
        self.wake_target = target_chapter_id;
        self.enter_workflow(DialogWorkflow::WakeSync(WakeSyncState {
            status: SyncStatus::Failed,
            target_chapter_id,
            retry_count: 0,
        }));
    }

    /// Stop narration and cancel timers before the session is dropped.
    pub async fn shutdown(&mut self) {
        self.transition.cancel();
        self.auto_stop.stop();
        self.queue.full_stop().await;
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn inject(&self, command: SurfaceCommand) {
        if self.surface.is_ready() {
            self.surface.inject(&command);
        } else {
            tracing::trace!(?command, "Surface not ready, dropping command");
        }
    }

    fn enter_workflow(&mut self, workflow: DialogWorkflow) -> bool {
        match self.workflows.enter(workflow) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Workflow request dropped");
                false
            }
        }
    }

    async fn notify_media(&self, is_playing: bool) {
        let Some(ctx) = self.context.as_ref() else {
            return;
        };
        let state = MediaSessionState {
            novel_name: ctx.novel.name.clone(),
            chapter_label: ctx
                .chapter
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Chapter {}", ctx.chapter.id)),
            chapter_id: ctx.chapter.id,
            paragraph_index: self.tracker.current_index().unwrap_or(0).max(0),
            total_paragraphs: ctx.paragraphs.len(),
            is_playing,
        };
        if let Err(e) = self.notifier.update(&state).await {
            tracing::debug!(error = %e, "Media notification update failed");
        }
    }
}

fn to_index(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
