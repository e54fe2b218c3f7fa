//! Audio queue manager.
//!
//! Sole owner of the speech engine. Keeps an in-memory list of utterances,
//! feeds the engine in bounded batches, and refills the native queue as items
//! finish. Every native call happens while holding `inner`, so refills are
//! serialized; refill triggers that arrive while one is in flight are
//! coalesced into a single follow-up pass.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use narrate_core::{
    ChapterId, CoordinatorEvent, CoordinatorEventEmitter, EngineError, EngineEvent, PlaybackState,
    SpeechEngine, Utterance, VoiceParams, parse_utterance_id,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::QueueError;
use crate::state::PlaybackStateMachine;

/// Notice shown when the engine could not be kept fed.
pub const DEGRADED_NOTICE: &str = "TTS failed to queue audio. Playback may stop.";

/// Tunables for batching, refill, and drift calibration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Utterances per dispatched batch.
    pub batch_size: usize,
    /// Refill only when the native queue holds this many items or fewer.
    pub refill_threshold: usize,
    /// Attempts per append before giving up on a refill cycle.
    pub max_append_attempts: u32,
    /// Backoff step; attempt `n` waits `n * retry_backoff` before the next one.
    pub retry_backoff: Duration,
    /// Attempts with the requested voice before falling back.
    pub speak_attempts: u32,
    /// Compare cached and native depth every this many finished items.
    pub calibration_interval: u64,
    /// Largest tolerated difference between cached and native depth.
    pub drift_tolerance: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 15,
            refill_threshold: 5,
            max_append_attempts: 3,
            retry_backoff: Duration::from_millis(150),
            speak_attempts: 2,
            calibration_interval: 10,
            drift_tolerance: 5,
        }
    }
}

/// The narration currently owned by the queue manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    pub chapter_id: ChapterId,
    /// Remaining utterances, starting with the first one dispatched.
    pub queue: Vec<Utterance>,
    /// Next utterance in `queue` to hand to the engine.
    pub cursor_index: usize,
    /// Highest paragraph index the engine has started speaking.
    pub latest_confirmed_index: Option<usize>,
    pub total_paragraphs: usize,
}

impl PlaybackSession {
    fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor_index)
    }
}

/// Diagnostic counters, cumulative for the manager's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDiagnostics {
    pub refill_attempts: u64,
    pub append_failures: u64,
    pub fallback_batches: u64,
    pub system_voice_fallbacks: u64,
    pub drift_corrections: u64,
}

#[derive(Debug, Default)]
struct Counters {
    refill_attempts: AtomicU64,
    append_failures: AtomicU64,
    fallback_batches: AtomicU64,
    system_voice_fallbacks: AtomicU64,
    drift_corrections: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueueDiagnostics {
        QueueDiagnostics {
            refill_attempts: self.refill_attempts.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            fallback_batches: self.fallback_batches.load(Ordering::Relaxed),
            system_voice_fallbacks: self.system_voice_fallbacks.load(Ordering::Relaxed),
            drift_corrections: self.drift_corrections.load(Ordering::Relaxed),
        }
    }
}

/// Playback progress over the whole chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueProgress {
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

/// Result of one refill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillOutcome {
    /// No narration is playing.
    Inactive,
    /// Every utterance has been handed to the engine.
    Exhausted,
    /// The native queue is still above the low-water mark.
    Sufficient { depth: usize },
    /// A batch was appended.
    Appended(usize),
    /// Appends failed on an empty native queue; narration was restarted.
    Recovered(usize),
    /// Appends failed on a non-empty native queue; retried next cycle.
    Degraded,
    /// Another refill was in flight; this trigger was folded into it.
    Coalesced,
}

/// What a native "queue empty" signal turned out to mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEmptyVerdict {
    /// Expected noise: restart, refill, or state change in progress.
    Ignored,
    /// Items were still pending; an emergency refill ran.
    Refilled(RefillOutcome),
    /// The chapter's content has been fully spoken.
    Drained,
}

/// Result of a drift calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftCheck {
    WithinTolerance { cached: usize, actual: usize },
    Corrected { cached: usize, actual: usize },
    /// The engine could not report its depth.
    Unavailable,
}

type DegradedNotice = Arc<dyn Fn(&str) + Send + Sync>;

struct QueueInner {
    machine: PlaybackStateMachine,
    session: Option<PlaybackSession>,
    /// Locally tracked native depth, resynced by calibration.
    cached_depth: usize,
    done_signals: u64,
    logged_exhausted: bool,
    /// Voice of the first successful batch; preferred fallback.
    locked_voice: Option<String>,
    /// Parameters of the running session, reused by recovery.
    params: VoiceParams,
}

/// Single owner of the speech engine.
pub struct AudioQueueManager {
    engine: Arc<dyn SpeechEngine>,
    config: QueueConfig,
    inner: Mutex<QueueInner>,
    state_tx: watch::Sender<PlaybackState>,
    restart_in_progress: AtomicBool,
    refill_in_flight: AtomicBool,
    refill_requested: AtomicBool,
    counters: Counters,
    emitter: Arc<dyn CoordinatorEventEmitter>,
    degraded_notice: Option<DegradedNotice>,
    subscription: OnceLock<JoinHandle<()>>,
}

impl AudioQueueManager {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        config: QueueConfig,
        emitter: Arc<dyn CoordinatorEventEmitter>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            engine,
            config,
            inner: Mutex::new(QueueInner {
                machine: PlaybackStateMachine::new(),
                session: None,
                cached_depth: 0,
                done_signals: 0,
                logged_exhausted: false,
                locked_voice: None,
                params: VoiceParams::default(),
            }),
            state_tx,
            restart_in_progress: AtomicBool::new(false),
            refill_in_flight: AtomicBool::new(false),
            refill_requested: AtomicBool::new(false),
            counters: Counters::default(),
            emitter,
            degraded_notice: None,
            subscription: OnceLock::new(),
        }
    }

    /// Register the callback told when narration audio may be degraded.
    #[must_use]
    pub fn with_degraded_notice(mut self, notice: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.degraded_notice = Some(Arc::new(notice));
        self
    }

    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    /// Observe state changes.
    pub fn watch_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn diagnostics(&self) -> QueueDiagnostics {
        self.counters.snapshot()
    }

    /// Whether the engine-event subscription has been registered.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.get().is_some()
    }

    pub fn is_restart_in_progress(&self) -> bool {
        self.restart_in_progress.load(Ordering::Acquire)
    }

    /// Flag a deliberate stop-then-restart so the stop does not read as the
    /// end of narration. Cleared by the next `speak_batch` or `full_stop`.
    pub fn mark_restart_in_progress(&self) {
        self.restart_in_progress.store(true, Ordering::Release);
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Option<PlaybackSession> {
        self.inner.lock().await.session.clone()
    }

    pub async fn progress(&self) -> QueueProgress {
        let inner = self.inner.lock().await;
        let Some(session) = inner.session.as_ref() else {
            return QueueProgress {
                current: 0,
                total: 0,
                percentage: 0,
            };
        };
        let current = session.latest_confirmed_index.map_or(0, |i| i + 1);
        let total = session.total_paragraphs;
        let percentage = if total == 0 {
            0
        } else {
            u8::try_from((current.min(total) * 100) / total).unwrap_or(100)
        };
        QueueProgress {
            current,
            total,
            percentage,
        }
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Replace any queued narration with `utterances` and start speaking.
    ///
    /// The first batch goes to the engine; the full list is kept for refills.
    /// Returns the number of utterances dispatched.
    pub async fn speak_batch(
        self: &Arc<Self>,
        chapter_id: ChapterId,
        utterances: Vec<Utterance>,
        params: VoiceParams,
        total_paragraphs: usize,
    ) -> Result<usize, QueueError> {
        if utterances.is_empty() {
            return Err(QueueError::EmptyQueue);
        }
        self.ensure_subscribed();

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.refill_requested.store(false, Ordering::Release);
        if matches!(
            inner.machine.state(),
            PlaybackState::Playing | PlaybackState::Refilling
        ) {
            self.set_state(&mut inner.machine, PlaybackState::Stopping);
        }
        self.set_state(&mut inner.machine, PlaybackState::Starting);
        inner.session = None;
        inner.cached_depth = 0;
        inner.done_signals = 0;
        inner.logged_exhausted = false;

        let first = utterances.len().min(self.config.batch_size);
        let result = self
            .dispatch_initial(&mut inner.locked_voice, &utterances[..first], &params)
            .await;
        self.restart_in_progress.store(false, Ordering::Release);

        match result {
            Ok(()) => {
                tracing::info!(
                    chapter_id,
                    dispatched = first,
                    total = utterances.len(),
                    "Narration batch started"
                );
                inner.session = Some(PlaybackSession {
                    chapter_id,
                    queue: utterances,
                    cursor_index: first,
                    latest_confirmed_index: None,
                    total_paragraphs,
                });
                inner.cached_depth = first;
                inner.params = params;
                self.set_state(&mut inner.machine, PlaybackState::Playing);
                Ok(first)
            }
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "Narration batch failed, narration paused");
                self.set_state(&mut inner.machine, PlaybackState::Stopping);
                self.set_state(&mut inner.machine, PlaybackState::Idle);
                Err(e)
            }
        }
    }

    /// Send a fresh batch, degrading through the locked voice and then the
    /// system default voice.
    async fn dispatch_initial(
        &self,
        locked_voice: &mut Option<String>,
        batch: &[Utterance],
        params: &VoiceParams,
    ) -> Result<(), QueueError> {
        let mut last_error = EngineError::Unavailable("no attempt made".to_string());

        for attempt in 1..=self.config.speak_attempts.max(1) {
            match self.engine.speak_batch(batch, params).await {
                Ok(()) => {
                    if locked_voice.is_none() {
                        locked_voice.clone_from(&params.voice);
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, voice = ?params.voice, error = %e, "speak_batch failed");
                    last_error = e;
                }
            }
        }

        if let Some(locked) = locked_voice.clone() {
            if params.voice.as_deref() != Some(locked.as_str()) {
                Counters::bump(&self.counters.fallback_batches);
                tracing::warn!(voice = %locked, "Retrying batch with locked voice");
                match self
                    .engine
                    .speak_batch(batch, &params.with_voice(Some(locked)))
                    .await
                {
                    Ok(()) => return Ok(()),
                    Err(e) => last_error = e,
                }
            }
        }

        if params.voice.is_some() {
            Counters::bump(&self.counters.system_voice_fallbacks);
            tracing::warn!("Retrying batch with system default voice");
            match self.engine.speak_batch(batch, &params.with_voice(None)).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }

        Err(QueueError::Engine(last_error))
    }

    /// Speak one utterance outside the batch queue.
    pub async fn speak(&self, utterance: &Utterance, params: &VoiceParams) -> Result<(), QueueError> {
        let _guard = self.inner.lock().await;
        self.engine.speak(utterance, params).await?;
        Ok(())
    }

    // ── Refill ─────────────────────────────────────────────────────

    /// Top up the native queue if it has drained below the low-water mark.
    pub async fn refill_queue(&self) -> RefillOutcome {
        let Ok(mut guard) = self.inner.try_lock() else {
            self.refill_requested.store(true, Ordering::Release);
            tracing::trace!("Refill in flight, coalescing trigger");
            return RefillOutcome::Coalesced;
        };
        self.refill_in_flight.store(true, Ordering::Release);

        let mut outcome = self.refill_locked(&mut guard).await;
        while self.refill_requested.swap(false, Ordering::AcqRel) {
            outcome = self.refill_locked(&mut guard).await;
        }

        self.refill_in_flight.store(false, Ordering::Release);
        outcome
    }

    async fn refill_locked(&self, inner: &mut QueueInner) -> RefillOutcome {
        if inner.machine.state() != PlaybackState::Playing {
            return RefillOutcome::Inactive;
        }
        let Some(session) = inner.session.as_mut() else {
            return RefillOutcome::Inactive;
        };
        if session.remaining() == 0 {
            if !inner.logged_exhausted {
                tracing::info!(chapter_id = session.chapter_id, "No more items to queue");
                inner.logged_exhausted = true;
            }
            return RefillOutcome::Exhausted;
        }

        Counters::bump(&self.counters.refill_attempts);
        let depth = match self.engine.queue_size().await {
            Ok(depth) => depth,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read native queue depth, refilling anyway");
                0
            }
        };
        inner.cached_depth = depth;
        if depth > self.config.refill_threshold {
            return RefillOutcome::Sufficient { depth };
        }

        let start = session.cursor_index;
        let end = (start + self.config.batch_size).min(session.queue.len());
        let batch = session.queue[start..end].to_vec();
        self.set_state(&mut inner.machine, PlaybackState::Refilling);

        let attempts = self.config.max_append_attempts.max(1);
        for attempt in 1..=attempts {
            match self.engine.add_to_batch(&batch).await {
                Ok(()) => {
                    session.cursor_index = end;
                    inner.cached_depth += batch.len();
                    tracing::debug!(appended = batch.len(), cursor = end, "Refilled native queue");
                    self.set_state(&mut inner.machine, PlaybackState::Playing);
                    return RefillOutcome::Appended(batch.len());
                }
                Err(e) => {
                    Counters::bump(&self.counters.append_failures);
                    tracing::warn!(attempt, error = %e, "add_to_batch failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    }
                }
            }
        }

        let native_depth = self.engine.queue_size().await.unwrap_or(depth);
        if native_depth > 0 {
            tracing::warn!(native_depth, "Refill gave up this cycle");
            self.set_state(&mut inner.machine, PlaybackState::Playing);
            self.notify_degraded();
            return RefillOutcome::Degraded;
        }

        // Native queue is empty: restart from the cursor instead of stalling.
        let remaining = session.queue[start..].to_vec();
        let first = remaining.len().min(self.config.batch_size);
        let params = inner.params.clone();
        match self
            .dispatch_initial(&mut inner.locked_voice, &remaining[..first], &params)
            .await
        {
            Ok(()) => {
                tracing::warn!(restarted_at = start, "Recovered stalled narration with a fresh batch");
                session.queue = remaining;
                session.cursor_index = first;
                inner.cached_depth = first;
                self.set_state(&mut inner.machine, PlaybackState::Playing);
                RefillOutcome::Recovered(first)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Recovery batch failed, narration paused");
                inner.session = None;
                self.set_state(&mut inner.machine, PlaybackState::Stopping);
                self.set_state(&mut inner.machine, PlaybackState::Idle);
                self.notify_degraded();
                RefillOutcome::Degraded
            }
        }
    }

    // ── Engine signals ─────────────────────────────────────────────

    /// The engine started an utterance. Returns the new latest index when it
    /// advanced.
    pub async fn on_item_started(&self, utterance_id: &str) -> Option<usize> {
        let (chapter_id, index) = parse_utterance_id(utterance_id)?;
        let mut inner = self.inner.lock().await;
        let session = inner.session.as_mut()?;
        if session.chapter_id != chapter_id {
            tracing::debug!(utterance_id, "Ignoring start signal from another chapter");
            return None;
        }
        if let Some(latest) = session.latest_confirmed_index {
            if index < latest {
                tracing::error!(index, latest, "Latest spoken index moved backwards, ignoring");
                return None;
            }
        }
        session.latest_confirmed_index = Some(index);
        Some(index)
    }

    /// The engine finished an utterance: update the cached depth, calibrate
    /// periodically, and refill.
    pub async fn on_item_finished(&self) -> RefillOutcome {
        {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            if inner.session.is_none() {
                return RefillOutcome::Inactive;
            }
            inner.cached_depth = inner.cached_depth.saturating_sub(1);
            inner.done_signals += 1;
            if inner.done_signals % self.config.calibration_interval.max(1) == 0 {
                self.calibrate_locked(inner).await;
            }
        }
        self.refill_queue().await
    }

    /// Decide what a native "queue empty" signal means.
    pub async fn on_queue_empty(&self) -> QueueEmptyVerdict {
        if self.is_restart_in_progress() {
            tracing::debug!("Queue empty during restart, ignoring");
            return QueueEmptyVerdict::Ignored;
        }
        if self.refill_in_flight.load(Ordering::Acquire) || self.state().is_transitional() {
            tracing::debug!(state = %self.state(), "Queue empty during transition, ignoring");
            return QueueEmptyVerdict::Ignored;
        }

        let remaining = {
            let inner = self.inner.lock().await;
            match inner.session.as_ref() {
                Some(session) => session.remaining(),
                None => return QueueEmptyVerdict::Ignored,
            }
        };

        if remaining > 0 {
            tracing::warn!(remaining, "Queue empty with items pending, emergency refill");
            return QueueEmptyVerdict::Refilled(self.refill_queue().await);
        }

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.session = None;
        inner.cached_depth = 0;
        self.set_state(&mut inner.machine, PlaybackState::Stopping);
        self.set_state(&mut inner.machine, PlaybackState::Idle);
        QueueEmptyVerdict::Drained
    }

    // ── Drift calibration ──────────────────────────────────────────

    /// Compare the cached native depth with the engine's and resync when they
    /// drifted apart by more than the tolerance.
    pub async fn calibrate_queue_depth(&self) -> DriftCheck {
        let mut inner = self.inner.lock().await;
        self.calibrate_locked(&mut inner).await
    }

    async fn calibrate_locked(&self, inner: &mut QueueInner) -> DriftCheck {
        let actual = match self.engine.queue_size().await {
            Ok(actual) => actual,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping drift calibration");
                return DriftCheck::Unavailable;
            }
        };
        let cached = inner.cached_depth;
        if cached.abs_diff(actual) > self.config.drift_tolerance {
            tracing::warn!(cached, actual, "Queue depth drifted, resyncing");
            inner.cached_depth = actual;
            Counters::bump(&self.counters.drift_corrections);
            DriftCheck::Corrected { cached, actual }
        } else {
            DriftCheck::WithinTolerance { cached, actual }
        }
    }

    /// Locally tracked native queue depth.
    pub async fn cached_depth(&self) -> usize {
        self.inner.lock().await.cached_depth
    }

    // ── Stop ───────────────────────────────────────────────────────

    /// Halt the engine and clear the queue. Keeps the restart flag so a
    /// deliberate restart that follows does not look like the end of
    /// narration. Returns whether the engine acknowledged.
    pub async fn stop(&self) -> bool {
        self.halt(false).await
    }

    /// Stop requested by the user: also clears the restart flag.
    pub async fn full_stop(&self) -> bool {
        self.restart_in_progress.store(false, Ordering::Release);
        self.halt(false).await
    }

    /// Pause the engine and drop the queue; resuming re-dispatches from the
    /// tracked position.
    pub async fn pause(&self) -> bool {
        self.halt(true).await
    }

    async fn halt(&self, pause: bool) -> bool {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.refill_requested.store(false, Ordering::Release);
        if inner.machine.state() != PlaybackState::Idle {
            self.set_state(&mut inner.machine, PlaybackState::Stopping);
        }

        let result = if pause {
            self.engine.pause().await
        } else {
            self.engine.stop().await
        };
        let acknowledged = match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(pause, error = %e, "Engine did not acknowledge halt");
                false
            }
        };

        inner.session = None;
        inner.cached_depth = 0;
        inner.done_signals = 0;
        inner.logged_exhausted = false;
        self.set_state(&mut inner.machine, PlaybackState::Idle);
        acknowledged
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn set_state(&self, machine: &mut PlaybackStateMachine, next: PlaybackState) {
        if let Some(t) = machine.transition(next) {
            self.state_tx.send_replace(t.to);
            self.emitter.emit(CoordinatorEvent::StateChanged {
                from: t.from,
                to: t.to,
            });
        }
    }

    fn notify_degraded(&self) {
        self.emitter.emit(CoordinatorEvent::AudioDegraded {
            message: DEGRADED_NOTICE.to_string(),
        });
        if let Some(ref notice) = self.degraded_notice {
            notice(DEGRADED_NOTICE);
        }
    }

    /// Register the engine-event subscription once.
    fn ensure_subscribed(self: &Arc<Self>) {
        self.subscription.get_or_init(|| {
            tracing::debug!("Subscribing queue manager to engine events");
            let events = self.engine.subscribe();
            tokio::spawn(pump_engine_events(Arc::downgrade(self), events))
        });
    }
}

impl Drop for AudioQueueManager {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.get() {
            handle.abort();
        }
    }
}

async fn pump_engine_events(
    manager: Weak<AudioQueueManager>,
    mut events: broadcast::Receiver<EngineEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Queue manager lagged behind engine events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(manager) = manager.upgrade() else {
            break;
        };
        match event {
            EngineEvent::SpeechStart { utterance_id } => {
                manager.on_item_started(&utterance_id).await;
            }
            EngineEvent::SpeechDone { .. } => {
                manager.on_item_finished().await;
            }
            EngineEvent::QueueEmpty | EngineEvent::SpeechError { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use narrate_core::{ChannelEmitter, NoopEmitter, VoiceInfo};
    use tokio_test::assert_ok;

    mock! {
        Engine {}

        #[async_trait]
        impl SpeechEngine for Engine {
            async fn speak(&self, utterance: &Utterance, params: &VoiceParams) -> Result<(), EngineError>;
            async fn speak_batch(
                &self,
                utterances: &[Utterance],
                params: &VoiceParams,
            ) -> Result<(), EngineError>;
            async fn add_to_batch(&self, utterances: &[Utterance]) -> Result<(), EngineError>;
            async fn queue_size(&self) -> Result<usize, EngineError>;
            async fn stop(&self) -> Result<(), EngineError>;
            async fn pause(&self) -> Result<(), EngineError>;
            async fn voices(&self) -> Result<Vec<VoiceInfo>, EngineError>;
            fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
        }
    }

    fn utterances(count: usize) -> Vec<Utterance> {
        (0..count)
            .map(|i| Utterance::for_paragraph(1, i, format!("Paragraph {i}.")))
            .collect()
    }

    /// Engine accepting every batch, expected to be subscribed to once.
    fn batch_engine(batches: usize) -> (MockEngine, broadcast::Sender<EngineEvent>) {
        let (events, _) = broadcast::channel(8);
        let sender = events.clone();
        let mut engine = MockEngine::new();
        engine
            .expect_subscribe()
            .times(1)
            .returning(move || events.subscribe());
        engine
            .expect_speak_batch()
            .times(batches)
            .returning(|_, _| Ok(()));
        (engine, sender)
    }

    #[tokio::test]
    async fn repeated_batches_share_one_subscription() {
        let (engine, _events) = batch_engine(2);
        let manager = Arc::new(AudioQueueManager::new(
            Arc::new(engine),
            QueueConfig::default(),
            Arc::new(NoopEmitter::new()),
        ));

        assert_ok!(
            manager
                .speak_batch(1, utterances(3), VoiceParams::default(), 3)
                .await
        );
        assert_ok!(
            manager
                .speak_batch(1, utterances(3), VoiceParams::default(), 3)
                .await
        );

        assert!(manager.is_subscribed());
        assert_eq!(manager.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn restart_while_playing_passes_through_stopping() {
        let (engine, _events) = batch_engine(2);
        let (emitter, mut rx) = ChannelEmitter::new();
        let manager = Arc::new(AudioQueueManager::new(
            Arc::new(engine),
            QueueConfig::default(),
            Arc::new(emitter),
        ));

        assert_ok!(
            manager
                .speak_batch(1, utterances(3), VoiceParams::default(), 3)
                .await
        );
        assert_ok!(
            manager
                .speak_batch(1, utterances(2), VoiceParams::default(), 2)
                .await
        );

        assert_eq!(manager.inner.lock().await.machine.invalid_transitions(), 0);
        let mut steps = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CoordinatorEvent::StateChanged { from, to } = event {
                steps.push((from, to));
            }
        }
        assert_eq!(
            steps,
            vec![
                (PlaybackState::Idle, PlaybackState::Starting),
                (PlaybackState::Starting, PlaybackState::Playing),
                (PlaybackState::Playing, PlaybackState::Stopping),
                (PlaybackState::Stopping, PlaybackState::Starting),
                (PlaybackState::Starting, PlaybackState::Playing),
            ]
        );
    }
}
