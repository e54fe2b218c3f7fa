//! Chapter-transition timing guard.
//!
//! Every chapter change records the previous chapter, stamps the transition
//! time, and marks the rendering surface unsynced. Two single-shot timers
//! follow: one marks the surface synced, the other clears media-navigation
//! tracking. A newer chapter change replaces both; timers from an older
//! generation are aborted, and any that already fired are ignored.

use std::time::Duration;

use narrate_core::{ChapterDirection, ChapterId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Timer expiry delivered back to the owning event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTimer {
    SurfaceSynced { generation: u64 },
    MediaNavExpired { generation: u64 },
}

/// A chapter skip triggered from the system media notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaNavTracking {
    pub source_chapter_id: ChapterId,
    pub direction: ChapterDirection,
}

/// What applying a timer changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEffect {
    /// The surface of this chapter is now synced.
    Synced(ChapterId),
    /// Media-navigation tracking was cleared.
    MediaNavCleared,
    /// The timer belonged to a superseded transition.
    Stale,
}

/// Aborts the timer task when dropped.
struct ScopedTimer(JoinHandle<()>);

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct ChapterTransitionGuard {
    sync_delay: Duration,
    media_nav_clear_after: Duration,
    timer_tx: mpsc::UnboundedSender<TransitionTimer>,
    generation: u64,
    current_chapter_id: Option<ChapterId>,
    prev_chapter_id: Option<ChapterId>,
    transition_at: Option<Instant>,
    surface_synced: bool,
    media_nav: Option<MediaNavTracking>,
    timers: Vec<ScopedTimer>,
}

impl ChapterTransitionGuard {
    /// Create a guard delivering timer expiries to `timer_tx`.
    pub fn new(
        sync_delay: Duration,
        media_nav_clear_after: Duration,
        timer_tx: mpsc::UnboundedSender<TransitionTimer>,
    ) -> Self {
        Self {
            sync_delay,
            media_nav_clear_after,
            timer_tx,
            generation: 0,
            current_chapter_id: None,
            prev_chapter_id: None,
            transition_at: None,
            surface_synced: true,
            media_nav: None,
            timers: Vec::new(),
        }
    }

    pub const fn current_chapter_id(&self) -> Option<ChapterId> {
        self.current_chapter_id
    }

    pub const fn prev_chapter_id(&self) -> Option<ChapterId> {
        self.prev_chapter_id
    }

    pub const fn is_surface_synced(&self) -> bool {
        self.surface_synced
    }

    pub const fn media_nav(&self) -> Option<MediaNavTracking> {
        self.media_nav
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the last chapter change happened less than `window` ago.
    pub fn in_grace(&self, window: Duration) -> bool {
        self.transition_at
            .is_some_and(|at| Instant::now().duration_since(at) < window)
    }

    /// Record a chapter change. Returns `false` when `chapter_id` is already
    /// current (nothing is restarted).
    pub fn on_chapter_change(&mut self, chapter_id: ChapterId) -> bool {
        if self.current_chapter_id == Some(chapter_id) {
            return false;
        }

        self.prev_chapter_id = self.current_chapter_id;
        self.current_chapter_id = Some(chapter_id);
        self.transition_at = Some(Instant::now());
        self.surface_synced = false;
        self.generation += 1;
        tracing::info!(
            prev = ?self.prev_chapter_id,
            chapter_id,
            generation = self.generation,
            "Chapter changed"
        );

        self.timers.clear();
        let generation = self.generation;
        self.timers.push(self.schedule(
            self.sync_delay,
            TransitionTimer::SurfaceSynced { generation },
        ));
        if self.media_nav.is_some() {
            self.timers.push(self.schedule(
                self.media_nav_clear_after,
                TransitionTimer::MediaNavExpired { generation },
            ));
        }
        true
    }

    /// Apply an expired timer if it belongs to the current generation.
    pub fn apply(&mut self, timer: TransitionTimer) -> TimerEffect {
        match timer {
            TransitionTimer::SurfaceSynced { generation } if generation == self.generation => {
                self.surface_synced = true;
                self.current_chapter_id
                    .map_or(TimerEffect::Stale, TimerEffect::Synced)
            }
            TransitionTimer::MediaNavExpired { generation } if generation == self.generation => {
                tracing::debug!(tracking = ?self.media_nav, "Clearing media navigation tracking");
                self.media_nav = None;
                TimerEffect::MediaNavCleared
            }
            stale => {
                tracing::trace!(?stale, current = self.generation, "Ignoring stale transition timer");
                TimerEffect::Stale
            }
        }
    }

    /// Remember a media-notification chapter skip; cleared after the next
    /// chapter change's window.
    pub fn set_media_nav(&mut self, source_chapter_id: ChapterId, direction: ChapterDirection) {
        self.media_nav = Some(MediaNavTracking {
            source_chapter_id,
            direction,
        });
    }

    /// Mark the surface unsynced without a chapter change (e.g. stitched view
    /// being cleared).
    pub fn mark_unsynced(&mut self) {
        self.surface_synced = false;
    }

    /// Abort pending timers, e.g. on teardown or an explicit stop.
    pub fn cancel(&mut self) {
        if !self.timers.is_empty() {
            tracing::debug!(generation = self.generation, "Cancelling transition timers");
        }
        self.timers.clear();
    }

    fn schedule(&self, delay: Duration, timer: TransitionTimer) -> ScopedTimer {
        let tx = self.timer_tx.clone();
        ScopedTimer(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the coordinator shut down.
            let _ = tx.send(timer);
        }))
    }
}
