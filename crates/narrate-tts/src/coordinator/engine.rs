//! Speech-engine signals, end of chapter, and auto-stop.

use narrate_core::{
    ChapterDirection, ContinueMode, CoordinatorEvent, EngineEvent, StopReason, SurfaceCommand,
    parse_utterance_id, progress_percent,
};

use super::{PlaybackCoordinator, to_index};
use crate::auto_stop::AutoStopReason;
use crate::queue::QueueEmptyVerdict;

impl PlaybackCoordinator {
    /// Handle one signal from the speech engine.
    pub async fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SpeechStart { utterance_id } => self.on_speech_start(&utterance_id).await,
            EngineEvent::SpeechDone { .. } => {
                if let Some((reason, amount)) = self.auto_stop.on_paragraph_spoken() {
                    self.on_auto_stop(reason, amount).await;
                }
            }
            EngineEvent::QueueEmpty => {
                if self.queue.on_queue_empty().await == QueueEmptyVerdict::Drained {
                    self.on_chapter_drained().await;
                }
            }
            EngineEvent::SpeechError {
                utterance_id,
                message,
            } => {
                tracing::warn!(?utterance_id, %message, "Speech engine reported an error");
            }
        }
    }

    async fn on_speech_start(&mut self, utterance_id: &str) {
        let Some((chapter_id, index)) = parse_utterance_id(utterance_id) else {
            tracing::debug!(utterance_id, "Ignoring start of unknown utterance");
            return;
        };
        let Some(current) = self.chapter_id() else {
            return;
        };
        if chapter_id != current {
            tracing::debug!(chapter_id, current, "Ignoring start signal from stale chapter");
            return;
        }
        if !self.transition.is_surface_synced() {
            tracing::debug!(utterance_id, "Surface syncing, skipping speech start");
            return;
        }

        let index = to_index(index);
        self.tracker.advance_to(index);
        self.emitter.emit(CoordinatorEvent::ParagraphChanged {
            chapter_id,
            paragraph_index: index,
        });
        self.inject(SurfaceCommand::Highlight {
            paragraph_index: index,
        });

        let percent = progress_percent(index, self.total_paragraphs());
        self.tracker
            .persist_position(chapter_id, index, Some(percent))
            .await;
        self.notify_media(self.is_reading()).await;
    }

    /// The queue ran dry at the genuine end of the chapter.
    async fn on_chapter_drained(&mut self) {
        let Some(chapter_id) = self.chapter_id() else {
            return;
        };
        tracing::info!(chapter_id, "Chapter finished");
        self.emitter
            .emit(CoordinatorEvent::ChapterFinished { chapter_id });

        if let Some((reason, amount)) = self.auto_stop.on_chapter_finished() {
            self.on_auto_stop(reason, amount).await;
            return;
        }

        let has_next = self
            .context
            .as_ref()
            .is_some_and(|c| c.next_chapter.is_some());
        if !has_next {
            tracing::info!(chapter_id, "No next chapter, novel complete");
            self.host.show_toast("Novel reading complete!");
            self.stop_narration(StopReason::EndOfChapter).await;
            return;
        }

        if !self.apply_continue_mode() {
            self.stop_narration(StopReason::EndOfChapter).await;
            return;
        }

        if let Err(e) = self.chapters.update_progress(chapter_id, 100).await {
            tracing::warn!(chapter_id, error = %e, "Failed to mark finished chapter");
        }
        self.force_start_from_zero = true;
        self.tracker.reset_for_chapter(Some(0));
        self.auto_stop.reset_counters();
        tracing::info!(chapter_id, "Continuing to next chapter");
        self.host.navigate_adjacent(ChapterDirection::Next);
    }

    /// Apply the continue-to-next-chapter policy for one chapter hop and
    /// record whether the next load should auto-start.
    pub(crate) fn apply_continue_mode(&mut self) -> bool {
        let autostart = match self.settings.continue_to_next_chapter {
            ContinueMode::None => {
                self.chapters_auto_played = 0;
                false
            }
            ContinueMode::Continuous => {
                self.chapters_auto_played += 1;
                true
            }
            ContinueMode::Chapters(limit) => {
                if self.chapters_auto_played < limit {
                    self.chapters_auto_played += 1;
                    true
                } else {
                    self.chapters_auto_played = 0;
                    false
                }
            }
        };
        self.autostart_next_load = autostart;
        autostart
    }

    /// The minutes deadline passed.
    pub async fn on_auto_stop_deadline(&mut self) {
        if let Some((reason, amount)) = self.auto_stop.on_deadline() {
            self.on_auto_stop(reason, amount).await;
        }
    }

    async fn on_auto_stop(&mut self, reason: AutoStopReason, amount: u32) {
        let plural = if amount == 1 { "" } else { "s" };
        let message = match reason {
            AutoStopReason::Minutes => format!("Auto-stop: {amount} minute{plural} elapsed"),
            AutoStopReason::Paragraphs => format!("Auto-stop: {amount} paragraph{plural} read"),
            AutoStopReason::Chapters => format!("Auto-stop: {amount} chapter{plural} complete"),
        };
        self.host.show_toast(&message);
        self.stop_narration(StopReason::AutoStop {
            detail: reason.describe(amount),
        })
        .await;
    }
}
