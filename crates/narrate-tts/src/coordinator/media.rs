//! Media-notification actions.

use narrate_core::{
    ChapterDirection, CoordinatorEvent, StopReason, SurfaceCommand, progress_percent,
};

use super::PlaybackCoordinator;
use crate::media::{MediaAction, seek_target};

impl PlaybackCoordinator {
    /// Handle an action from the system media notification. Actions within
    /// the debounce window of the previous one are dropped.
    pub async fn handle_media_action(&mut self, action: MediaAction) {
        if !self.debouncer.accept(self.clock.now_ms()) {
            tracing::debug!(%action, "Debounced media action");
            return;
        }
        tracing::info!(%action, "Media action");

        match action {
            MediaAction::PlayPause => {
                if self.is_reading() {
                    self.pause_narration().await;
                } else {
                    self.resume_from_media().await;
                }
            }
            MediaAction::SeekBack => self.seek(false).await,
            MediaAction::SeekForward => self.seek(true).await,
            MediaAction::PrevChapter => self.skip_chapter(ChapterDirection::Prev).await,
            MediaAction::NextChapter => self.skip_chapter(ChapterDirection::Next).await,
            MediaAction::Stop => {
                self.inject(SurfaceCommand::Stop);
                self.stop_narration(StopReason::User).await;
            }
        }
    }

    async fn pause_narration(&mut self) {
        let Some(chapter_id) = self.chapter_id() else {
            return;
        };
        let index = self.tracker.current_index().unwrap_or(0).max(0);
        let percent = progress_percent(index, self.total_paragraphs());
        self.tracker
            .persist_position(chapter_id, index, Some(percent))
            .await;
        self.tracker.mark_paused(self.clock.now_ms());
        self.tracker.set_latest(index);
        self.autostart_next_load = false;
        self.auto_stop.stop();

        self.queue.pause().await;
        self.inject(SurfaceCommand::Pause);
        tracing::info!(chapter_id, index, "Narration paused");
        self.emitter.emit(CoordinatorEvent::NarrationPaused {
            chapter_id,
            paragraph_index: index,
        });
        self.notify_media(false).await;
    }

    async fn resume_from_media(&mut self) {
        let Some(chapter_id) = self.chapter_id() else {
            return;
        };
        let persisted = self.tracker.persisted_index(chapter_id).await;
        let start = [
            self.tracker.current_index(),
            self.tracker.latest_index(),
            persisted,
        ]
        .into_iter()
        .flatten()
        .fold(0, i64::max);

        match self.restart_from_paragraph_index(start).await {
            Ok(_) => self.rearm_auto_stop(),
            Err(e) => tracing::warn!(chapter_id, start, error = %e, "Media resume failed"),
        }
    }

    async fn seek(&mut self, forward: bool) {
        let target = seek_target(self.tracker.current_index(), self.total_paragraphs(), forward);
        if let Err(e) = self.restart_from_paragraph_index(target).await {
            if forward {
                tracing::warn!(target, error = %e, "Seek forward failed");
                return;
            }
            tracing::warn!(target, error = %e, "Seek back failed, retrying after full stop");
            self.queue.full_stop().await;
            if let Err(e) = self.restart_from_paragraph_index(target).await {
                tracing::warn!(target, error = %e, "Seek back retry failed");
                return;
            }
        }
        self.rearm_auto_stop();
    }

    /// Jump to the adjacent chapter, wiping every trace of narration in the
    /// chapters involved so the destination starts from its first paragraph.
    async fn skip_chapter(&mut self, direction: ChapterDirection) {
        let Some(ctx) = self.context.as_ref() else {
            return;
        };
        let source = ctx.chapter.clone();
        let destination = match direction {
            ChapterDirection::Prev => ctx.prev_chapter.clone(),
            ChapterDirection::Next => ctx.next_chapter.clone(),
        };
        let Some(destination) = destination else {
            self.host.show_toast(match direction {
                ChapterDirection::Prev => "No previous chapter",
                ChapterDirection::Next => "No next chapter",
            });
            return;
        };

        self.transition.mark_unsynced();
        self.transition.set_media_nav(source.id, direction);

        let source_progress = match direction {
            ChapterDirection::Prev => 1,
            ChapterDirection::Next => 100,
        };
        for (chapter_id, progress) in [(source.id, source_progress), (destination.id, 0)] {
            if let Err(e) = self.chapters.update_progress(chapter_id, progress).await {
                tracing::warn!(chapter_id, progress, error = %e, "Failed to update chapter progress");
            }
        }

        let low = source.position.min(destination.position);
        let high = source.position.max(destination.position);
        let skipped = self
            .chapters
            .chapter_ids_between(source.novel_id, low, high)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Skipped chapter lookup failed");
                Vec::new()
            });
        let mut cleared = vec![source.id, destination.id];
        cleared.extend(skipped);
        tracing::info!(from = source.id, to = destination.id, ?cleared, "Clearing progress for media chapter skip");
        self.tracker.clear_persisted(&cleared).await;

        self.queue.mark_restart_in_progress();
        self.queue.stop().await;
        self.autostart_next_load = true;
        self.force_start_from_zero = true;
        self.host.navigate_adjacent(direction);
        self.notify_media(true).await;
    }
}
