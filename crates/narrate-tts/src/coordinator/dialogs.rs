//! Resume arbitration, dialog responses, and back navigation.

use narrate_core::{
    Chapter, ChapterId, CoordinatorEvent, ForwardResetMode, ManualModeChoice, RepositoryError,
    StopReason, SurfaceCommand, progress_percent,
};

use super::PlaybackCoordinator;
use crate::arbitration::{ConfirmationDecision, ConfirmationRequest};
use crate::back::{BackContext, BackPlan, plan_back};
use crate::error::{TtsError, WorkflowError};
use crate::workflow::{
    DialogWorkflow, ScrollSyncPrompt, SyncStatus, WakeSyncState, WorkflowResponse,
};

impl PlaybackCoordinator {
    // ── Arbitration ────────────────────────────────────────────────

    /// The surface reported a candidate resume position.
    pub async fn request_confirmation(&mut self, saved_index: i64) {
        let Some((novel_id, chapter_id)) = self.context.as_ref().map(|c| (c.novel.id, c.chapter.id))
        else {
            return;
        };
        let request = ConfirmationRequest {
            novel_id,
            chapter_id,
            saved_index,
            current_index: self.tracker.current_index().or(self.tracker.latest_index()),
            last_pause_ms: self.tracker.last_pause_ms(),
            now_ms: self.clock.now_ms(),
        };

        match self.arbiter.decide(request).await {
            ConfirmationDecision::ScrollConflict { .. } => self.resume_cancel(),
            ConfirmationDecision::ChapterSelection(candidates) => {
                self.emitter.emit(CoordinatorEvent::ConflictsFound {
                    chapters: candidates.clone(),
                });
                self.tracker.set_pending_resume(saved_index);
                self.enter_workflow(DialogWorkflow::ChapterSelection { candidates });
            }
            ConfirmationDecision::Resume => {
                self.tracker.update_last_known_chapter(chapter_id).await;
                self.tracker.set_pending_resume(saved_index);
                self.enter_workflow(DialogWorkflow::Resume);
            }
        }
    }

    /// Resolve the best resume position and start narrating there.
    async fn resume_confirm(&mut self) -> Result<(), TtsError> {
        let chapter = self
            .context
            .as_ref()
            .map(|c| c.chapter.clone())
            .ok_or(TtsError::NoChapter)?;
        let resolved = self.tracker.resolve_resume(chapter.id).await.max(0);
        let now = self.clock.now_ms();
        self.tracker
            .save_snapshot(&chapter, resolved, now, Some(true))
            .await;
        self.inject(SurfaceCommand::RestoreState {
            paragraph_index: resolved,
            should_resume: true,
            auto_start: false,
        });
        self.restart_from_paragraph_index(resolved).await?;
        self.auto_stop.start(self.settings.auto_stop);
        Ok(())
    }

    /// Treat auto-resume as handled and let the surface start from where the
    /// reader is.
    fn resume_cancel(&mut self) {
        tracing::info!("Starting fresh instead of resuming");
        self.tracker.set_pending_resume(-1);
        self.inject(SurfaceCommand::StartFresh);
    }

    // ── Responses ──────────────────────────────────────────────────

    /// Answer the visible dialog.
    ///
    /// Every handler hides its own dialog before acting, so a follow-up
    /// dialog (chapter selection reopening resume) can be shown.
    pub async fn respond(&mut self, response: WorkflowResponse) -> Result<(), TtsError> {
        let active = self.workflows.active().clone();
        tracing::debug!(workflow = ?active.kind(), action = response.name(), "Workflow response");

        match (active, response) {
            (DialogWorkflow::None, _) => Err(WorkflowError::NoneActive.into()),

            (DialogWorkflow::Resume, WorkflowResponse::Confirm) => {
                self.workflows.dismiss();
                self.resume_confirm().await
            }
            (DialogWorkflow::Resume, WorkflowResponse::Cancel) => {
                self.workflows.dismiss();
                self.resume_cancel();
                Ok(())
            }
            (DialogWorkflow::Resume, WorkflowResponse::RestartChapter) => {
                self.workflows.dismiss();
                self.tracker.set_pending_resume(-1);
                self.inject(SurfaceCommand::StartFromFirstReadable);
                Ok(())
            }

            (DialogWorkflow::ChapterSelection { .. }, WorkflowResponse::SelectChapter { chapter_id }) => {
                self.workflows.dismiss();
                self.select_chapter(chapter_id).await
            }
            (DialogWorkflow::ChapterSelection { .. }, WorkflowResponse::Cancel) => {
                self.workflows.dismiss();
                self.tracker.set_pending_resume(-1);
                Ok(())
            }

            (DialogWorkflow::ScrollSync(prompt), WorkflowResponse::Confirm) => {
                self.workflows.dismiss();
                self.scroll_sync_confirm(&prompt).await
            }
            (DialogWorkflow::ScrollSync(prompt), WorkflowResponse::Cancel) => {
                self.workflows.dismiss();
                self.scroll_sync_cancel(&prompt);
                Ok(())
            }

            (DialogWorkflow::ManualMode, WorkflowResponse::ManualStop) => {
                self.manual_stop().await;
                Ok(())
            }
            (DialogWorkflow::ManualMode, WorkflowResponse::ManualContinue) => {
                self.workflows.dismiss();
                self.inject(SurfaceCommand::ManualMode {
                    choice: ManualModeChoice::Continue,
                });
                Ok(())
            }

            (DialogWorkflow::Exit(data), WorkflowResponse::ExitWithTtsPosition) => {
                self.exit_at(data.tts_paragraph).await;
                Ok(())
            }
            (DialogWorkflow::Exit(data), WorkflowResponse::ExitWithReaderPosition) => {
                self.exit_at(data.reader_paragraph).await;
                Ok(())
            }

            (DialogWorkflow::WakeSync(state), WorkflowResponse::Retry) => {
                self.wake_sync_retry(&state).await;
                Ok(())
            }

            (_, WorkflowResponse::Dismiss) => {
                self.workflows.dismiss();
                Ok(())
            }

            (active, response) => {
                let error = active.kind().map_or(WorkflowError::NoneActive, |workflow| {
                    WorkflowError::UnexpectedResponse {
                        workflow,
                        action: response.name(),
                    }
                });
                Err(error.into())
            }
        }
    }

    // ── Chapter selection ──────────────────────────────────────────

    async fn select_chapter(&mut self, chapter_id: ChapterId) -> Result<(), TtsError> {
        let current = self
            .context
            .as_ref()
            .map(|c| c.chapter.clone())
            .ok_or(TtsError::NoChapter)?;

        if chapter_id == current.id {
            tracing::info!(chapter_id, "Continuing from current chapter");
            self.settle_chapter_selection(&current).await;
            self.tracker.update_last_known_chapter(chapter_id).await;
            if self.tracker.pending_resume_index() >= 0 {
                self.enter_workflow(DialogWorkflow::Resume);
            }
            return Ok(());
        }

        let target = self
            .chapters
            .get_chapter(chapter_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("chapter {chapter_id}")))?;
        tracing::info!(chapter_id, from = current.id, "Switching to selected chapter");
        self.settle_chapter_selection(&target).await;
        self.tracker.update_last_known_chapter(chapter_id).await;
        self.tracker.set_pending_resume(-1);
        self.host.navigate_to_chapter(&target);
        Ok(())
    }

    /// Mark everything before `chapter` read and apply the forward reset.
    async fn settle_chapter_selection(&self, chapter: &Chapter) {
        match self
            .chapters
            .mark_chapters_before_position_read(chapter.novel_id, chapter.position)
            .await
        {
            Ok(marked) => tracing::debug!(chapter_id = chapter.id, marked, "Marked earlier chapters read"),
            Err(e) => tracing::warn!(chapter_id = chapter.id, error = %e, "Failed to mark earlier chapters read"),
        }

        let mode = self.settings.forward_reset;
        let label = match mode {
            ForwardResetMode::None => return,
            ForwardResetMode::Position => "position",
            ForwardResetMode::Unread => "unread",
        };
        match self
            .chapters
            .reset_future_chapters_progress(
                chapter.novel_id,
                chapter.id,
                mode,
                self.settings.forward_reset_scope,
            )
            .await
        {
            Ok(reset) => {
                tracing::info!(chapter_id = chapter.id, reset, mode = label, "Reset future chapter progress");
                self.host
                    .show_toast(&format!("Future progress reset: {label}"));
            }
            Err(e) => {
                tracing::warn!(chapter_id = chapter.id, error = %e, "Failed to reset future chapters");
            }
        }
    }

    // ── Scroll sync ────────────────────────────────────────────────

    async fn scroll_sync_confirm(&mut self, prompt: &ScrollSyncPrompt) -> Result<(), TtsError> {
        let chapter_id = self.chapter_id().ok_or(TtsError::NoChapter)?;
        if prompt.is_stitched {
            let (target_chapter, local_index) = prompt
                .locate(prompt.visible_index)
                .unwrap_or((chapter_id, prompt.visible_index));
            tracing::info!(target_chapter, local_index, "Restarting at visible stitched position");
            self.inject(SurfaceCommand::SetRestartIntent {
                chapter_id: target_chapter,
                local_index,
                auto_resume: true,
            });
            self.inject(SurfaceCommand::ClearStitchedChapters);
            return Ok(());
        }

        let visible = prompt.visible_index;
        self.inject(SurfaceCommand::ChangeParagraphPosition {
            paragraph_index: visible,
        });
        if self.is_reading() || prompt.is_resume {
            self.restart_from_paragraph_index(visible).await?;
        } else {
            self.tracker.set_current(visible);
            self.tracker.set_latest(visible);
        }
        Ok(())
    }

    fn scroll_sync_cancel(&self, prompt: &ScrollSyncPrompt) {
        let Some(chapter_id) = self.chapter_id() else {
            return;
        };
        if prompt.is_stitched {
            let (target_chapter, local_index) = prompt
                .locate(prompt.current_index)
                .unwrap_or((chapter_id, prompt.current_index));
            self.inject(SurfaceCommand::SetRestartIntent {
                chapter_id: target_chapter,
                local_index,
                auto_resume: prompt.is_resume,
            });
            self.inject(SurfaceCommand::ClearStitchedChapters);
        } else if prompt.is_resume {
            self.inject(SurfaceCommand::Resume { force: true });
        }
    }

    // ── Manual mode, exit, wake sync ───────────────────────────────

    async fn manual_stop(&mut self) {
        self.workflows.dismiss();
        self.inject(SurfaceCommand::ManualMode {
            choice: ManualModeChoice::Stop,
        });
        self.queue.stop().await;
        self.auto_stop.stop();
        self.autostart_next_load = false;
        self.host.show_toast("Switched to manual reading mode");
        self.emitter.emit(CoordinatorEvent::NarrationStopped {
            chapter_id: self.chapter_id(),
            reason: StopReason::ManualMode,
        });
        self.notify_media(false).await;
    }

    /// Hide dialog, stop, persist `index`, navigate. In that order.
    async fn exit_at(&mut self, index: i64) {
        self.workflows.dismiss();
        self.stop_narration(StopReason::Exit).await;
        if let Some(chapter_id) = self.chapter_id() {
            let percent = progress_percent(index, self.total_paragraphs());
            self.tracker
                .persist_position(chapter_id, index, Some(percent))
                .await;
        }
        self.host.navigate_back();
    }

    async fn wake_sync_retry(&mut self, state: &WakeSyncState) {
        let Some(target) = state.target_chapter_id else {
            tracing::debug!("No wake-sync target, dismissing");
            self.workflows.dismiss();
            return;
        };
        self.set_wake_sync_status(SyncStatus::Syncing, target);

        match self.chapters.get_chapter(target).await {
            Ok(Some(chapter)) => {
                tracing::info!(chapter_id = target, "Retrying wake sync");
                self.wake_target = Some(target);
                self.host.navigate_to_chapter(&chapter);
            }
            Ok(None) => {
                tracing::warn!(chapter_id = target, "Wake-sync target chapter missing");
                self.set_wake_sync_status(SyncStatus::Failed, target);
            }
            Err(e) => {
                tracing::warn!(chapter_id = target, error = %e, "Wake-sync lookup failed");
                self.set_wake_sync_status(SyncStatus::Failed, target);
            }
        }
    }

    fn set_wake_sync_status(&mut self, status: SyncStatus, target: ChapterId) {
        let update = DialogWorkflow::WakeSync(WakeSyncState {
            status,
            target_chapter_id: Some(target),
            retry_count: 0,
        });
        if let Err(e) = self.workflows.update(update) {
            tracing::debug!(error = %e, "Wake-sync status update skipped");
        }
    }

    // ── Back navigation ────────────────────────────────────────────

    /// Handle a back press. Returns `true` when the default back behaviour
    /// must not run.
    pub async fn handle_back(&mut self) -> bool {
        let visible_index = if self.surface.is_ready() {
            self.surface.visible_paragraph().await
        } else {
            None
        };
        let total = self.total_paragraphs();
        let plan = plan_back(BackContext {
            workflow_visible: self.workflows.is_visible(),
            is_reading: self.is_reading(),
            current_index: self.tracker.current_index(),
            latest_index: self.tracker.latest_index(),
            visible_index,
            total_paragraphs: total,
            gap_threshold: self.arbiter.config().scroll_gap_threshold,
        });
        tracing::debug!(?plan, "Back pressed");

        match plan {
            BackPlan::NotHandled => {}
            BackPlan::StopAndLeave { save_index } => {
                self.stop_narration(StopReason::Exit).await;
                self.persist_on_leave(save_index, progress_percent(save_index, total))
                    .await;
                self.host.navigate_back();
            }
            BackPlan::ConfirmExit(data) => {
                self.enter_workflow(DialogWorkflow::Exit(data));
            }
            BackPlan::SaveAndLeave { save_index, percent } => {
                self.persist_on_leave(save_index, percent).await;
                self.host.navigate_back();
            }
        }
        plan.is_handled()
    }

    async fn persist_on_leave(&mut self, index: i64, percent: i64) {
        if let Some(chapter_id) = self.chapter_id() {
            self.tracker
                .persist_position(chapter_id, index.max(0), Some(percent))
                .await;
        }
    }
}
