//! Rendering-surface messages.

use narrate_core::{
    ChapterDirection, ExitDialogData, StopReason, SurfaceCommand, Utterance, keys,
};

use super::{PlaybackCoordinator, to_index};
use crate::position::{SaveContext, SaveRequest, evaluate_save};
use crate::protocol::{SurfaceMessage, parse_surface_message};
use crate::workflow::DialogWorkflow;

impl PlaybackCoordinator {
    /// Decode and handle a raw message posted by the rendering surface.
    ///
    /// Rate-limited, nonce-checked, and silently dropped when malformed.
    pub async fn handle_surface_message(&mut self, raw: &str) {
        if !self.limiter.allow() {
            return;
        }
        let Some(nonce) = self.context.as_ref().map(|c| c.nonce.clone()) else {
            tracing::debug!("No chapter loaded, dropping surface message");
            return;
        };
        let Some(message) = parse_surface_message(raw, &nonce) else {
            return;
        };
        tracing::debug!(kind = message.type_name(), "Surface message");
        self.dispatch_surface_message(message).await;
    }

    /// Handle an already-decoded surface message.
    pub async fn dispatch_surface_message(&mut self, message: SurfaceMessage) {
        match message {
            SurfaceMessage::Hide => self.host.hide_reader_ui(),
            SurfaceMessage::Next { auto_start_tts } => {
                if auto_start_tts {
                    self.apply_continue_mode();
                }
                self.host.navigate_adjacent(ChapterDirection::Next);
            }
            SurfaceMessage::Prev => {
                self.chapters_auto_played = 0;
                self.host.navigate_adjacent(ChapterDirection::Prev);
            }
            SurfaceMessage::Save {
                percent,
                paragraph_index,
                chapter_id,
            } => self.on_save(percent, paragraph_index, chapter_id).await,
            SurfaceMessage::Speak {
                text,
                paragraph_index,
            } => self.on_speak(text, paragraph_index).await,
            SurfaceMessage::StopSpeak => self.stop_narration(StopReason::User).await,
            SurfaceMessage::TtsState(state) => self.tracker.cache_snapshot(state),
            SurfaceMessage::RequestTtsConfirmation { saved_index } => {
                self.request_confirmation(saved_index).await;
            }
            SurfaceMessage::RequestTtsExit { visible, tts_index } => {
                let total = to_index(self.total_paragraphs());
                self.enter_workflow(DialogWorkflow::Exit(ExitDialogData {
                    tts_paragraph: tts_index,
                    reader_paragraph: visible,
                    total_paragraphs: total,
                }));
            }
            SurfaceMessage::ExitAllowed => self.host.navigate_back(),
            SurfaceMessage::ScrollPrompt(prompt) => {
                self.enter_workflow(DialogWorkflow::ScrollSync(prompt));
            }
            SurfaceMessage::ManualModePrompt => {
                self.enter_workflow(DialogWorkflow::ManualMode);
            }
            SurfaceMessage::SaveButtonPosition(position) => {
                if let Err(e) = self
                    .store
                    .set(keys::TTS_BUTTON_POSITION, &position.to_string())
                    .await
                {
                    tracing::warn!(error = %e, "Failed to store button position");
                }
            }
            SurfaceMessage::ShowToast(message) => self.host.show_toast(&message),
        }
    }

    async fn on_save(
        &mut self,
        percent: Option<i64>,
        paragraph_index: Option<i64>,
        chapter_id: Option<i64>,
    ) {
        let Some(current_chapter) = self.chapter_id() else {
            return;
        };
        let ctx = SaveContext {
            chapter_id: current_chapter,
            is_reading: self.is_reading(),
            current_index: self.tracker.current_index(),
            latest_index: self.tracker.latest_index(),
            in_transition_grace: self.transition.in_grace(self.arbiter.config().save_grace),
        };
        let request = SaveRequest {
            chapter_id,
            paragraph_index,
        };
        if let Err(rejection) = evaluate_save(request, ctx) {
            tracing::debug!(?rejection, ?chapter_id, ?paragraph_index, "Ignoring save");
            return;
        }

        tracing::debug!(?percent, ?paragraph_index, "Saving reader progress");
        match paragraph_index {
            Some(index) => {
                self.tracker
                    .persist_position(current_chapter, index, percent)
                    .await;
            }
            None => {
                if let Some(percent) = percent {
                    if let Err(e) = self.chapters.update_progress(current_chapter, percent).await {
                        tracing::warn!(chapter_id = current_chapter, error = %e, "Failed to save progress");
                    }
                }
            }
        }
    }

    /// Start narration from the paragraph the surface asked for. Falls back
    /// to speaking the single text when the index is unusable or the batch
    /// start fails.
    async fn on_speak(&mut self, text: String, paragraph_index: Option<i64>) {
        let Some(chapter_id) = self.chapter_id() else {
            return;
        };
        self.inject(SurfaceCommand::ClearStitchedChapters);
        self.auto_stop.start(self.settings.auto_stop);

        let index = paragraph_index
            .or_else(|| self.tracker.current_index())
            .unwrap_or(-1);
        let total = to_index(self.total_paragraphs());
        if (0..total).contains(&index) {
            match self.restart_from_paragraph_index(index).await {
                Ok(_) => return,
                Err(e) => tracing::warn!(chapter_id, index, error = %e, "Batch start failed, speaking single paragraph"),
            }
        } else {
            tracing::warn!(chapter_id, index, total, "Speak request outside chapter, speaking single paragraph");
        }

        let utterance = match usize::try_from(index) {
            Ok(index) => Utterance::for_paragraph(chapter_id, index, text),
            Err(_) => Utterance {
                id: format!("chapter_{chapter_id}_single"),
                text,
            },
        };
        if let Err(e) = self.queue.speak(&utterance, &self.voice_params()).await {
            tracing::warn!(chapter_id, error = %e, "Single utterance failed");
        }
    }
}
