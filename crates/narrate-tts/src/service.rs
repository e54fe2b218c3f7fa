//! Event-loop service around [`PlaybackCoordinator`].
//!
//! One task owns the coordinator and serializes every input: host commands,
//! speech-engine signals, transition timers, and the auto-stop deadline. The
//! handle is cheap to clone and can be shared with any number of adapters.

use std::sync::Arc;

use narrate_core::{ChapterId, EngineEvent, NarrationSettings, SpeechEngine};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::coordinator::{
    ChapterContext, CoordinatorConfig, CoordinatorPorts, CoordinatorSnapshot, PlaybackCoordinator,
};
use crate::error::TtsError;
use crate::media::MediaAction;
use crate::workflow::WorkflowResponse;

/// Inputs accepted by the coordinator service.
#[derive(Debug)]
pub enum CoordinatorCommand {
    LoadChapter(Box<ChapterContext>),
    SurfaceMessage(String),
    MediaAction(MediaAction),
    Respond {
        response: WorkflowResponse,
        reply: oneshot::Sender<Result<(), TtsError>>,
    },
    Back {
        reply: oneshot::Sender<bool>,
    },
    RestartFrom {
        index: i64,
        reply: oneshot::Sender<Result<usize, TtsError>>,
    },
    AppBackground,
    WakeSyncFailed(Option<ChapterId>),
    UpdateSettings(NarrationSettings),
    Snapshot {
        reply: oneshot::Sender<CoordinatorSnapshot>,
    },
    Shutdown,
}

/// Handle to a running coordinator service.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    fn send(&self, command: CoordinatorCommand) -> Result<(), TtsError> {
        self.tx.send(command).map_err(|_| TtsError::ServiceStopped)
    }

    pub fn load_chapter(&self, context: ChapterContext) -> Result<(), TtsError> {
        self.send(CoordinatorCommand::LoadChapter(Box::new(context)))
    }

    pub fn surface_message(&self, raw: impl Into<String>) -> Result<(), TtsError> {
        self.send(CoordinatorCommand::SurfaceMessage(raw.into()))
    }

    pub fn media_action(&self, action: MediaAction) -> Result<(), TtsError> {
        self.send(CoordinatorCommand::MediaAction(action))
    }

    pub fn app_background(&self) -> Result<(), TtsError> {
        self.send(CoordinatorCommand::AppBackground)
    }

    pub fn wake_sync_failed(&self, target: Option<ChapterId>) -> Result<(), TtsError> {
        self.send(CoordinatorCommand::WakeSyncFailed(target))
    }

    pub fn update_settings(&self, settings: NarrationSettings) -> Result<(), TtsError> {
        self.send(CoordinatorCommand::UpdateSettings(settings))
    }

    pub async fn respond(&self, response: WorkflowResponse) -> Result<(), TtsError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Respond { response, reply })?;
        rx.await.map_err(|_| TtsError::ServiceStopped)?
    }

    /// Returns whether the back press was handled.
    pub async fn back(&self) -> Result<bool, TtsError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Back { reply })?;
        rx.await.map_err(|_| TtsError::ServiceStopped)
    }

    pub async fn restart_from(&self, index: i64) -> Result<usize, TtsError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::RestartFrom { index, reply })?;
        rx.await.map_err(|_| TtsError::ServiceStopped)?
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot, TtsError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Snapshot { reply })?;
        rx.await.map_err(|_| TtsError::ServiceStopped)
    }

    /// Stop narration and end the service loop.
    pub fn shutdown(&self) -> Result<(), TtsError> {
        self.send(CoordinatorCommand::Shutdown)
    }
}

/// Spawns and owns the coordinator task.
pub struct CoordinatorService;

impl CoordinatorService {
    /// Build a coordinator from `ports` and run it on a new task.
    pub fn spawn(
        ports: CoordinatorPorts,
        config: CoordinatorConfig,
        settings: NarrationSettings,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let engine: Arc<dyn SpeechEngine> = Arc::clone(&ports.engine);
        let engine_events = engine.subscribe();
        let (coordinator, timers) = PlaybackCoordinator::new(ports, config, settings);
        let (tx, inbox) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(coordinator, inbox, timers, engine_events));
        (CoordinatorHandle { tx }, task)
    }
}

async fn run(
    mut coordinator: PlaybackCoordinator,
    mut inbox: mpsc::UnboundedReceiver<CoordinatorCommand>,
    mut timers: mpsc::UnboundedReceiver<crate::transition::TransitionTimer>,
    mut engine_events: broadcast::Receiver<EngineEvent>,
) {
    tracing::debug!("Coordinator service started");
    let mut engine_open = true;

    loop {
        let deadline = coordinator.auto_stop_deadline();
        tokio::select! {
            command = inbox.recv() => {
                let Some(command) = command else {
                    break;
                };
                if !handle_command(&mut coordinator, command).await {
                    break;
                }
            }
            Some(timer) = timers.recv() => coordinator.on_timer(timer),
            event = engine_events.recv(), if engine_open => match event {
                Ok(event) => coordinator.handle_engine_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Coordinator lagged behind engine events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Speech engine event stream closed");
                    engine_open = false;
                }
            },
            () = sleep_until(deadline), if deadline.is_some() => {
                coordinator.on_auto_stop_deadline().await;
            }
        }
    }

    coordinator.shutdown().await;
    tracing::debug!("Coordinator service stopped");
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Returns `false` when the loop should end.
async fn handle_command(coordinator: &mut PlaybackCoordinator, command: CoordinatorCommand) -> bool {
    match command {
        CoordinatorCommand::LoadChapter(context) => coordinator.load_chapter(*context).await,
        CoordinatorCommand::SurfaceMessage(raw) => coordinator.handle_surface_message(&raw).await,
        CoordinatorCommand::MediaAction(action) => coordinator.handle_media_action(action).await,
        CoordinatorCommand::Respond { response, reply } => {
            let _ = reply.send(coordinator.respond(response).await);
        }
        CoordinatorCommand::Back { reply } => {
            let _ = reply.send(coordinator.handle_back().await);
        }
        CoordinatorCommand::RestartFrom { index, reply } => {
            let _ = reply.send(coordinator.restart_from_paragraph_index(index).await);
        }
        CoordinatorCommand::AppBackground => coordinator.on_app_background().await,
        CoordinatorCommand::WakeSyncFailed(target) => coordinator.report_wake_sync_failure(target),
        CoordinatorCommand::UpdateSettings(settings) => coordinator.update_settings(settings),
        CoordinatorCommand::Snapshot { reply } => {
            let _ = reply.send(coordinator.snapshot());
        }
        CoordinatorCommand::Shutdown => return false,
    }
    true
}
