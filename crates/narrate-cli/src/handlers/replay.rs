//! Replay command handler.
//!
//! Runs a coordinator service against the console adapters and the
//! database, feeding it one script step at a time. After every step the
//! handler round-trips a snapshot through the service so the step has been
//! applied before the emitted events are drained and printed.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use narrate_core::{
    ChannelEmitter, Chapter, ChapterDirection, CoordinatorEvent, NarrationSettings, Novel,
    SystemClock, validate_settings,
};
use narrate_db::Repos;
use narrate_tts::{
    ChapterContext, CoordinatorConfig, CoordinatorHandle, CoordinatorPorts, CoordinatorService,
    CoordinatorSnapshot, MediaAction,
};
use tokio::sync::mpsc;

use crate::bootstrap::CliContext;
use crate::console::{ConsoleEngine, ConsoleHost, ConsoleSurface, LogNotifier};
use crate::error::CliError;
use crate::script::{ScriptLine, ScriptStep, parse_script};

/// Time given to the service to pick up engine signals before the next step.
const ENGINE_SETTLE: Duration = Duration::from_millis(10);
const SYNC_POLL: Duration = Duration::from_millis(25);
const SYNC_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a replay.
#[derive(Debug)]
pub struct ReplayReport {
    pub events: Vec<CoordinatorEvent>,
    pub snapshot: CoordinatorSnapshot,
}

/// Execute the replay command for a script on disk (`-` for stdin).
pub async fn execute(ctx: &CliContext, script: &std::path::Path, events_only: bool) -> Result<()> {
    let text = if script.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).map_err(CliError::from)?
    } else {
        std::fs::read_to_string(script)
            .map_err(CliError::from)
            .with_context(|| format!("reading {}", script.display()))?
    };
    let lines = parse_script(&text)?;
    let settings = ctx.settings().await?;

    let report = run(ctx.repos(), settings, &lines, !events_only).await?;
    print_snapshot(&report.snapshot);
    Ok(())
}

struct Session {
    handle: CoordinatorHandle,
    engine: Arc<ConsoleEngine>,
    surface: Arc<ConsoleSurface>,
    events: mpsc::UnboundedReceiver<CoordinatorEvent>,
    settings: NarrationSettings,
    nonce: Option<String>,
    seen: Vec<CoordinatorEvent>,
}

/// Replay `lines` and return every coordinator event in order.
pub async fn run(
    repos: &Repos,
    settings: NarrationSettings,
    lines: &[ScriptLine],
    echo: bool,
) -> Result<ReplayReport> {
    let engine = ConsoleEngine::new(echo);
    let surface = ConsoleSurface::new(echo);
    let (emitter, events) = ChannelEmitter::new();
    let ports = CoordinatorPorts {
        engine: engine.clone(),
        chapters: repos.chapters.clone(),
        store: repos.progress.clone(),
        surface: surface.clone(),
        notifier: Arc::new(LogNotifier),
        host: ConsoleHost::new(echo),
        clock: Arc::new(SystemClock),
        emitter: Arc::new(emitter),
    };
    let (handle, task) =
        CoordinatorService::spawn(ports, CoordinatorConfig::default(), settings.clone());

    let mut session = Session {
        handle,
        engine,
        surface,
        events,
        settings,
        nonce: None,
        seen: Vec::new(),
    };

    for line in lines {
        tracing::debug!(line = line.line, step = ?line.step, "Replaying step");
        apply(&mut session, repos, line)
            .await
            .with_context(|| format!("script line {}", line.line))?;
        session.handle.snapshot().await.map_err(CliError::from)?;
        drain(&mut session);
    }

    let snapshot = session.handle.snapshot().await.map_err(CliError::from)?;
    session.handle.shutdown().map_err(CliError::from)?;
    task.await.context("coordinator task panicked")?;
    drain(&mut session);

    Ok(ReplayReport {
        events: session.seen,
        snapshot,
    })
}

async fn apply(session: &mut Session, repos: &Repos, line: &ScriptLine) -> Result<()> {
    let handle = &session.handle;
    match &line.step {
        ScriptStep::Novel { id, name } => {
            repos
                .chapters
                .upsert_novel(&Novel {
                    id: *id,
                    name: name.clone(),
                })
                .await
                .map_err(CliError::from)?;
        }
        ScriptStep::Chapter(seed) => {
            repos
                .chapters
                .upsert_chapter(&Chapter::from(seed.clone()))
                .await
                .map_err(CliError::from)?;
        }
        ScriptStep::Load {
            chapter_id,
            paragraphs,
        } => {
            let context = chapter_context(repos, line.line, *chapter_id, paragraphs).await?;
            session.nonce = Some(context.nonce.clone());
            handle.load_chapter(context).map_err(CliError::from)?;
            wait_for_sync(handle).await?;
        }
        ScriptStep::Message { message } => {
            let serde_json::Value::Object(mut body) = message.clone() else {
                return Err(CliError::script(line.line, "message must be a JSON object").into());
            };
            if let Some(nonce) = &session.nonce {
                body.entry("nonce")
                    .or_insert_with(|| serde_json::Value::String(nonce.clone()));
            }
            let raw = serde_json::Value::Object(body).to_string();
            handle.surface_message(raw).map_err(CliError::from)?;
        }
        ScriptStep::Media { action } => {
            let action = MediaAction::from_str(action)
                .map_err(|e| CliError::script(line.line, e.to_string()))?;
            handle.media_action(action).map_err(CliError::from)?;
        }
        ScriptStep::Respond { response } => {
            if let Err(e) = handle.respond(*response).await {
                println!("respond {} refused: {e}", response.name());
            }
        }
        ScriptStep::Back => {
            let handled = handle.back().await.map_err(CliError::from)?;
            println!("back    {}", if handled { "handled" } else { "passed to host" });
        }
        ScriptStep::Restart { index } => match handle.restart_from(*index).await {
            Ok(start) => println!("restart at {start}"),
            Err(e) => println!("restart failed: {e}"),
        },
        ScriptStep::Engine { event } => {
            session.engine.emit(event.clone());
            tokio::time::sleep(ENGINE_SETTLE).await;
        }
        ScriptStep::Advance { count } => {
            for _ in 0..*count {
                let spoke = session.engine.advance();
                tokio::time::sleep(ENGINE_SETTLE).await;
                // Round-trip so refills land before the next utterance.
                handle.snapshot().await.map_err(CliError::from)?;
                if spoke.is_none() {
                    break;
                }
            }
        }
        ScriptStep::Visible { index } => session.surface.set_visible(*index),
        ScriptStep::Background => handle.app_background().map_err(CliError::from)?,
        ScriptStep::WakeSyncFailed { target } => {
            handle.wake_sync_failed(*target).map_err(CliError::from)?;
        }
        ScriptStep::Settings { update } => {
            let mut settings = session.settings.clone();
            settings.merge(update);
            validate_settings(&settings).map_err(CliError::from)?;
            handle
                .update_settings(settings.clone())
                .map_err(CliError::from)?;
            session.settings = settings;
        }
        ScriptStep::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        ScriptStep::Snapshot => {
            let snapshot = handle.snapshot().await.map_err(CliError::from)?;
            print_snapshot(&snapshot);
        }
    }
    Ok(())
}

async fn chapter_context(
    repos: &Repos,
    line: usize,
    chapter_id: narrate_core::ChapterId,
    paragraphs: &[String],
) -> Result<ChapterContext> {
    use narrate_core::ChapterRepository;

    let chapter = repos
        .chapters
        .get_chapter(chapter_id)
        .await
        .map_err(CliError::from)?
        .ok_or_else(|| CliError::script(line, format!("chapter {chapter_id} is not in the database")))?;
    let novel = repos
        .chapters
        .get_novel(chapter.novel_id)
        .await
        .map_err(CliError::from)?
        .unwrap_or_else(|| Novel {
            id: chapter.novel_id,
            name: format!("Novel {}", chapter.novel_id),
        });
    let prev_chapter = repos
        .chapters
        .adjacent_chapter(&chapter, ChapterDirection::Prev)
        .await
        .map_err(CliError::from)?;
    let next_chapter = repos
        .chapters
        .adjacent_chapter(&chapter, ChapterDirection::Next)
        .await
        .map_err(CliError::from)?;

    Ok(ChapterContext {
        novel,
        chapter,
        paragraphs: paragraphs.to_vec(),
        prev_chapter,
        next_chapter,
        nonce: uuid::Uuid::new_v4().to_string(),
    })
}

async fn wait_for_sync(handle: &CoordinatorHandle) -> Result<()> {
    let synced = tokio::time::timeout(SYNC_TIMEOUT, async {
        loop {
            if handle.snapshot().await?.surface_synced {
                return Ok::<_, narrate_tts::TtsError>(());
            }
            tokio::time::sleep(SYNC_POLL).await;
        }
    })
    .await;

    match synced {
        Ok(result) => result.map_err(|e| CliError::from(e).into()),
        Err(_) => {
            tracing::warn!("Surface did not sync within {SYNC_TIMEOUT:?}");
            Ok(())
        }
    }
}

fn drain(session: &mut Session) {
    while let Ok(event) = session.events.try_recv() {
        match serde_json::to_string(&event) {
            Ok(json) => println!("event   {json}"),
            Err(e) => tracing::warn!(error = %e, "Unprintable coordinator event"),
        }
        session.seen.push(event);
    }
}

fn print_snapshot(snapshot: &CoordinatorSnapshot) {
    let or_dash = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
    println!(
        "state   chapter={} state={:?} current={} latest={} workflow={} synced={}",
        or_dash(snapshot.chapter_id),
        snapshot.state,
        or_dash(snapshot.current_index),
        or_dash(snapshot.latest_index),
        snapshot
            .workflow
            .map_or_else(|| "-".to_string(), |w| format!("{w:?}")),
        snapshot.surface_synced
    );
}
