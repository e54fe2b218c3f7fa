//! Progress command handler.

use anyhow::Result;
use narrate_core::{ChapterId, ChapterRepository, NovelId, ProgressStore, keys};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::progress_commands::ProgressCommand;

const CHAPTER_PROGRESS_PREFIX: &str = "chapter_progress_";

/// Session markers cleared by `progress clear --all`.
const SESSION_MARKERS: [&str; 3] = [
    keys::LAST_TTS_CHAPTER_ID,
    keys::PENDING_TTS_RESUME_CHAPTER_ID,
    keys::TTS_BUTTON_POSITION,
];

pub async fn execute(ctx: &CliContext, command: ProgressCommand) -> Result<()> {
    match command {
        ProgressCommand::Show { novel } => show(ctx, novel).await,
        ProgressCommand::Clear {
            chapter: Some(chapter),
            ..
        } => clear_chapter(ctx, chapter).await,
        ProgressCommand::Clear { all: true, .. } => clear_all(ctx).await,
        ProgressCommand::Clear { .. } => {
            Err(CliError::Arguments("pass --chapter <ID> or --all".to_string()).into())
        }
    }
}

async fn show(ctx: &CliContext, novel_id: NovelId) -> Result<()> {
    let repos = ctx.repos();
    let chapters = repos
        .chapters
        .list_chapters(novel_id)
        .await
        .map_err(CliError::from)?;
    if chapters.is_empty() {
        println!("No chapters stored for novel {novel_id}.");
        return Ok(());
    }

    if let Some(novel) = repos.chapters.get_novel(novel_id).await.map_err(CliError::from)? {
        println!("{}", novel.name);
    }
    println!("{:>6}  {:>8}  {:>8}  {:>9}  {:<6}  name", "id", "position", "progress", "paragraph", "unread");
    for chapter in &chapters {
        let paragraph = repos
            .progress
            .get_number(&keys::chapter_progress(chapter.id))
            .await
            .map_err(CliError::from)?;
        println!(
            "{:>6}  {:>8}  {:>7}%  {:>9}  {:<6}  {}{}",
            chapter.id,
            chapter.position,
            chapter.progress.unwrap_or(0),
            paragraph.map_or_else(|| "-".to_string(), |p| p.to_string()),
            if chapter.unread { "yes" } else { "no" },
            chapter.display_name(),
            if chapter.tts_state.is_some() { "  [snapshot]" } else { "" },
        );
    }

    for key in [keys::LAST_TTS_CHAPTER_ID, keys::PENDING_TTS_RESUME_CHAPTER_ID] {
        if let Some(value) = repos.progress.get(key).await.map_err(CliError::from)? {
            println!("{key} = {value}");
        }
    }
    Ok(())
}

async fn clear_chapter(ctx: &CliContext, chapter_id: ChapterId) -> Result<()> {
    let repos = ctx.repos();
    repos
        .progress
        .delete(&keys::chapter_progress(chapter_id))
        .await
        .map_err(CliError::from)?;
    repos
        .chapters
        .save_tts_state(chapter_id, None)
        .await
        .map_err(CliError::from)?;
    println!("✓ Cleared narration position of chapter {chapter_id}.");
    Ok(())
}

async fn clear_all(ctx: &CliContext) -> Result<()> {
    let repos = ctx.repos();
    let entries = repos
        .progress
        .entries_with_prefix(CHAPTER_PROGRESS_PREFIX)
        .await
        .map_err(CliError::from)?;
    for (key, _) in &entries {
        repos.progress.delete(key).await.map_err(CliError::from)?;
    }
    for key in SESSION_MARKERS {
        repos.progress.delete(key).await.map_err(CliError::from)?;
    }
    tracing::info!(cleared = entries.len(), "Cleared stored chapter positions");
    println!("✓ Cleared {} chapter positions and session markers.", entries.len());
    Ok(())
}
