//! Progress inspection subcommands.

use clap::Subcommand;
use narrate_core::{ChapterId, NovelId};

#[derive(Subcommand)]
pub enum ProgressCommand {
    /// List chapters of a novel with their stored progress
    Show {
        /// Novel ID
        novel: NovelId,
    },
    /// Clear stored narration positions
    Clear {
        /// Only clear this chapter
        #[arg(long, conflicts_with = "all")]
        chapter: Option<ChapterId>,
        /// Clear every chapter position and session marker
        #[arg(long)]
        all: bool,
    },
}
