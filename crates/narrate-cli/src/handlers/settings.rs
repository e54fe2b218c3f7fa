//! Settings command handler.

use anyhow::Result;
use narrate_core::{NarrationSettings, SettingsRepository, SettingsUpdate, validate_settings};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::settings_commands::SettingsCommand;

pub async fn execute(ctx: &CliContext, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let settings = ctx.settings().await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsCommand::Set {
            voice,
            clear_voice,
            rate,
            pitch,
            forward_reset,
            forward_reset_scope,
            continue_mode,
            auto_stop,
        } => {
            let update = SettingsUpdate {
                voice: if clear_voice { Some(None) } else { voice.map(Some) },
                rate,
                pitch,
                forward_reset,
                forward_reset_scope,
                continue_to_next_chapter: continue_mode,
                auto_stop,
            };
            if update == SettingsUpdate::default() {
                return Err(CliError::Arguments("no settings given to change".to_string()).into());
            }
            let settings = apply_update(ctx, &update).await?;
            println!("✓ Settings updated.");
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsCommand::Reset => {
            ctx.repos()
                .settings
                .save(&NarrationSettings::with_defaults())
                .await
                .map_err(CliError::from)?;
            println!("✓ Settings reset to defaults.");
        }
    }
    Ok(())
}

/// Merge, validate, and persist a partial update.
pub async fn apply_update(ctx: &CliContext, update: &SettingsUpdate) -> Result<NarrationSettings> {
    let mut settings = ctx.settings().await?;
    settings.merge(update);
    validate_settings(&settings).map_err(CliError::from)?;
    ctx.repos()
        .settings
        .save(&settings)
        .await
        .map_err(CliError::from)?;
    tracing::debug!(?settings, "Saved narration settings");
    Ok(settings)
}
