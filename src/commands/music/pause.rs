use super::*;
use crate::commands::music::utils::embedded_messages;

/// Pause the current song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let guild_id = command_guild(&ctx)?;

    let reply = match ctx.data().controller.pause(guild_id).await {
        Ok(track) => embedded_messages::paused(&track),
        Err(err) => embedded_messages::error_reply(&err),
    };

    ctx.send(reply).await?;
    Ok(())
}
