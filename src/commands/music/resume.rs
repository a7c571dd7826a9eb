use super::*;
use crate::commands::music::utils::embedded_messages;

/// Resume the paused song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn resume(ctx: Context<'_>) -> CommandResult {
    let guild_id = command_guild(&ctx)?;

    let reply = match ctx.data().controller.resume(guild_id).await {
        Ok(track) => embedded_messages::resumed(&track),
        Err(err) => embedded_messages::error_reply(&err),
    };

    ctx.send(reply).await?;
    Ok(())
}
