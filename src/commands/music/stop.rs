use super::*;
use crate::commands::music::utils::embedded_messages;

/// Stop the music, clear the queue, and leave the voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = command_guild(&ctx)?;

    // Also cancels any /play still searching in this guild
    let reply = match ctx.data().controller.stop(guild_id).await {
        Ok(summary) => embedded_messages::stopped(&summary),
        Err(err) => embedded_messages::error_reply(&err),
    };

    ctx.send(reply).await?;
    Ok(())
}
