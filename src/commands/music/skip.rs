use super::*;
use crate::commands::music::utils::embedded_messages;

/// Skip the currently playing song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = command_guild(&ctx)?;

    let reply = match ctx.data().controller.skip(guild_id).await {
        Ok(track) => embedded_messages::skipped(&track),
        Err(err) => embedded_messages::error_reply(&err),
    };

    ctx.send(reply).await?;
    Ok(())
}
