use super::*;
use crate::commands::music::utils::embedded_messages;
use poise::CreateReply;

/// View the current song and the music queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = command_guild(&ctx)?;
    let controller = &ctx.data().controller;

    let current = controller.now_playing(guild_id).await;
    let pending = controller.pending(guild_id);

    ctx.send(CreateReply::default().embed(embedded_messages::music_queue(
        current.as_ref(),
        &pending,
    )))
    .await?;
    Ok(())
}
