use super::*;
use crate::commands::music::utils::{
    embedded_messages,
    music_manager::{MusicError, PlayOutcome, PlayRequest},
};
use poise::CreateReply;
use tracing::{error, info};

/// Search YouTube and play the top result, or queue it behind the current song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "What to search for"] song_query: String,
) -> CommandResult {
    let guild_id = command_guild(&ctx)?;
    info!(
        "Received play command in guild {} with query: {}",
        guild_id, song_query
    );

    let Some(voice_channel) = user_voice_channel(&ctx, guild_id) else {
        ctx.send(embedded_messages::error_reply(
            &MusicError::UserNotInVoiceChannel,
        ))
        .await?;
        return Ok(());
    };

    // Searching can take a few seconds
    ctx.defer().await?;

    let data = ctx.data();
    let ticket = data.controller.begin_play(guild_id);

    let track = match data.resolver.resolve(&song_query).await {
        Ok(track) => track.with_requester(ctx.author().name.clone()),
        Err(err) => {
            error!("Failed to resolve '{}': {}", song_query, err);
            ctx.send(embedded_messages::error_reply(&err)).await?;
            return Ok(());
        }
    };

    let request = PlayRequest {
        voice_channel,
        text_channel: Some(ctx.channel_id()),
        track,
    };

    let reply = match data.controller.play(ticket, request).await {
        Ok(PlayOutcome::Started(track)) => {
            CreateReply::default().embed(embedded_messages::now_playing(&track))
        }
        Ok(PlayOutcome::Queued { track, position }) => {
            CreateReply::default().embed(embedded_messages::added_to_queue(&track, position))
        }
        Ok(PlayOutcome::Cancelled(track)) => embedded_messages::play_cancelled(&track),
        Err(err) => {
            error!("Failed to play in guild {}: {}", guild_id, err);
            embedded_messages::error_reply(&err)
        }
    };

    ctx.send(reply).await?;
    Ok(())
}
