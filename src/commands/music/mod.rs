pub mod pause;
pub mod play;
pub mod queue;
pub mod resume;
pub mod skip;
pub mod stop;

pub mod audio_sources;
pub mod utils;

use crate::{CommandResult, Context};
use poise::serenity_prelude::{ChannelId, GuildId};
use utils::music_manager::MusicError;

/// Resolve the guild a command was invoked in.
fn command_guild(ctx: &Context<'_>) -> Result<GuildId, MusicError> {
    ctx.guild_id().ok_or(MusicError::NotInGuild)
}

/// Get the voice channel the invoking user is currently in, from the gateway cache.
fn user_voice_channel(ctx: &Context<'_>, guild_id: GuildId) -> Option<ChannelId> {
    let guild = ctx.serenity_context().cache.guild(guild_id)?;
    guild
        .voice_states
        .get(&ctx.author().id)
        .and_then(|voice_state| voice_state.channel_id)
}
