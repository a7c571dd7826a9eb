//! A Discord music bot: slash commands resolve a search query to a single track, queue it per
//! guild and stream it into the caller's voice channel.

use std::sync::{Arc, LazyLock};

pub mod commands;
pub mod config;

use commands::music::{
    audio_sources::youtube::YoutubeResolver, utils::music_manager::PlaybackController,
};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// Shared HTTP client handed to songbird for streaming track URLs.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// User data, stored and accessible in all command invocations
pub struct Data {
    pub controller: Arc<PlaybackController>,
    pub resolver: YoutubeResolver,
}

/// Show the list of commands, or help for one command
#[poise::command(slash_command, category = "General")]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            extra_text_at_bottom: "Use /play to search for a song and start the queue",
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}
