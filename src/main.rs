use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use jukebox::commands::music::{
    audio_sources::youtube::{YoutubeResolver, YtDlp},
    pause::*,
    play::*,
    queue::*,
    resume::*,
    skip::*,
    stop::*,
    utils::{
        announcer::ChannelAnnouncer, audio_sink::SongbirdSink, embedded_messages,
        music_manager::{MusicError, PlaybackController},
    },
};
use jukebox::config::BotConfig;
use jukebox::{Data, Error, HTTP_CLIENT, help};

/// Log anything that escaped a command and tell the user something went wrong
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to set up the bot: {}", error)
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            let reply = embedded_messages::error_reply(&MusicError::NotInGuild);
            if let Err(e) = ctx.send(reply).await {
                warn!("Failed to report guild-only command: {}", e);
            }
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().name, error);
            let reply = embedded_messages::command_failed("Something went wrong running that command");
            if let Err(e) = ctx.send(reply).await {
                warn!("Failed to report command error: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jukebox=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = BotConfig::from_env()?;
    info!("Starting with {}", config.summary());

    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let voice = Songbird::serenity_from_config(config.sink.driver_config());

    let commands = vec![
        help(),
        play(),
        skip(),
        pause(),
        resume(),
        stop(),
        queue(),
    ];

    let setup_voice = Arc::clone(&voice);
    let setup_config = config.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                match setup_config.dev_guild {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(ctx, commands, guild_id).await?
                    }
                    None => poise::builtins::register_globally(ctx, commands).await?,
                }
                info!("Logged in as {}", ready.user.name);

                let sink = SongbirdSink::new(setup_voice, HTTP_CLIENT.clone(), setup_config.sink);
                let announcer = ChannelAnnouncer::new(Arc::clone(&ctx.http));
                let (controller, events) =
                    PlaybackController::new(Arc::new(sink), Arc::new(announcer));
                tokio::spawn(events.run(Arc::clone(&controller)));

                let resolver = YoutubeResolver::new(Arc::new(YtDlp::new(setup_config.ytdlp_path)));

                Ok(Data {
                    controller,
                    resolver,
                })
            })
        });

    let mut client = ClientBuilder::new(&config.token, intents)
        .framework(framework.build())
        .register_songbird_with(voice)
        .await?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutting down");
        shard_manager.shutdown_all().await;
    });

    client.start().await.map_err(Into::into)
}
