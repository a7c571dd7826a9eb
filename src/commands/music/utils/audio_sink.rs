//! The audio side of playback: joining voice channels and streaming track URLs into them.

use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::driver::Bitrate;
use songbird::driver::retry::{ExponentialBackoff, Retry, Strategy};
use songbird::input::HttpRequest;
use songbird::tracks::TrackHandle;
use songbird::{Config, CoreEvent, Event, Songbird, TrackEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::event_handlers::{
    CompletionSignal, DisconnectSignal, DriverDisconnectNotifier, TrackEndNotifier,
};
use super::music_manager::{MusicError, MusicResult};

/// Handle to an established voice connection. The call itself stays owned by the voice manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceConnection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Where decoded audio goes.
///
/// Connection-level failures must be reported as [`MusicError::VoiceConnection`]; a stream that
/// cannot start is [`MusicError::TrackPlayback`].
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Join (or move to) `channel_id`. `on_lost` fires if the connection later drops for good.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        on_lost: DisconnectSignal,
    ) -> MusicResult<VoiceConnection>;

    /// Start streaming `stream_url`, replacing anything already playing. `on_complete` fires
    /// once the stream ends or errors.
    async fn play(
        &self,
        connection: &VoiceConnection,
        stream_url: &str,
        on_complete: CompletionSignal,
    ) -> MusicResult<()>;

    /// Pause the current stream. [`MusicError::NothingPlaying`] when no stream is loaded.
    async fn pause(&self, connection: &VoiceConnection) -> MusicResult<()>;

    /// Resume the current stream. [`MusicError::NothingPaused`] when no stream is loaded.
    async fn resume(&self, connection: &VoiceConnection) -> MusicResult<()>;

    /// Halt the current stream. Its completion signal still fires.
    async fn stop(&self, connection: &VoiceConnection) -> MusicResult<()>;

    async fn disconnect(&self, connection: &VoiceConnection) -> MusicResult<()>;
}

/// Voice driver tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Opus encoder bitrate in bits per second
    pub bitrate: i32,
    pub reconnect_attempts: usize,
    pub reconnect_delay_max: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            bitrate: 96_000,
            reconnect_attempts: 5,
            reconnect_delay_max: Duration::from_secs(5),
        }
    }
}

impl SinkConfig {
    /// Songbird configuration with exponential-backoff driver reconnects.
    pub fn driver_config(&self) -> Config {
        Config::default().driver_retry(Retry {
            strategy: Strategy::Backoff(ExponentialBackoff {
                min: Duration::from_millis(250),
                max: self.reconnect_delay_max,
                jitter: 0.1,
            }),
            retry_limit: Some(self.reconnect_attempts),
        })
    }
}

/// `AudioSink` backed by songbird.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    config: SinkConfig,
    tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client, config: SinkConfig) -> Self {
        Self {
            manager,
            http,
            config,
            tracks: DashMap::new(),
        }
    }

    /// The handle of the guild's current stream. `missing` is returned when the stream was
    /// already stopped and its end event has not been applied yet.
    fn track(&self, connection: &VoiceConnection, missing: MusicError) -> MusicResult<TrackHandle> {
        self.tracks
            .get(&connection.guild_id)
            .map(|handle| handle.clone())
            .ok_or(missing)
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        on_lost: DisconnectSignal,
    ) -> MusicResult<VoiceConnection> {
        info!("Joining voice channel {} in guild {}", channel_id, guild_id);

        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::VoiceConnection(format!("Failed to join: {}", e)))?;

        let mut handler = call.lock().await;
        // A move re-enters here; only the newest session may report loss
        handler.remove_all_global_events();
        handler.add_global_event(
            Event::Core(CoreEvent::DriverDisconnect),
            DriverDisconnectNotifier { signal: on_lost },
        );
        handler.set_bitrate(Bitrate::BitsPerSecond(self.config.bitrate));

        Ok(VoiceConnection {
            guild_id,
            channel_id,
        })
    }

    async fn play(
        &self,
        connection: &VoiceConnection,
        stream_url: &str,
        on_complete: CompletionSignal,
    ) -> MusicResult<()> {
        let call = self
            .manager
            .get(connection.guild_id)
            .ok_or_else(|| MusicError::VoiceConnection("Voice call is gone".to_string()))?;

        let input = HttpRequest::new(self.http.clone(), stream_url.to_string());
        let handle = call.lock().await.play_only_input(input.into());

        // Both events may fire for one failure; the controller ignores the repeat
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        signal: on_complete.clone(),
                    },
                )
                .map_err(|e| MusicError::TrackPlayback(e.to_string()))?;
        }

        debug!(
            "Streaming track {} in guild {}",
            on_complete.token(),
            connection.guild_id
        );
        self.tracks.insert(connection.guild_id, handle);
        Ok(())
    }

    async fn pause(&self, connection: &VoiceConnection) -> MusicResult<()> {
        self.track(connection, MusicError::NothingPlaying)?
            .pause()
            .map_err(|e| MusicError::TrackPlayback(e.to_string()))
    }

    async fn resume(&self, connection: &VoiceConnection) -> MusicResult<()> {
        self.track(connection, MusicError::NothingPaused)?
            .play()
            .map_err(|e| MusicError::TrackPlayback(e.to_string()))
    }

    async fn stop(&self, connection: &VoiceConnection) -> MusicResult<()> {
        if let Some((_, handle)) = self.tracks.remove(&connection.guild_id) {
            if let Err(e) = handle.stop() {
                // The track already finished on its own
                debug!("Track in guild {} was already stopped: {}", connection.guild_id, e);
            }
        }
        Ok(())
    }

    async fn disconnect(&self, connection: &VoiceConnection) -> MusicResult<()> {
        self.tracks.remove(&connection.guild_id);

        if self.manager.get(connection.guild_id).is_none() {
            return Ok(());
        }

        info!("Leaving voice channel in guild {}", connection.guild_id);
        if let Err(e) = self.manager.remove(connection.guild_id).await {
            warn!(
                "Failed to leave voice channel in guild {}: {}",
                connection.guild_id, e
            );
            return Err(MusicError::VoiceConnection(e.to_string()));
        }
        Ok(())
    }
}
