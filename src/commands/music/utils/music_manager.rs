use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::commands::music::audio_sources::Track;

use super::announcer::{Announcement, PlaybackNotifier};
use super::audio_sink::{AudioSink, VoiceConnection};
use super::event_handlers::{CompletionSignal, DisconnectSignal, PlaybackEvent, PlaybackEvents};
use super::queue_manager::GuildQueueStore;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("This command can only be used in a server")]
    NotInGuild,

    #[error("You must be in a voice channel")]
    UserNotInVoiceChannel,

    #[error("I am not connected to a voice channel")]
    NotConnected,

    #[error("Nothing is currently playing")]
    NothingPlaying,

    #[error("Nothing is paused")]
    NothingPaused,

    #[error("There is nothing to skip")]
    NothingToSkip,

    #[error("No results found")]
    NoResults(String),

    #[error("Search provider failed: {0}")]
    Provider(String),

    #[error("Track failed to play: {0}")]
    TrackPlayback(String),

    #[error("Voice connection failed: {0}")]
    VoiceConnection(String),
}

impl MusicError {
    /// A command was issued in a state that does not allow it; nothing was changed.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotInGuild
                | Self::UserNotInVoiceChannel
                | Self::NotConnected
                | Self::NothingPlaying
                | Self::NothingPaused
                | Self::NothingToSkip
        )
    }
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// What a guild's player is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// No track is streaming
    #[default]
    Idle,
    /// A track is streaming
    Playing,
    /// A track is loaded but held
    Paused,
}

/// A guild's active audio session. Exists from the first started track until the queue drains,
/// `stop` is issued, or the voice connection is lost.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    id: u64,
    guild_id: GuildId,
    connection: VoiceConnection,
    text_channel: Option<ChannelId>,
    current: Option<Track>,
    state: PlayerState,
    // Token of the track currently streaming
    token: u64,
}

impl PlaybackSession {
    fn new(id: u64, connection: VoiceConnection, text_channel: Option<ChannelId>) -> Self {
        Self {
            id,
            guild_id: connection.guild_id,
            connection,
            text_channel,
            current: None,
            state: PlayerState::Idle,
            token: 0,
        }
    }

    fn announce_to(&self) -> Option<ChannelId> {
        self.text_channel
    }
}

/// A resolved track and where the requester wants it played.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub voice_channel: ChannelId,
    /// Text channel for announcements while the session lasts
    pub text_channel: Option<ChannelId>,
    pub track: Track,
}

/// How a `play` request was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Nothing was playing; the track is now streaming.
    Started(Track),
    /// Something was playing; the track waits at `position` in the queue.
    Queued { track: Track, position: usize },
    /// A `stop` was issued while the track was being resolved.
    Cancelled(Track),
}

/// Taken before resolving a `play` request. Invalidated by any `stop` in the same guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayTicket {
    guild_id: GuildId,
    epoch: u64,
}

impl PlayTicket {
    /// The guild the ticket was taken for
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }
}

/// What a `stop` tore down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSummary {
    /// Number of pending tracks dropped
    pub cleared: usize,
    /// The track that was streaming, if any
    pub stopped: Option<Track>,
}

type SessionSlot = Arc<Mutex<Option<PlaybackSession>>>;

/// The Playback Controller: drives each guild's queue through the audio sink.
///
/// Every operation on a guild runs under that guild's session lock, so queue mutation and state
/// transitions are serialized per guild while different guilds never contend.
pub struct PlaybackController {
    queues: GuildQueueStore,
    sessions: DashMap<GuildId, SessionSlot>,
    epochs: DashMap<GuildId, u64>,
    sink: Arc<dyn AudioSink>,
    notifier: Arc<dyn PlaybackNotifier>,
    events: UnboundedSender<PlaybackEvent>,
    // Shared by session ids and track tokens
    next_id: AtomicU64,
}

impl PlaybackController {
    /// Create the controller together with the event stream its scheduler must run.
    pub fn new(
        sink: Arc<dyn AudioSink>,
        notifier: Arc<dyn PlaybackNotifier>,
    ) -> (Arc<Self>, PlaybackEvents) {
        let (events, receiver) = PlaybackEvents::channel();
        let controller = Self {
            queues: GuildQueueStore::new(),
            sessions: DashMap::new(),
            epochs: DashMap::new(),
            sink,
            notifier,
            events,
            next_id: AtomicU64::new(1),
        };
        (Arc::new(controller), receiver)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn slot(&self, guild_id: GuildId) -> SessionSlot {
        Arc::clone(&self.sessions.entry(guild_id).or_default())
    }

    fn existing_slot(&self, guild_id: GuildId) -> Option<SessionSlot> {
        self.sessions.get(&guild_id).map(|slot| Arc::clone(&slot))
    }

    fn epoch(&self, guild_id: GuildId) -> u64 {
        self.epochs.get(&guild_id).map(|epoch| *epoch).unwrap_or(0)
    }

    fn announce(&self, channel: Option<ChannelId>, announcement: Announcement) {
        if let Some(channel_id) = channel {
            self.notifier.announce(channel_id, announcement);
        }
    }

    /// Mark the start of a `play` request, before its query is resolved.
    pub fn begin_play(&self, guild_id: GuildId) -> PlayTicket {
        PlayTicket {
            guild_id,
            epoch: self.epoch(guild_id),
        }
    }

    /// Play a resolved track, or queue it behind the one already streaming.
    ///
    /// Joins the requester's voice channel when the guild has no session and moves there when
    /// the session is in another channel.
    pub async fn play(&self, ticket: PlayTicket, request: PlayRequest) -> MusicResult<PlayOutcome> {
        let guild_id = ticket.guild_id;
        let slot = self.slot(guild_id);
        let mut session = slot.lock().await;

        let PlayRequest {
            voice_channel,
            text_channel,
            track,
        } = request;

        if self.epoch(guild_id) != ticket.epoch {
            info!(
                "Discarding '{}' for guild {}: playback was stopped while resolving",
                track.title(),
                guild_id
            );
            return Ok(PlayOutcome::Cancelled(track));
        }

        match session
            .as_ref()
            .map(|active| (active.id, active.connection.channel_id))
        {
            Some((_, channel_id)) if channel_id == voice_channel => {}
            Some((id, _)) => {
                info!(
                    "Moving to voice channel {} in guild {}",
                    voice_channel, guild_id
                );
                let on_lost = DisconnectSignal::new(self.events.clone(), guild_id, id);
                match self.sink.connect(guild_id, voice_channel, on_lost).await {
                    Ok(connection) => {
                        if let Some(active) = session.as_mut() {
                            active.connection = connection;
                        }
                    }
                    Err(e) => {
                        error!("Failed to move in guild {}: {}", guild_id, e);
                        self.teardown(&mut session).await;
                        return Err(e);
                    }
                }
            }
            None => {
                let id = self.next_id();
                let on_lost = DisconnectSignal::new(self.events.clone(), guild_id, id);
                let connection = match self.sink.connect(guild_id, voice_channel, on_lost).await {
                    Ok(connection) => connection,
                    Err(e) => {
                        error!("Failed to connect in guild {}: {}", guild_id, e);
                        self.queues.clear(guild_id);
                        return Err(e);
                    }
                };
                debug!("Session {} opened in guild {}", id, guild_id);
                *session = Some(PlaybackSession::new(id, connection, text_channel));
            }
        }

        if session.as_ref().is_some_and(|active| active.current.is_some()) {
            let position = self.queues.enqueue(guild_id, track.clone());
            info!(
                "Queued '{}' at position {} in guild {}",
                track.title(),
                position,
                guild_id
            );
            return Ok(PlayOutcome::Queued { track, position });
        }

        self.queues.enqueue(guild_id, track.clone());
        match self.start_next(guild_id, &mut session, false).await? {
            Some(started) => Ok(PlayOutcome::Started(started)),
            None => Err(MusicError::TrackPlayback(format!(
                "Could not start '{}'",
                track.title()
            ))),
        }
    }

    /// Pop tracks until one starts streaming. Tracks that fail to start are skipped; a drained
    /// queue or a voice failure ends the session.
    ///
    /// Returns the started track, or `None` when the session ended because nothing was left.
    async fn start_next(
        &self,
        guild_id: GuildId,
        session: &mut Option<PlaybackSession>,
        announce: bool,
    ) -> MusicResult<Option<Track>> {
        loop {
            let Some(active) = session.as_mut() else {
                return Ok(None);
            };

            let Some(track) = self.queues.dequeue_front(guild_id) else {
                info!("Queue finished for guild {}", guild_id);
                let channel = active.announce_to();
                self.teardown(session).await;
                if announce {
                    self.announce(channel, Announcement::QueueFinished);
                }
                return Ok(None);
            };

            let token = self.next_id();
            let on_complete = CompletionSignal::new(self.events.clone(), guild_id, token);
            let connection = active.connection;

            match self
                .sink
                .play(&connection, track.stream_url(), on_complete)
                .await
            {
                Ok(()) => {
                    info!("Now playing '{}' in guild {}", track.title(), guild_id);
                    active.current = Some(track.clone());
                    active.state = PlayerState::Playing;
                    active.token = token;
                    if announce {
                        self.announce(active.announce_to(), Announcement::NowPlaying(track.clone()));
                    }
                    return Ok(Some(track));
                }
                Err(MusicError::VoiceConnection(reason)) => {
                    error!("Voice connection failed in guild {}: {}", guild_id, reason);
                    let channel = active.announce_to();
                    self.teardown(session).await;
                    if announce {
                        self.announce(channel, Announcement::ConnectionLost(reason.clone()));
                    }
                    return Err(MusicError::VoiceConnection(reason));
                }
                Err(e) => {
                    warn!(
                        "Skipping '{}' in guild {}: {}",
                        track.title(),
                        guild_id,
                        e
                    );
                    active.current = None;
                    active.state = PlayerState::Idle;
                    if announce {
                        let reason = e.to_string();
                        self.announce(
                            active.announce_to(),
                            Announcement::TrackFailed { track, reason },
                        );
                    }
                }
            }
        }
    }

    /// End the session: drop pending tracks, halt the stream and leave the voice channel.
    /// Returns how many pending tracks were dropped.
    async fn teardown(&self, session: &mut Option<PlaybackSession>) -> usize {
        let Some(ended) = session.take() else {
            return 0;
        };
        let guild_id = ended.guild_id;

        let cleared = self.queues.clear(guild_id);
        if let Err(e) = self.sink.stop(&ended.connection).await {
            debug!("Stop during teardown failed in guild {}: {}", guild_id, e);
        }
        if let Err(e) = self.sink.disconnect(&ended.connection).await {
            warn!("Disconnect failed in guild {}: {}", guild_id, e);
        }

        info!(
            "Session {} closed in guild {} ({} pending tracks dropped)",
            ended.id, guild_id, cleared
        );
        cleared
    }

    /// Pass a sink result through, ending the session first if the voice connection broke.
    async fn checked(
        &self,
        session: &mut Option<PlaybackSession>,
        result: MusicResult<()>,
    ) -> MusicResult<()> {
        if let Err(MusicError::VoiceConnection(reason)) = &result {
            error!("Voice connection failed: {}", reason);
            self.teardown(session).await;
        }
        result
    }

    /// Apply an event from the audio side. Events for tracks or sessions that are no longer
    /// current are ignored.
    pub async fn handle_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::TrackEnded {
                guild_id,
                token,
                error,
            } => self.on_track_end(guild_id, token, error).await,
            PlaybackEvent::ConnectionLost {
                guild_id,
                session,
                reason,
            } => self.on_connection_lost(guild_id, session, reason).await,
        }
    }

    async fn on_track_end(&self, guild_id: GuildId, token: u64, error: Option<String>) {
        let Some(slot) = self.existing_slot(guild_id) else {
            return;
        };
        let mut session = slot.lock().await;

        let Some(active) = session
            .as_mut()
            .filter(|active| active.token == token && active.current.is_some())
        else {
            debug!("Ignoring stale track end {} in guild {}", token, guild_id);
            return;
        };

        let finished = active.current.take();
        active.state = PlayerState::Idle;

        match (error, finished) {
            (Some(reason), Some(track)) => {
                warn!(
                    "Track '{}' failed in guild {}: {}",
                    track.title(),
                    guild_id,
                    reason
                );
                self.announce(
                    active.announce_to(),
                    Announcement::TrackFailed { track, reason },
                );
            }
            (None, Some(track)) => debug!("Finished '{}' in guild {}", track.title(), guild_id),
            _ => {}
        }

        if let Err(e) = self.start_next(guild_id, &mut session, true).await {
            error!("Could not advance queue in guild {}: {}", guild_id, e);
        }
    }

    async fn on_connection_lost(&self, guild_id: GuildId, session_id: u64, reason: String) {
        let Some(slot) = self.existing_slot(guild_id) else {
            return;
        };
        let mut session = slot.lock().await;

        let Some(channel) = session
            .as_ref()
            .filter(|active| active.id == session_id)
            .map(|active| active.announce_to())
        else {
            debug!(
                "Ignoring disconnect of old session {} in guild {}",
                session_id, guild_id
            );
            return;
        };

        warn!("Lost voice connection in guild {}: {}", guild_id, reason);
        self.teardown(&mut session).await;
        self.announce(channel, Announcement::ConnectionLost(reason));
    }

    /// Force the current track to end. The queue advances when its completion arrives.
    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<Track> {
        let slot = self.slot(guild_id);
        let mut session = slot.lock().await;

        let (connection, current) = session
            .as_ref()
            .and_then(|active| Some((active.connection, active.current.clone()?)))
            .ok_or(MusicError::NothingToSkip)?;

        info!("Skipping '{}' in guild {}", current.title(), guild_id);
        let result = self.sink.stop(&connection).await;
        self.checked(&mut session, result).await?;
        Ok(current)
    }

    /// Hold the current track in place. Only valid while a track is playing.
    pub async fn pause(&self, guild_id: GuildId) -> MusicResult<Track> {
        let slot = self.slot(guild_id);
        let mut session = slot.lock().await;

        let active = session.as_ref().ok_or(MusicError::NotConnected)?;
        if active.state != PlayerState::Playing {
            return Err(MusicError::NothingPlaying);
        }
        let current = active.current.clone().ok_or(MusicError::NothingPlaying)?;
        let connection = active.connection;

        let result = self.sink.pause(&connection).await;
        self.checked(&mut session, result).await?;
        if let Some(active) = session.as_mut() {
            active.state = PlayerState::Paused;
        }
        info!("Paused '{}' in guild {}", current.title(), guild_id);
        Ok(current)
    }

    /// Continue a paused track from where it was held.
    pub async fn resume(&self, guild_id: GuildId) -> MusicResult<Track> {
        let slot = self.slot(guild_id);
        let mut session = slot.lock().await;

        let active = session.as_ref().ok_or(MusicError::NotConnected)?;
        if active.state != PlayerState::Paused {
            return Err(MusicError::NothingPaused);
        }
        let current = active.current.clone().ok_or(MusicError::NothingPaused)?;
        let connection = active.connection;

        let result = self.sink.resume(&connection).await;
        self.checked(&mut session, result).await?;
        if let Some(active) = session.as_mut() {
            active.state = PlayerState::Playing;
        }
        info!("Resumed '{}' in guild {}", current.title(), guild_id);
        Ok(current)
    }

    /// Clear the queue, halt the stream and leave the voice channel.
    ///
    /// Always invalidates outstanding [`PlayTicket`]s for the guild, even when there is nothing
    /// to stop.
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<StopSummary> {
        let slot = self.slot(guild_id);
        let mut session = slot.lock().await;

        *self.epochs.entry(guild_id).or_insert(0) += 1;

        let Some(active) = session.as_ref() else {
            return Err(MusicError::NotConnected);
        };
        let stopped = active.current.clone();
        let cleared = self.teardown(&mut session).await;

        info!("Stopped playback in guild {}", guild_id);
        Ok(StopSummary { cleared, stopped })
    }

    /// The guild's player state; `Idle` when no session is open.
    pub async fn state(&self, guild_id: GuildId) -> PlayerState {
        match self.existing_slot(guild_id) {
            Some(slot) => slot
                .lock()
                .await
                .as_ref()
                .map(|active| active.state)
                .unwrap_or_default(),
            None => PlayerState::Idle,
        }
    }

    /// The track streaming or paused in the guild, if any.
    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        let slot = self.existing_slot(guild_id)?;
        let session = slot.lock().await;
        session.as_ref()?.current.clone()
    }

    /// The voice connection of the guild's session, if one is open.
    pub async fn connection(&self, guild_id: GuildId) -> Option<VoiceConnection> {
        let slot = self.existing_slot(guild_id)?;
        let session = slot.lock().await;
        session.as_ref().map(|active| active.connection)
    }

    /// Tracks waiting behind the current one, front first.
    pub fn pending(&self, guild_id: GuildId) -> Vec<Track> {
        self.queues.pending(guild_id)
    }
}
