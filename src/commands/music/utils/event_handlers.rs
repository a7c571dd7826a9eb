//! Hand-off of audio driver callbacks onto the playback scheduler.
//!
//! Songbird raises track and driver events on its own tasks. The handlers here never touch guild
//! state; they only post a [`PlaybackEvent`] to the scheduler. The scheduler gives every guild its
//! own lane, so one guild waiting on slow voice I/O never holds up events for another.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::tracks::PlayMode;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::music_manager::PlaybackController;

/// A message from the audio side to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The track started under `token` finished, naturally or with an error.
    TrackEnded {
        guild_id: GuildId,
        token: u64,
        error: Option<String>,
    },
    /// The voice connection of session `session` dropped and could not be recovered.
    ConnectionLost {
        guild_id: GuildId,
        session: u64,
        reason: String,
    },
}

impl PlaybackEvent {
    /// Guild the event belongs to; selects the lane it runs on.
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::TrackEnded { guild_id, .. } | Self::ConnectionLost { guild_id, .. } => *guild_id,
        }
    }
}

/// Completion callback for one started track.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    events: UnboundedSender<PlaybackEvent>,
    guild_id: GuildId,
    token: u64,
}

impl CompletionSignal {
    pub(crate) fn new(events: UnboundedSender<PlaybackEvent>, guild_id: GuildId, token: u64) -> Self {
        Self {
            events,
            guild_id,
            token,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Token the controller assigned to the track when it started.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Report that the track ended. May be called more than once; repeats are discarded by the
    /// controller.
    pub fn notify(&self, error: Option<String>) {
        let event = PlaybackEvent::TrackEnded {
            guild_id: self.guild_id,
            token: self.token,
            error,
        };
        if self.events.send(event).is_err() {
            debug!(
                "Scheduler closed, dropping track end for guild {}",
                self.guild_id
            );
        }
    }
}

/// Connection-loss callback for one playback session.
#[derive(Debug, Clone)]
pub struct DisconnectSignal {
    events: UnboundedSender<PlaybackEvent>,
    guild_id: GuildId,
    session: u64,
}

impl DisconnectSignal {
    pub(crate) fn new(events: UnboundedSender<PlaybackEvent>, guild_id: GuildId, session: u64) -> Self {
        Self {
            events,
            guild_id,
            session,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Id of the playback session the connection belongs to.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Report that the connection is gone for good.
    pub fn notify(&self, reason: impl Into<String>) {
        let event = PlaybackEvent::ConnectionLost {
            guild_id: self.guild_id,
            session: self.session,
            reason: reason.into(),
        };
        if self.events.send(event).is_err() {
            debug!(
                "Scheduler closed, dropping disconnect for guild {}",
                self.guild_id
            );
        }
    }
}

/// Receiving end of the playback event channel: the scheduler.
pub struct PlaybackEvents {
    receiver: UnboundedReceiver<PlaybackEvent>,
}

impl PlaybackEvents {
    pub(crate) fn channel() -> (UnboundedSender<PlaybackEvent>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }

    /// Route events to per-guild lanes until every sender is gone.
    ///
    /// Events of one guild are applied one at a time, in arrival order. Lanes of different guilds
    /// run concurrently.
    pub async fn run(mut self, controller: Arc<PlaybackController>) {
        info!("Playback scheduler started");
        let mut lanes: HashMap<GuildId, UnboundedSender<PlaybackEvent>> = HashMap::new();

        while let Some(event) = self.receiver.recv().await {
            let guild_id = event.guild_id();
            let lane = lanes
                .entry(guild_id)
                .or_insert_with(|| spawn_lane(guild_id, Arc::clone(&controller)));

            if let Err(mpsc::error::SendError(event)) = lane.send(event) {
                warn!("Event lane for guild {} died, restarting it", guild_id);
                let lane = spawn_lane(guild_id, Arc::clone(&controller));
                if lane.send(event).is_err() {
                    warn!("Dropping event for guild {}", guild_id);
                }
                lanes.insert(guild_id, lane);
            }
        }

        info!("Playback scheduler stopped");
    }

    /// Take the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<PlaybackEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Start the task that applies one guild's events in order.
fn spawn_lane(
    guild_id: GuildId,
    controller: Arc<PlaybackController>,
) -> UnboundedSender<PlaybackEvent> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<PlaybackEvent>();
    tokio::spawn(async move {
        debug!("Event lane opened for guild {}", guild_id);
        while let Some(event) = receiver.recv().await {
            controller.handle_event(event).await;
        }
    });
    sender
}

/// Songbird handler for when a track ends or errors
pub struct TrackEndNotifier {
    pub signal: CompletionSignal,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            let error = tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(err) => Some(err.to_string()),
                _ => None,
            });
            self.signal.notify(error);
        }
        None
    }
}

/// Songbird handler for when the voice driver gives up on a connection
pub struct DriverDisconnectNotifier {
    pub signal: DisconnectSignal,
}

#[async_trait]
impl VoiceEventHandler for DriverDisconnectNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            // No reason means we asked for the disconnect ourselves
            if let Some(reason) = &data.reason {
                self.signal.notify(format!("{:?}", reason));
            }
        }
        None
    }
}
