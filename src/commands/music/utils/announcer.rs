use poise::serenity_prelude as serenity;
use serenity::all::CreateMessage;
use serenity::model::id::ChannelId;
use std::sync::Arc;
use tracing::{debug, warn};

use super::embedded_messages;
use crate::commands::music::audio_sources::Track;

/// Something the controller tells a text channel without a command to reply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// A queued track started after the previous one ended
    NowPlaying(Track),
    /// A track could not be played and was skipped
    TrackFailed { track: Track, reason: String },
    /// The voice connection dropped and the session ended
    ConnectionLost(String),
    /// The queue ran dry and the bot left the channel
    QueueFinished,
}

/// Delivery of announcements. Called with the guild lock held, so it must not block.
pub trait PlaybackNotifier: Send + Sync {
    fn announce(&self, channel_id: ChannelId, announcement: Announcement);
}

/// Posts announcements as embeds in the session's text channel.
pub struct ChannelAnnouncer {
    http: Arc<serenity::Http>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

impl PlaybackNotifier for ChannelAnnouncer {
    fn announce(&self, channel_id: ChannelId, announcement: Announcement) {
        let http = Arc::clone(&self.http);
        tokio::spawn(async move {
            debug!("Announcing in channel {}: {:?}", channel_id, announcement);
            let message = CreateMessage::new().embed(embedded_messages::announcement(&announcement));
            if let Err(e) = channel_id.send_message(http, message).await {
                warn!("Failed to announce in channel {}: {}", channel_id, e);
            }
        });
    }
}
