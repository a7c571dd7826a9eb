use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::CreateEmbed;
use std::time::Duration;

use super::{
    announcer::Announcement,
    format_duration,
    music_manager::{MusicError, StopSummary},
};
use crate::commands::music::audio_sources::Track;

const SUCCESS: u32 = 0x00ff00;
const FAILURE: u32 = 0xff0000;

// Keycap emojis only exist for 1-10
const NUMBERED_ENTRIES: usize = 10;
// Discord caps embed descriptions; long queues are summarized
const MAX_LISTED: usize = 20;

fn duration_text(track: &Track) -> String {
    track
        .duration()
        .map(format_duration)
        .unwrap_or_else(|| "Unknown duration".to_string())
}

/// Shared layout for embeds describing a single track
fn track_embed(title: &str, track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(title)
        .description(track.display_link())
        .field("Duration", format!("`{}`", duration_text(track)), true)
        .color(SUCCESS);

    if let Some(requester) = track.requested_by() {
        embed = embed.field("Requested by", requester, true);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

fn error_embed(description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .title("❌ Error")
        .description(description)
        .color(FAILURE)
}

/// Create an embed for when a song is now playing
pub fn now_playing(track: &Track) -> CreateEmbed {
    track_embed("🎵 Now Playing", track)
}

/// Create an embed for when a song is added to the queue
pub fn added_to_queue(track: &Track, position: usize) -> CreateEmbed {
    track_embed("🎵 Added to Queue", track).field("Position", format!("`#{}`", position), true)
}

/// Create an embed listing the current track and everything queued behind it
pub fn music_queue(current: Option<&Track>, queue: &[Track]) -> CreateEmbed {
    let mut description = String::new();

    match current {
        Some(track) => {
            description.push_str("**🎵 Now Playing**\n");
            description.push_str(&format!(
                "{} `{}`\n\n",
                track.display_link(),
                duration_text(track)
            ));
        }
        None => description.push_str("**🔇 Nothing playing**\n\n"),
    }

    if queue.is_empty() {
        description.push_str("**📭 Queue is empty**");
    } else {
        description.push_str(&format!("**📋 Queue - {} tracks**\n", queue.len()));
        for (index, track) in queue.iter().take(MAX_LISTED).enumerate() {
            let number = if index < NUMBERED_ENTRIES {
                format!("{}\u{FE0F}\u{20E3}", index + 1)
            } else {
                "•".to_string()
            };
            description.push_str(&format!("{} {}", number, track.display_link()));
            if let Some(duration) = track.duration() {
                description.push_str(&format!(" `{}`", format_duration(duration)));
            }
            description.push('\n');
        }
        if queue.len() > MAX_LISTED {
            description.push_str(&format!("…and {} more\n", queue.len() - MAX_LISTED));
        }

        let total_duration: Duration = queue.iter().filter_map(Track::duration).sum();
        if total_duration.as_secs() > 0 {
            description.push_str(&format!(
                "\n**⏱️ Total Duration:** `{}`",
                format_duration(total_duration)
            ));
        }
    }

    CreateEmbed::new()
        .title("🎵 Music Queue")
        .description(description)
        .color(SUCCESS)
}

/// Create an embed for when a track is paused
pub fn paused(track: &Track) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏸️ Paused")
            .description(format!("Paused {}", track.display_link()))
            .color(SUCCESS),
    )
}

/// Create an embed for when a track is resumed
pub fn resumed(track: &Track) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("▶️ Resumed")
            .description(format!("Resumed {}", track.display_link()))
            .color(SUCCESS),
    )
}

/// Create an embed for when a track is skipped
pub fn skipped(track: &Track) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏭️ Skipped")
            .description(format!("Skipped {}", track.display_link()))
            .color(SUCCESS),
    )
}

/// Create an embed for when the bot stops playing music
pub fn stopped(summary: &StopSummary) -> CreateReply {
    let mut embed = CreateEmbed::new()
        .title("⏹️ Stopped")
        .description("Playback stopped and queue cleared")
        .color(SUCCESS);

    if let Some(track) = &summary.stopped {
        embed = embed.field("Stopped", track.display_link(), false);
    }
    if summary.cleared > 0 {
        embed = embed.field("Removed", format!("`{} tracks`", summary.cleared), true);
    }

    CreateReply::default().embed(embed)
}

/// Create an embed for when a `stop` landed while the track was still being looked up
pub fn play_cancelled(track: &Track) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏹️ Cancelled")
            .description(format!(
                "Playback was stopped before {} could be queued",
                track.display_link()
            ))
            .color(FAILURE),
    )
}

/// Create the reply for a failed music operation
///
/// Precondition failures are only shown to the invoking user. Provider failures are reported
/// generically; the details go to the logs.
pub fn error_reply(err: &MusicError) -> CreateReply {
    let description = match err {
        MusicError::Provider(_) => "Something went wrong while searching. Try again later".into(),
        other => other.to_string(),
    };

    CreateReply::default()
        .embed(error_embed(description))
        .ephemeral(err.is_precondition())
}

/// Create an embed for when a command fails outside the music operations
pub fn command_failed(message: impl Into<String>) -> CreateReply {
    CreateReply::default()
        .embed(error_embed(message))
        .ephemeral(true)
}

/// Create the embed posted to a session's text channel
pub fn announcement(announcement: &Announcement) -> CreateEmbed {
    match announcement {
        Announcement::NowPlaying(track) => now_playing(track),
        Announcement::TrackFailed { track, reason } => CreateEmbed::new()
            .title("⚠️ Skipped Track")
            .description(format!("Could not play {}", track.display_link()))
            .field("Reason", reason, false)
            .color(FAILURE),
        Announcement::ConnectionLost(reason) => CreateEmbed::new()
            .title("🔌 Disconnected")
            .description("Lost the voice connection and cleared the queue")
            .field("Reason", reason, false)
            .color(FAILURE),
        Announcement::QueueFinished => CreateEmbed::new()
            .title("✅ Queue Finished")
            .description("Nothing left to play, leaving the voice channel")
            .color(SUCCESS),
    }
}
