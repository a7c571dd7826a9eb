use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rstest::rstest;

use jukebox::commands::music::utils::announcer::Announcement;
use jukebox::commands::music::utils::music_manager::{MusicError, PlayOutcome, PlayerState};

use crate::common::fixtures::{GUILD, VOICE, stream_url, track};
use crate::common::{Harness, harness};

#[rstest]
#[tokio::test]
async fn test_error_completion_advances_like_success(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();

    harness.sink.finish(GUILD, Some("decoder error"));
    harness.pump().await;

    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
    assert_eq!(
        harness.notifier.announcements(),
        vec![
            Announcement::TrackFailed {
                track: track("a"),
                reason: "decoder error".to_string()
            },
            Announcement::NowPlaying(track("b")),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn test_error_completion_on_last_track_drains(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();

    harness.sink.finish(GUILD, Some("stream closed"));
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(harness.sink.channel(GUILD), None);
}

#[rstest]
#[tokio::test]
async fn test_broken_stream_is_skipped(mut harness: Harness) {
    harness.sink.break_url(&stream_url("b"));
    for title in ["a", "b", "c"] {
        harness.play(GUILD, VOICE, title).await.unwrap();
    }

    harness.sink.finish(GUILD, None);
    harness.pump().await;

    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("c"));
    assert!(harness.pending_titles(GUILD).is_empty());
    assert_eq!(harness.sink.played(), vec![stream_url("a"), stream_url("c")]);
    assert_matches!(
        harness.notifier.announcements().first(),
        Some(Announcement::TrackFailed { track, .. }) if track.title() == "b"
    );
}

#[rstest]
#[tokio::test]
async fn test_broken_first_stream_is_reported(harness: Harness) {
    harness.sink.break_url(&stream_url("a"));

    let outcome = harness.play(GUILD, VOICE, "a").await;

    assert_matches!(outcome, Err(MusicError::TrackPlayback(_)));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(harness.sink.channel(GUILD), None);
    // Reported through the command reply only
    assert!(harness.notifier.announcements().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_connect_failure_is_reported(harness: Harness) {
    harness.sink.refuse_connections();

    let outcome = harness.play(GUILD, VOICE, "a").await;

    assert_matches!(outcome, Err(MusicError::VoiceConnection(_)));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert!(harness.pending_titles(GUILD).is_empty());
    assert!(harness.sink.played().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_failed_move_tears_down(harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();
    harness.sink.refuse_connections();

    let outcome = harness
        .play(GUILD, crate::common::fixtures::OTHER_VOICE, "c")
        .await;

    assert_matches!(outcome, Err(MusicError::VoiceConnection(_)));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert!(harness.pending_titles(GUILD).is_empty());
}

#[rstest]
#[tokio::test]
async fn test_voice_failure_while_advancing_tears_down(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();
    harness.play(GUILD, VOICE, "c").await.unwrap();
    harness.sink.take_voice_down();

    harness.sink.finish(GUILD, None);
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert!(harness.pending_titles(GUILD).is_empty());
    assert_matches!(
        harness.notifier.announcements().last(),
        Some(Announcement::ConnectionLost(_))
    );
}

#[rstest]
#[tokio::test]
async fn test_connection_lost_tears_down(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();

    harness.sink.drop_connection(GUILD, "kicked");
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert!(harness.pending_titles(GUILD).is_empty());
    assert_eq!(
        harness.notifier.announcements(),
        vec![Announcement::ConnectionLost("kicked".to_string())]
    );

    // The guild can play again afterwards
    let outcome = harness.play(GUILD, VOICE, "c").await;
    assert_eq!(outcome, Ok(PlayOutcome::Started(track("c"))));
}

#[rstest]
#[tokio::test]
async fn test_disconnect_from_old_session_is_ignored(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.controller.stop(GUILD).await.unwrap();
    harness.pump().await;
    harness.play(GUILD, VOICE, "b").await.unwrap();

    harness.sink.replay_disconnect(0, "late");
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Playing);
    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
    assert!(harness.notifier.announcements().is_empty());
}
