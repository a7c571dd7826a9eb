use assert_matches::assert_matches;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use rstest::rstest;

use jukebox::commands::music::utils::announcer::Announcement;
use jukebox::commands::music::utils::music_manager::{MusicError, PlayOutcome, PlayerState};

use crate::common::fixtures::{GUILD, OTHER_GUILD, OTHER_VOICE, TEXT, VOICE, stream_url, track};
use crate::common::{Harness, harness};

#[rstest]
#[tokio::test]
async fn test_play_on_empty_queue_starts_immediately(harness: Harness) {
    let outcome = harness.play(GUILD, VOICE, "a").await;

    assert_eq!(outcome, Ok(PlayOutcome::Started(track("a"))));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Playing);
    assert_eq!(harness.sink.played(), vec![stream_url("a")]);
    assert_eq!(harness.sink.channel(GUILD), Some(VOICE));
    assert!(harness.pending_titles(GUILD).is_empty());
}

#[rstest]
#[tokio::test]
async fn test_play_while_playing_appends(harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();

    let b = harness.play(GUILD, VOICE, "b").await;
    let c = harness.play(GUILD, VOICE, "c").await;

    assert_eq!(
        b,
        Ok(PlayOutcome::Queued {
            track: track("b"),
            position: 1
        })
    );
    assert_eq!(
        c,
        Ok(PlayOutcome::Queued {
            track: track("c"),
            position: 2
        })
    );
    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("a"));
    assert_eq!(harness.pending_titles(GUILD), ["b", "c"]);
    assert_eq!(harness.sink.played(), vec![stream_url("a")]);
}

#[rstest]
#[tokio::test]
async fn test_completion_advances_then_stop_releases(mut harness: Harness) {
    for title in ["a", "b", "c"] {
        harness.play(GUILD, VOICE, title).await.unwrap();
    }

    harness.sink.finish(GUILD, None);
    harness.pump().await;

    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
    assert_eq!(harness.pending_titles(GUILD), ["c"]);

    let summary = harness.controller.stop(GUILD).await.unwrap();
    harness.pump().await;

    assert_eq!(summary.cleared, 1);
    assert_eq!(summary.stopped, Some(track("b")));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert!(harness.pending_titles(GUILD).is_empty());
    assert_eq!(harness.sink.channel(GUILD), None);
    assert!(!harness.sink.is_streaming(GUILD));
    assert_eq!(harness.sink.played(), vec![stream_url("a"), stream_url("b")]);
}

#[rstest]
#[tokio::test]
async fn test_drain_goes_idle_and_leaves(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();

    harness.sink.finish(GUILD, None);
    harness.pump().await;
    harness.sink.finish(GUILD, None);
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(harness.controller.now_playing(GUILD).await, None);
    assert_eq!(harness.sink.channel(GUILD), None);
    assert_eq!(harness.sink.leave_count(), 1);
    assert_eq!(
        harness.notifier.announcements(),
        vec![
            Announcement::NowPlaying(track("b")),
            Announcement::QueueFinished
        ]
    );
    assert!(harness.notifier.channels().iter().all(|c| *c == TEXT));
}

#[rstest]
#[tokio::test]
async fn test_skip_with_nothing_playing_is_rejected(mut harness: Harness) {
    let result = harness.controller.skip(GUILD).await;

    assert_matches!(result, Err(MusicError::NothingToSkip));
    assert_eq!(harness.pump().await, 0);
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(harness.sink.channel(GUILD), None);
}

#[rstest]
#[tokio::test]
async fn test_skip_advances_exactly_once(mut harness: Harness) {
    for title in ["a", "b", "c"] {
        harness.play(GUILD, VOICE, title).await.unwrap();
    }

    let skipped = harness.controller.skip(GUILD).await;
    assert_eq!(harness.pump().await, 1);

    assert_eq!(skipped, Ok(track("a")));
    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
    assert_eq!(harness.pending_titles(GUILD), ["c"]);
    assert_eq!(harness.sink.played(), vec![stream_url("a"), stream_url("b")]);
}

#[rstest]
#[tokio::test]
async fn test_skip_last_track_drains(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();

    harness.controller.skip(GUILD).await.unwrap();
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(harness.sink.channel(GUILD), None);
}

#[rstest]
#[tokio::test]
async fn test_pause_and_resume_leave_queue_alone(harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();

    assert_eq!(harness.controller.pause(GUILD).await, Ok(track("a")));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Paused);
    assert!(harness.sink.is_paused(GUILD));
    assert_matches!(
        harness.controller.pause(GUILD).await,
        Err(MusicError::NothingPlaying)
    );

    assert_eq!(harness.controller.resume(GUILD).await, Ok(track("a")));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Playing);
    assert!(!harness.sink.is_paused(GUILD));
    assert_matches!(
        harness.controller.resume(GUILD).await,
        Err(MusicError::NothingPaused)
    );

    assert_eq!(harness.pending_titles(GUILD), ["b"]);
}

#[rstest]
#[case::pause(true)]
#[case::resume(false)]
#[tokio::test]
async fn test_pause_resume_require_connection(harness: Harness, #[case] pause: bool) {
    let result = if pause {
        harness.controller.pause(GUILD).await
    } else {
        harness.controller.resume(GUILD).await
    };

    assert_matches!(result, Err(MusicError::NotConnected));
}

#[rstest]
#[tokio::test]
async fn test_skip_while_paused_advances(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();
    harness.controller.pause(GUILD).await.unwrap();

    harness.controller.skip(GUILD).await.unwrap();
    harness.pump().await;

    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Playing);
}

#[rstest]
#[tokio::test]
async fn test_stop_while_paused_releases(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.controller.pause(GUILD).await.unwrap();

    let summary = harness.controller.stop(GUILD).await.unwrap();
    harness.pump().await;

    assert_eq!(summary.stopped, Some(track("a")));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(harness.sink.channel(GUILD), None);
}

#[rstest]
#[tokio::test]
async fn test_stop_when_not_connected(harness: Harness) {
    assert_matches!(
        harness.controller.stop(GUILD).await,
        Err(MusicError::NotConnected)
    );
}

#[rstest]
#[tokio::test]
async fn test_play_after_stop_starts_new_session(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.controller.stop(GUILD).await.unwrap();
    harness.pump().await;

    let outcome = harness.play(GUILD, VOICE, "b").await;

    assert_eq!(outcome, Ok(PlayOutcome::Started(track("b"))));
    assert_eq!(harness.sink.channel(GUILD), Some(VOICE));
}

#[rstest]
#[tokio::test]
async fn test_stale_completion_is_ignored(mut harness: Harness) {
    for title in ["a", "b", "c"] {
        harness.play(GUILD, VOICE, title).await.unwrap();
    }
    harness.sink.finish(GUILD, None);
    harness.pump().await;

    // "a" reports its end a second time
    harness.sink.replay_completion(0);
    harness.pump().await;

    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
    assert_eq!(harness.pending_titles(GUILD), ["c"]);
    assert_eq!(harness.sink.played(), vec![stream_url("a"), stream_url("b")]);
}

#[rstest]
#[tokio::test]
async fn test_completion_after_stop_does_not_resume(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();
    harness.controller.stop(GUILD).await.unwrap();

    harness.sink.replay_completion(0);
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(harness.sink.played(), vec![stream_url("a")]);
    assert_eq!(harness.sink.channel(GUILD), None);
}

#[rstest]
#[tokio::test]
async fn test_guilds_are_independent(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();
    harness.play(OTHER_GUILD, OTHER_VOICE, "x").await.unwrap();
    harness.play(OTHER_GUILD, OTHER_VOICE, "y").await.unwrap();

    harness.controller.stop(GUILD).await.unwrap();
    harness.pump().await;

    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Idle);
    assert_eq!(
        harness.controller.state(OTHER_GUILD).await,
        PlayerState::Playing
    );
    assert_eq!(
        harness.now_playing_title(OTHER_GUILD).await.as_deref(),
        Some("x")
    );
    assert_eq!(harness.pending_titles(OTHER_GUILD), ["y"]);
    assert_eq!(harness.sink.channel(OTHER_GUILD), Some(OTHER_VOICE));
}

#[rstest]
#[tokio::test]
async fn test_play_from_other_channel_moves(harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();

    let outcome = harness.play(GUILD, OTHER_VOICE, "b").await;

    assert_matches!(outcome, Ok(PlayOutcome::Queued { position: 1, .. }));
    assert_eq!(harness.sink.channel(GUILD), Some(OTHER_VOICE));
    assert_eq!(
        harness
            .controller
            .connection(GUILD)
            .await
            .map(|c| c.channel_id),
        Some(OTHER_VOICE)
    );
    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("a"));
}

#[rstest]
#[tokio::test]
async fn test_concurrent_plays_start_one_and_queue_the_rest(harness: Harness) {
    let titles = ["a", "b", "c", "d", "e"];

    let outcomes = join_all(titles.iter().map(|title| harness.play(GUILD, VOICE, title))).await;

    let started = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(PlayOutcome::Started(_))))
        .count();
    let mut positions: Vec<usize> = outcomes
        .iter()
        .filter_map(|o| match o {
            Ok(PlayOutcome::Queued { position, .. }) => Some(*position),
            _ => None,
        })
        .collect();
    positions.sort_unstable();

    assert_eq!(started, 1);
    assert_eq!(positions, vec![1, 2, 3, 4]);
    assert_eq!(harness.sink.played().len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_pause_before_skipped_track_ends_is_rejected(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();
    harness.controller.skip(GUILD).await.unwrap();

    // The end event of "a" has not been applied yet
    let result = harness.controller.pause(GUILD).await;

    assert_matches!(result, Err(MusicError::NothingPlaying));
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Playing);

    harness.pump().await;
    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
    assert_eq!(harness.controller.pause(GUILD).await, Ok(track("b")));
}

#[rstest]
#[tokio::test]
async fn test_resume_before_skipped_track_ends_is_rejected(mut harness: Harness) {
    harness.play(GUILD, VOICE, "a").await.unwrap();
    harness.play(GUILD, VOICE, "b").await.unwrap();
    harness.controller.pause(GUILD).await.unwrap();
    harness.controller.skip(GUILD).await.unwrap();

    assert_matches!(
        harness.controller.resume(GUILD).await,
        Err(MusicError::NothingPaused)
    );

    harness.pump().await;
    assert_eq!(harness.controller.state(GUILD).await, PlayerState::Playing);
    assert_eq!(harness.now_playing_title(GUILD).await.as_deref(), Some("b"));
}
