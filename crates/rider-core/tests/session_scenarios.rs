mod common;

use common::harness::{preview, track, watch_url, Call, Harness};
use rider_core::fallback::EXHAUSTED_MESSAGE;
use rider_core::protocol::{BackendEvent, Command, PlaybackStatus};
use rider_core::session::DisplayInfo;

#[test]
fn reselecting_the_same_item_is_a_noop() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.resolve("a", track("a", Some("https://cdn/a.webm")));
    h.backend_event(BackendEvent::Ready);
    h.progress(0.4, 200.0);
    let before = h.controller.snapshot();
    let calls = h.backend.calls.len();

    h.select("a", preview("Song A", "thumb-a"));

    assert!(h.pending.is_empty(), "re-selection must not fetch again");
    assert_eq!(h.backend.calls.len(), calls);
    assert_eq!(h.controller.snapshot(), before);
}

#[test]
fn reselecting_while_lookup_in_flight_does_not_refetch() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.select("a", preview("Song A", "thumb-a"));
    assert_eq!(h.pending.len(), 1);
}

#[test]
fn stale_success_never_lands() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.select("b", preview("Song B", "thumb-b"));
    let before = h.controller.snapshot();

    h.resolve("a", track("a", Some("https://cdn/a.webm")));

    assert_eq!(h.controller.snapshot(), before);
    assert!(h.backend.calls.is_empty());
    let session = h.controller.session().unwrap();
    assert_eq!(session.selected_id, "b");
    assert!(session.candidate_sources.is_empty());

    h.resolve("b", track("b", Some("https://cdn/b.webm")));
    assert_eq!(h.backend.loads(), vec!["https://cdn/b.webm"]);
}

#[test]
fn stale_failure_never_lands() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.select("b", preview("Song B", "thumb-b"));

    h.reject("a");

    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Loading);
    assert!(snap.error.is_none());
}

#[test]
fn stale_result_after_newer_one_applied_is_dropped() {
    let mut h = Harness::default();
    h.select("a", DisplayInfo::default());
    h.select("b", DisplayInfo::default());
    h.resolve("b", track("b", Some("https://cdn/b.webm")));
    h.resolve("a", track("a", Some("https://cdn/a.webm")));
    assert_eq!(h.backend.loads(), vec!["https://cdn/b.webm"]);
    assert_eq!(h.controller.snapshot().title, "Title b");
}

#[test]
fn fallback_then_terminal_error() {
    let mut h = Harness::default();
    h.select("A", preview("Song A", "thumb-a"));
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Loading);

    h.resolve("A", track("A", Some("U1")));
    let session = h.controller.session().unwrap();
    assert_eq!(
        session.candidate_sources,
        vec!["U1".to_string(), watch_url("A")]
    );
    assert_eq!(session.active_source_index, Some(0));
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Playing);
    assert_eq!(h.backend.loads(), vec!["U1"]);

    h.backend_event(BackendEvent::Error {
        reason: "403".into(),
    });
    assert_eq!(h.backend.loads(), vec!["U1".to_string(), watch_url("A")]);
    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Loading);
    assert!(snap.error.is_none(), "no banner mid-fallback");

    h.backend_event(BackendEvent::Buffer);
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Buffering);

    h.backend_event(BackendEvent::Error {
        reason: "unplayable".into(),
    });
    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Error);
    assert_eq!(snap.error.as_deref(), Some(EXHAUSTED_MESSAGE));
    assert_eq!(h.backend.calls.last(), Some(&Call::Stop));

    let loads = h.backend.loads().len();
    h.backend_event(BackendEvent::Error {
        reason: "late".into(),
    });
    assert_eq!(h.backend.loads().len(), loads, "no further loads");
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Error);
}

#[test]
fn fallback_success_clears_loading() {
    let mut h = Harness::default();
    h.select("A", DisplayInfo::default());
    h.resolve("A", track("A", Some("U1")));
    h.backend_event(BackendEvent::Error {
        reason: "404".into(),
    });
    h.backend_event(BackendEvent::Ready);
    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Playing);
    assert!(!snap.buffering);
    assert_eq!(h.controller.session().unwrap().active_source_index, Some(1));
}

#[test]
fn new_selection_clears_terminal_error_and_restarts_fallback() {
    let mut h = Harness::default();
    h.select("A", DisplayInfo::default());
    h.resolve("A", track("A", None));
    h.backend_event(BackendEvent::Error {
        reason: "dead".into(),
    });
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Error);

    h.select("B", DisplayInfo::default());
    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Loading);
    assert!(snap.error.is_none());

    h.resolve("B", track("B", Some("U2")));
    assert_eq!(h.controller.session().unwrap().active_source_index, Some(0));
    assert_eq!(h.backend.loads().last().copied(), Some("U2"));
}

#[test]
fn selecting_mid_fallback_cancels_old_sequence() {
    let mut h = Harness::default();
    h.select("A", DisplayInfo::default());
    h.resolve("A", track("A", Some("U1")));
    h.backend_event(BackendEvent::Error {
        reason: "first".into(),
    });
    h.select("B", DisplayInfo::default());

    // The old watch-page attempt fails after B was chosen.
    h.backend_event(BackendEvent::Error {
        reason: "second".into(),
    });

    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Loading);
    assert!(snap.error.is_none());
    assert_eq!(h.backend.loads().len(), 2);
    assert!(!h.backend.calls.contains(&Call::Stop));
}

#[test]
fn drag_holds_the_control_and_seeks_once() {
    let mut h = Harness::default();
    h.select("a", DisplayInfo::default());
    h.resolve("a", track("a", Some("U1")));
    h.backend_event(BackendEvent::Ready);
    h.backend_event(BackendEvent::Duration { seconds: 200.0 });
    h.progress(0.10, 200.0);

    h.ui(Command::ScrubStart);
    assert_eq!(h.controller.snapshot().position, 0.10);

    h.ui(Command::ScrubMove { fraction: 0.6 });
    for played in [0.11, 0.12, 0.13, 0.14] {
        h.progress(played, 200.0);
        assert_eq!(h.controller.snapshot().position, 0.6);
    }
    assert_eq!(h.controller.transport().position_fraction, 0.14);

    h.ui(Command::ScrubMove { fraction: 0.7 });
    assert!(h.backend.seeks().is_empty(), "no seek while dragging");

    h.ui(Command::ScrubRelease { fraction: 0.75 });
    assert_eq!(h.backend.seeks(), vec![0.75]);
    assert!(!h.controller.drag().active);

    h.progress(0.75, 200.0);
    assert_eq!(h.controller.snapshot().position, 0.75);
}

#[test]
fn new_thumbnail_shows_immediately() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.resolve("a", track("a", Some("U1")));
    assert_eq!(
        h.controller.snapshot().thumbnail_url.as_deref(),
        Some("thumb-a")
    );

    h.select("b", preview("Song B", "thumb-b"));
    let snap = h.controller.snapshot();
    assert_eq!(snap.thumbnail_url.as_deref(), Some("thumb-b"));
    assert_eq!(snap.title, "Song B");

    // Lookup carries no thumbnails: the preview one stays.
    h.resolve("b", track("b", Some("U2")));
    let snap = h.controller.snapshot();
    assert_eq!(snap.thumbnail_url.as_deref(), Some("thumb-b"));
    assert_eq!(snap.title, "Title b");
    assert_eq!(snap.author, "Author b");
}

#[test]
fn preview_without_thumbnail_keeps_previous_one() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.select(
        "b",
        DisplayInfo {
            title: Some("Song B".into()),
            ..Default::default()
        },
    );
    assert_eq!(
        h.controller.snapshot().thumbnail_url.as_deref(),
        Some("thumb-a")
    );
}

#[test]
fn play_after_end_replays_from_start() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.resolve("a", track("a", Some("https://cdn/a.webm")));
    h.backend_event(BackendEvent::Ready);
    h.progress(0.99, 200.0);
    h.backend_event(BackendEvent::Ended);
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Paused);
    h.backend.calls.clear();

    h.ui(Command::TogglePlayPause);

    assert_eq!(h.backend.calls, vec![Call::Seek(0.0), Call::Play]);
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Playing);
}

#[test]
fn previous_track_can_be_paused_while_next_loads() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.resolve("a", track("a", Some("https://cdn/a.webm")));
    h.backend_event(BackendEvent::Ready);
    h.select("b", preview("Song B", "thumb-b"));
    h.backend.calls.clear();

    let snap = h.controller.snapshot();
    assert!(snap.can_toggle);
    assert!(!snap.output_paused);

    h.ui(Command::TogglePlayPause);
    assert_eq!(h.backend.calls, vec![Call::Pause]);
    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Loading);
    assert!(snap.output_paused);

    // The new track still starts once its lookup lands.
    h.resolve("b", track("b", Some("https://cdn/b.webm")));
    assert_eq!(
        h.backend.calls,
        vec![Call::Pause, Call::Load("https://cdn/b.webm".into()), Call::Play]
    );
    assert!(!h.controller.snapshot().output_paused);
}

#[test]
fn previous_track_can_be_paused_after_failed_lookup() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.resolve("a", track("a", Some("https://cdn/a.webm")));
    h.backend_event(BackendEvent::Ready);
    h.select("b", preview("Song B", "thumb-b"));
    h.reject("b");
    h.backend.calls.clear();

    assert!(h.controller.snapshot().can_toggle);
    h.ui(Command::TogglePlayPause);
    h.ui(Command::TogglePlayPause);

    assert_eq!(h.backend.calls, vec![Call::Pause, Call::Play]);
    assert_eq!(h.controller.snapshot().status, PlaybackStatus::Error);
}

#[test]
fn late_end_of_previous_source_is_ignored() {
    let mut h = Harness::default();
    h.select("a", preview("Song A", "thumb-a"));
    h.resolve("a", track("a", Some("https://cdn/a.webm")));
    h.backend_event(BackendEvent::Ready);
    let old = h.generation();

    h.select("b", preview("Song B", "thumb-b"));
    h.resolve("b", track("b", Some("https://cdn/b.webm")));
    h.backend.calls.clear();

    // A's file finished just before B's load took over.
    h.backend_event_from(old, BackendEvent::Ended);
    h.backend_event_from(
        old,
        BackendEvent::Error {
            reason: "end of a".into(),
        },
    );
    h.backend_event(BackendEvent::Ready);

    let snap = h.controller.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Playing);
    assert!(snap.error.is_none());
    assert!(h.backend.calls.is_empty());
}
