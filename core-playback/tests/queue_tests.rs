//! Queue manager behavior tests
//!
//! Covers navigation, repeat modes, shuffle round-trips, structural edits and
//! listener delivery through the public API.

use core_playback::{
    InsertPosition, PlaybackPosition, QueueConfig, QueueManager, QueueSnapshot, RepeatMode, Track,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter()
        .map(|id| Track::new(*id, format!("Song {id}"), "Artist").with_duration(180))
        .collect()
}

fn ids(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|t| t.id.clone()).collect()
}

fn queue() -> QueueManager {
    QueueManager::new(QueueConfig::default()).with_shuffle_seed(42)
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_next_pushes_history_then_exhausts() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C"]), 1);

    let next = queue.next_track();
    assert_eq!(next.track.unwrap().id, "C");
    let state = queue.state();
    assert_eq!(ids(&state.history), vec!["B"]);
    assert_eq!(state.current_index, 2);

    let next = queue.next_track();
    assert!(next.track.is_none());
    assert!(!next.should_crossfade);

    let state = queue.state();
    assert_eq!(state.current_track().unwrap().id, "C");
    assert_eq!(state.current_index, 2);
    assert_eq!(state.position, PlaybackPosition::Exhausted(2));
}

#[test]
fn test_repeat_all_wraps_to_start() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C"]), 2);
    queue.set_repeat_mode(RepeatMode::All);

    let next = queue.next_track();
    assert_eq!(next.track.unwrap().id, "A");
    assert_eq!(queue.state().current_index, 0);
}

#[test]
fn test_repeat_one_replays_without_history() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C"]), 1);
    queue.set_repeat_mode(RepeatMode::One);

    let next = queue.next_track();
    assert_eq!(next.track.unwrap().id, "B");
    assert!(!next.should_crossfade);

    let state = queue.state();
    assert_eq!(state.current_index, 1);
    assert!(state.history.is_empty());
}

#[test]
fn test_empty_queue_navigation() {
    let queue = queue();
    assert!(queue.next_track().track.is_none());
    assert!(queue.previous_track().is_none());
    assert!(queue.current_track().is_none());
    assert_eq!(queue.state().current_index, -1);
    assert_eq!(queue.state().position, PlaybackPosition::Empty);
}

#[test]
fn test_previous_returns_through_history() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C", "D"]), 0);
    queue.next_track();
    queue.next_track();

    assert_eq!(queue.previous_track().unwrap().id, "B");
    assert_eq!(queue.state().current_index, 1);
    assert_eq!(queue.previous_track().unwrap().id, "A");
    assert_eq!(queue.state().current_index, 0);
    assert!(queue.previous_track().is_none());
}

#[test]
fn test_previous_resyncs_after_reorder() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C", "D"]), 0);
    queue.next_track(); // history [A], current B
    queue.move_track(0, 3); // B C D A

    assert_eq!(queue.previous_track().unwrap().id, "A");
    assert_eq!(queue.state().current_index, 3);
}

// ============================================================================
// Shuffle
// ============================================================================

#[test]
fn test_shuffle_round_trip_restores_order() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C", "D"]), 2);

    assert!(queue.toggle_shuffle());
    let state = queue.state();
    assert_eq!(state.tracks[0].id, "C");
    assert_eq!(state.current_index, 0);
    assert_eq!(ids(&state.original_order), vec!["A", "B", "C", "D"]);

    let mut shuffled = ids(&state.tracks);
    shuffled.sort();
    assert_eq!(shuffled, vec!["A", "B", "C", "D"]);

    assert!(!queue.toggle_shuffle());
    let state = queue.state();
    assert_eq!(ids(&state.tracks), vec!["A", "B", "C", "D"]);
    assert_eq!(state.current_index, 2);
}

#[test]
fn test_unshuffle_follows_current_track() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C", "D", "E"]), 0);
    queue.toggle_shuffle();
    let playing = queue.next_track().track.unwrap();

    queue.toggle_shuffle();
    let state = queue.state();
    assert_eq!(state.current_track().unwrap().id, playing.id);
}

// ============================================================================
// Structural edits
// ============================================================================

#[test]
fn test_insert_positions() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C"]), 1);

    queue.insert_track(Track::new("N", "Next", "X"), InsertPosition::Next);
    assert_eq!(ids(&queue.state().tracks), vec!["A", "B", "N", "C"]);
    assert_eq!(queue.state().current_index, 1);

    queue.insert_track(Track::new("E", "End", "X"), InsertPosition::End);
    assert_eq!(queue.state().tracks.last().unwrap().id, "E");

    queue.insert_track(Track::new("F", "First", "X"), InsertPosition::At(0));
    assert_eq!(queue.state().tracks[0].id, "F");
    assert_eq!(queue.current_track().unwrap().id, "B");
    assert_eq!(queue.state().current_index, 2);

    queue.insert_track(Track::new("Z", "Far", "X"), InsertPosition::At(99));
    assert_eq!(queue.state().tracks.last().unwrap().id, "Z");
}

#[test]
fn test_insert_into_empty_queue_starts_playing() {
    let queue = queue();
    queue.insert_track(Track::new("A", "A", "X"), InsertPosition::Next);
    assert_eq!(queue.state().position, PlaybackPosition::Playing(0));
}

#[test]
fn test_remove_adjusts_cursor() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C", "D"]), 2);

    assert!(queue.remove_track("A"));
    assert_eq!(queue.current_track().unwrap().id, "C");
    assert_eq!(queue.state().current_index, 1);

    // Removing the current track keeps the numeric index.
    assert!(queue.remove_track("C"));
    assert_eq!(queue.current_track().unwrap().id, "D");

    // Removing the last track clamps.
    assert!(queue.remove_track("D"));
    assert_eq!(queue.current_track().unwrap().id, "B");
    assert_eq!(queue.state().current_index, 0);

    assert!(queue.remove_track("B"));
    assert_eq!(queue.state().position, PlaybackPosition::Empty);
    assert!(!queue.remove_track("B"));
}

#[test]
fn test_move_keeps_cursor_on_same_track() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B", "C", "D", "E"]), 2);

    assert!(queue.move_track(2, 4));
    assert_eq!(queue.current_track().unwrap().id, "C");
    assert_eq!(queue.state().current_index, 4);

    assert!(queue.move_track(0, 4));
    assert_eq!(queue.current_track().unwrap().id, "C");
    assert_eq!(queue.state().current_index, 3);

    assert!(queue.move_track(4, 0));
    assert_eq!(queue.current_track().unwrap().id, "C");
    assert_eq!(queue.state().current_index, 4);

    assert!(!queue.move_track(1, 7));
    assert!(!queue.move_track(2, 2));
}

#[test]
fn test_clear_keeps_modes() {
    let queue = queue();
    queue.set_queue(tracks(&["A", "B"]), 0);
    queue.set_repeat_mode(RepeatMode::All);
    queue.toggle_shuffle();

    queue.clear();
    let state = queue.state();
    assert!(state.is_empty());
    assert!(state.history.is_empty());
    assert!(state.shuffle_enabled);
    assert_eq!(state.repeat_mode, RepeatMode::All);
}

#[test]
fn test_upcoming_window() {
    let queue = queue();
    let many: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
    let refs: Vec<&str> = many.iter().map(String::as_str).collect();
    queue.set_queue(tracks(&refs), 0);

    let upcoming = queue.state().upcoming;
    assert_eq!(upcoming.len(), 10);
    assert_eq!(upcoming[0].id, "t1");
    assert_eq!(upcoming[9].id, "t10");
    assert_eq!(queue.upcoming_ids().len(), 10);
}

// ============================================================================
// Listeners
// ============================================================================

#[test]
fn test_listener_receives_post_change_snapshot() {
    let queue = queue();
    let seen: Arc<Mutex<Vec<QueueSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _subscription = queue.subscribe(move |snapshot| sink.lock().push(snapshot.clone()));

    queue.set_queue(tracks(&["A", "B"]), 0);
    queue.next_track();
    queue.next_track(); // exhausts
    queue.next_track(); // no-op

    let seen = seen.lock();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].current_index, 0);
    assert_eq!(seen[1].current_track().unwrap().id, "B");
    assert!(seen[2].position.is_exhausted());
}

#[test]
fn test_dropping_subscription_detaches() {
    let queue = queue();
    let count = Arc::new(Mutex::new(0));
    let c = count.clone();

    {
        let _subscription = queue.subscribe(move |_| *c.lock() += 1);
        queue.set_queue(tracks(&["A"]), 0);
    }
    queue.set_queue(tracks(&["B"]), 0);

    assert_eq!(*count.lock(), 1);
    assert_eq!(queue.listener_count(), 0);
}
