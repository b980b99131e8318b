//! Queue persistence against the desktop SQLite state store.

use bridge_desktop::SqliteStateStore;
use bridge_traits::StateStore;
use bytes::Bytes;
use core_playback::{PlaybackPosition, QueueConfig, QueueManager, RepeatMode, Track};
use std::sync::Arc;

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter()
        .map(|id| {
            Track::new(*id, format!("Song {id}"), "Artist")
                .with_thumbnail(format!("https://img.test/{id}.jpg"))
                .with_duration(200)
        })
        .collect()
}

async fn store() -> Arc<dyn StateStore> {
    Arc::new(SqliteStateStore::in_memory().await.unwrap())
}

#[tokio::test]
async fn test_save_and_restore_round_trip() {
    let store = store().await;

    let original = QueueManager::new(QueueConfig::default())
        .with_store(store.clone())
        .with_shuffle_seed(3);
    original.set_queue(tracks(&["A", "B", "C", "D"]), 1);
    original.toggle_shuffle();
    original.next_track();
    original.set_repeat_mode(RepeatMode::All);
    assert!(original.save_state().await);

    let restored = QueueManager::new(QueueConfig::default()).with_store(store);
    assert!(restored.restore_state().await);

    let before = original.state();
    let after = restored.state();
    assert_eq!(after.tracks, before.tracks);
    assert_eq!(after.current_index, before.current_index);
    assert_eq!(after.shuffle_enabled, before.shuffle_enabled);
    assert_eq!(after.repeat_mode, RepeatMode::All);
    assert_eq!(after.original_order, before.original_order);
    assert!(after.history.is_empty());

    // Unshuffling the restored queue brings back the saved original order.
    restored.toggle_shuffle();
    let ids: Vec<String> = restored.state().tracks.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_restore_exhausted_queue_resumes_playing() {
    let store = store().await;
    let queue = QueueManager::new(QueueConfig::default()).with_store(store.clone());
    queue.set_queue(tracks(&["A", "B"]), 1);
    queue.next_track();
    assert!(queue.state().position.is_exhausted());
    assert!(queue.save_state().await);

    let restored = QueueManager::new(QueueConfig::default()).with_store(store);
    assert!(restored.restore_state().await);
    assert_eq!(restored.state().position, PlaybackPosition::Playing(1));
}

#[tokio::test]
async fn test_restore_without_saved_state() {
    let queue = QueueManager::new(QueueConfig::default()).with_store(store().await);
    assert!(!queue.restore_state().await);
    assert!(queue.state().is_empty());
}

#[tokio::test]
async fn test_persistence_without_store_reports_false() {
    let queue = QueueManager::new(QueueConfig::default());
    queue.set_queue(tracks(&["A"]), 0);

    assert!(!queue.save_state().await);
    assert!(!queue.restore_state().await);
    assert_eq!(queue.state().tracks.len(), 1);
}

#[tokio::test]
async fn test_corrupt_document_leaves_queue_untouched() {
    let store = store().await;
    store
        .put("playback_queue", Bytes::from_static(b"{not json"))
        .await
        .unwrap();

    let queue = QueueManager::new(QueueConfig::default()).with_store(store);
    queue.set_queue(tracks(&["A", "B"]), 1);

    assert!(!queue.restore_state().await);
    assert_eq!(queue.current_track().unwrap().id, "B");
}

#[tokio::test]
async fn test_custom_persistence_key() {
    let store = store().await;
    let queue = QueueManager::new(QueueConfig::default().with_persistence_key("session_2"))
        .with_store(store.clone());
    queue.set_queue(tracks(&["A"]), 0);
    assert!(queue.save_state().await);

    assert!(store.has_key("session_2").await.unwrap());
    assert!(!store.has_key("playback_queue").await.unwrap());
}
