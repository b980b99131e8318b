//! # Queue Manager
//!
//! Thread-safe front of the queue state machine.
//!
//! Every mutating call takes the state lock, applies one transition, takes a
//! snapshot and releases the lock. Listeners then run synchronously, in
//! subscription order, with that snapshot. The same change is mirrored on the
//! [`EventBus`] when one is attached.

use crate::config::QueueConfig;
use crate::models::{InsertPosition, NextTrack, RepeatMode, Track};
use crate::queue::state::{Advance, QueueSnapshot, QueueState};
use bridge_traits::StateStore;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

type Listener = Arc<dyn Fn(&QueueSnapshot) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        id
    }

    fn remove(&self, id: u64) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    fn snapshot(&self) -> Vec<Listener> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }
}

/// Handle to a queue listener. Dropping it detaches the listener.
#[must_use = "the listener is detached when the Subscription is dropped"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    id: u64,
}

impl Subscription {
    /// Detach the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Ordered playback list with cursor, history, shuffle and repeat.
///
/// # Example
///
/// ```rust,ignore
/// use core_playback::{QueueManager, QueueConfig, RepeatMode};
///
/// let queue = QueueManager::new(QueueConfig::default());
/// let _sub = queue.subscribe(|snapshot| println!("{} tracks", snapshot.tracks.len()));
///
/// queue.set_queue(tracks, 0);
/// queue.set_repeat_mode(RepeatMode::All);
/// let next = queue.next_track();
/// ```
pub struct QueueManager {
    pub(super) config: QueueConfig,
    pub(super) state: Mutex<QueueState>,
    listeners: Arc<ListenerRegistry>,
    event_bus: Option<Arc<EventBus>>,
    pub(super) store: Option<Arc<dyn StateStore>>,
}

impl QueueManager {
    pub fn new(config: QueueConfig) -> Self {
        let state = QueueState::new(&config, None);
        Self {
            config,
            state: Mutex::new(state),
            listeners: Arc::new(ListenerRegistry::default()),
            event_bus: None,
            store: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Durable store used by `save_state` / `restore_state`.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Deterministic shuffle order.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.state.get_mut().reseed(seed);
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Replace the queue and start at `start_index` (clamped).
    pub fn set_queue(&self, tracks: Vec<Track>, start_index: usize) {
        let snapshot = {
            let mut state = self.state.lock();
            state.set_queue(tracks, start_index);
            state.snapshot()
        };
        debug!(
            length = snapshot.tracks.len(),
            current_index = snapshot.current_index,
            "Queue replaced"
        );
        let event = queue_changed(&snapshot);
        self.publish(&snapshot, event);
    }

    /// Flip shuffle. Returns the new flag.
    pub fn toggle_shuffle(&self) -> bool {
        let (enabled, snapshot) = {
            let mut state = self.state.lock();
            let enabled = state.toggle_shuffle();
            (enabled, state.snapshot())
        };
        debug!(enabled, "Shuffle toggled");
        self.publish(&snapshot, QueueEvent::ShuffleToggled { enabled });
        enabled
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        let snapshot = {
            let mut state = self.state.lock();
            state.set_repeat_mode(mode);
            state.snapshot()
        };
        debug!(mode = %mode, "Repeat mode set");
        self.publish(
            &snapshot,
            QueueEvent::RepeatModeChanged {
                mode: mode.as_str().to_string(),
            },
        );
    }

    /// Advance to the next track.
    ///
    /// Empty or exhausted queues return `{None, false}` without notifying.
    pub fn next_track(&self) -> NextTrack {
        let (next, advance, snapshot) = {
            let mut state = self.state.lock();
            let (next, advance) = state.next_track();
            (next, advance, state.snapshot())
        };

        let event = match advance {
            Advance::Unchanged => return next,
            Advance::Exhausted => {
                let last_track_id = snapshot.current_track().map(|t| t.id.clone());
                debug!(?last_track_id, "Queue exhausted");
                QueueEvent::QueueExhausted { last_track_id }
            }
            Advance::Repeated | Advance::Moved => match &next.track {
                Some(track) => QueueEvent::TrackChanged {
                    track_id: track.id.clone(),
                    current_index: snapshot.current_index,
                },
                None => return next,
            },
        };

        self.publish(&snapshot, event);
        next
    }

    /// Step back through history, or to the previous position when there
    /// is none.
    pub fn previous_track(&self) -> Option<Track> {
        let (previous, snapshot) = {
            let mut state = self.state.lock();
            let previous = state.previous_track()?;
            (previous, state.snapshot())
        };

        self.publish(
            &snapshot,
            QueueEvent::TrackChanged {
                track_id: previous.id.clone(),
                current_index: snapshot.current_index,
            },
        );
        Some(previous)
    }

    pub fn insert_track(&self, track: Track, at: InsertPosition) {
        let snapshot = {
            let mut state = self.state.lock();
            state.insert_track(track, at);
            state.snapshot()
        };
        let event = queue_changed(&snapshot);
        self.publish(&snapshot, event);
    }

    /// Remove the first track with `track_id`. Returns `false` if absent.
    pub fn remove_track(&self, track_id: &str) -> bool {
        let snapshot = {
            let mut state = self.state.lock();
            if !state.remove_track(track_id) {
                return false;
            }
            state.snapshot()
        };
        debug!(track_id, "Track removed from queue");
        let event = queue_changed(&snapshot);
        self.publish(&snapshot, event);
        true
    }

    /// Move a track between positions. Out-of-range indices are ignored.
    pub fn move_track(&self, from: usize, to: usize) -> bool {
        let snapshot = {
            let mut state = self.state.lock();
            if !state.move_track(from, to) {
                return false;
            }
            state.snapshot()
        };
        let event = queue_changed(&snapshot);
        self.publish(&snapshot, event);
        true
    }

    /// Drop every track and the history. Shuffle and repeat settings stay.
    pub fn clear(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            state.clear();
            state.snapshot()
        };
        let event = queue_changed(&snapshot);
        self.publish(&snapshot, event);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn current_track(&self) -> Option<Track> {
        self.state.lock().current_track().cloned()
    }

    pub fn state(&self) -> QueueSnapshot {
        self.state.lock().snapshot()
    }

    /// Ids of the tracks after the current one, in play order.
    pub fn upcoming_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .upcoming()
            .into_iter()
            .map(|t| t.id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register a listener called after every successful change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueueSnapshot) + Send + Sync + 'static,
    {
        let id = self.listeners.add(Arc::new(listener));
        Subscription {
            registry: Arc::downgrade(&self.listeners),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `snapshot` to listeners and mirror `event` on the bus.
    ///
    /// Must be called without holding the state lock.
    pub(super) fn publish(&self, snapshot: &QueueSnapshot, event: QueueEvent) {
        for listener in self.listeners.snapshot() {
            listener(snapshot);
        }

        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Queue(event));
        }
    }
}

pub(super) fn queue_changed(snapshot: &QueueSnapshot) -> QueueEvent {
    QueueEvent::QueueChanged {
        length: snapshot.tracks.len(),
        current_index: snapshot.current_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn abc() -> Vec<Track> {
        ["a", "b", "c"]
            .iter()
            .map(|id| Track::new(*id, id.to_uppercase(), "Artist"))
            .collect()
    }

    #[test]
    fn test_one_notification_per_mutation() {
        let queue = QueueManager::new(QueueConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _sub = queue.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        queue.set_queue(abc(), 0);
        queue.next_track();
        queue.set_repeat_mode(RepeatMode::All);
        queue.toggle_shuffle();
        assert_eq!(count.load(Ordering::SeqCst), 4);

        assert!(!queue.remove_track("missing"));
        assert!(!queue.move_track(0, 9));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let queue = QueueManager::new(QueueConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = queue.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(queue.listener_count(), 1);

        queue.set_queue(abc(), 0);
        sub.unsubscribe();
        queue.set_queue(abc(), 1);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(queue.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_read_queue() {
        let queue = Arc::new(QueueManager::new(QueueConfig::default()));
        let seen = Arc::new(Mutex::new(None));
        let q = Arc::downgrade(&queue);
        let s = seen.clone();
        let _sub = queue.subscribe(move |_| {
            if let Some(q) = q.upgrade() {
                *s.lock() = q.current_track().map(|t| t.id);
            }
        });

        queue.set_queue(abc(), 2);
        assert_eq!(seen.lock().as_deref(), Some("c"));
    }

    #[test]
    fn test_events_mirrored_on_bus() {
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();
        let queue = QueueManager::new(QueueConfig::default()).with_event_bus(bus);

        queue.set_queue(abc(), 2);
        queue.next_track();

        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Queue(QueueEvent::QueueChanged {
                length: 3,
                current_index: 2
            })
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Queue(QueueEvent::QueueExhausted {
                last_track_id: Some("c".to_string())
            })
        );
    }
}
