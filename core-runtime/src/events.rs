//! # Event Bus System
//!
//! Provides an event-driven architecture for the playback engine using
//! `tokio::sync::broadcast`. The queue manager, the streaming cache and the
//! network monitor publish typed events here so hosts (and other modules) can
//! observe them without holding a direct reference.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ QueueManager ├──────────────>│           │
//! └──────────────┘               │           │
//!                                │ EventBus  │
//! ┌──────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │StreamingCache├──────────────>│  channel) ├─────────────────>│ Subscriber │
//! └──────────────┘               │           │                  └────────────┘
//!                                │           │
//! ┌──────────────┐     emit      │           │     subscribe    ┌────────────┐
//! │NetworkMonitor├──────────────>│           ├─────────────────>│ Subscriber │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! The queue manager additionally keeps a synchronous listener registry; the
//! bus is a mirror for consumers that live on other tasks.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, QueueEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Queue(QueueEvent::ShuffleToggled { enabled: true }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Queue(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber continues with newer events.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed; publishers ignore that case.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback queue events
    Queue(QueueEvent),
    /// Streaming cache events
    Cache(CacheEvent),
    /// Network condition events
    Network(NetworkEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Network(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::FetchFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Queue(QueueEvent::QueueExhausted { .. }) => EventSeverity::Info,
            CoreEvent::Network(NetworkEvent::ConditionsChanged { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::PreloadCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events emitted by the playback queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Queue contents or ordering changed (set, insert, remove, move, clear, restore).
    QueueChanged {
        /// Number of tracks now in the queue.
        length: usize,
        /// Cursor position, `-1` when the queue is empty.
        current_index: i64,
    },
    /// The current track changed through next/previous navigation.
    TrackChanged {
        track_id: String,
        current_index: i64,
    },
    /// `next` ran past the end with repeat off.
    QueueExhausted {
        /// The track that stays current.
        last_track_id: Option<String>,
    },
    /// Shuffle was enabled or disabled.
    ShuffleToggled { enabled: bool },
    /// Repeat mode changed (`"none"`, `"one"`, `"all"`).
    RepeatModeChanged { mode: String },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::QueueChanged { .. } => "Queue updated",
            QueueEvent::TrackChanged { .. } => "Current track changed",
            QueueEvent::QueueExhausted { .. } => "Reached end of queue",
            QueueEvent::ShuffleToggled { .. } => "Shuffle toggled",
            QueueEvent::RepeatModeChanged { .. } => "Repeat mode changed",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the streaming cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// Served from cache.
    Hit {
        track_id: String,
        bitrate: u32,
        access_count: u64,
    },
    /// Not cached (or expired); a fetch follows.
    Miss { track_id: String },
    /// Fetched bytes were stored.
    Stored {
        track_id: String,
        bitrate: u32,
        size_bytes: u64,
    },
    /// An entry was evicted to make room.
    Evicted { key: String, size_bytes: u64 },
    /// Expired entries were swept.
    Expired { count: usize },
    /// A fetch failed; the caller was given the raw stream URL.
    FetchFailed { track_id: String, message: String },
    /// A preload pass finished.
    PreloadCompleted { requested: usize, cached: usize },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Hit { .. } => "Cache hit",
            CacheEvent::Miss { .. } => "Cache miss",
            CacheEvent::Stored { .. } => "Stream cached",
            CacheEvent::Evicted { .. } => "Cache entry evicted",
            CacheEvent::Expired { .. } => "Expired cache entries removed",
            CacheEvent::FetchFailed { .. } => "Stream fetch failed",
            CacheEvent::PreloadCompleted { .. } => "Preload completed",
        }
    }
}

// ============================================================================
// Network Events
// ============================================================================

/// Events emitted by the network monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum NetworkEvent {
    /// Effective connection type changed.
    ConditionsChanged {
        /// `"slow-2g"`, `"2g"`, `"3g"`, `"4g"` or `"unknown"`.
        effective_type: String,
        downlink_mbps: f64,
        rtt_ms: f64,
        save_data: bool,
    },
}

impl NetworkEvent {
    fn description(&self) -> &str {
        match self {
            NetworkEvent::ConditionsChanged { .. } => "Network conditions changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events, it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let cache_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
