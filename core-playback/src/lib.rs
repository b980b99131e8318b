//! # Playback Queue & Streaming Cache
//!
//! Decides what plays next and which bytes to fetch for it.
//!
//! ## Overview
//!
//! This crate handles:
//! - The playback queue: ordering, cursor, history, shuffle, repeat, persistence
//! - Network classification from a platform signal or latency probes
//! - Bitrate selection for the current network
//! - An in-memory streaming cache with deduplicated, cancellable fetches,
//!   least-used eviction, expiry sweeps and preloading
//! - A per-session facade tying the three together
//!
//! Decoding and audio output are out of scope: the output of this crate is a
//! track and a URL to hand to the host player.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod quality;
pub mod queue;
pub mod session;
pub mod traits;

pub use cache::{CacheConfig, CacheEntry, CacheStats, EvictionOutcome, StreamingCache};
pub use config::{EngineConfig, NetworkProbeConfig, QueueConfig};
pub use error::{PlaybackError, Result};
pub use models::{InsertPosition, NextTrack, RepeatMode, StreamQuality, Track};
pub use network::NetworkMonitor;
pub use quality::{next_lower_quality, select_optimal_quality};
pub use queue::{PersistedQueue, PlaybackPosition, QueueManager, QueueSnapshot, Subscription};
pub use session::{PlaybackItem, PlaybackSession};
pub use traits::QualityResolver;
