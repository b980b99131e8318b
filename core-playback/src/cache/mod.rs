//! # Streaming Cache Module
//!
//! Keeps recently fetched stream bytes in memory and hands out playable URLs
//! for them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     StreamingCache                     │
//! │  - get_optimized_stream()              │
//! │  - preload_next_tracks()               │
//! │  - evict_least_used_entries()          │
//! │  - cleanup_expired_entries()           │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> NetworkMonitor  (bitrate selection)
//!          ├──> HttpClient      (byte fetches)
//!          ├──> BlobUrlRegistry (URLs for cached bytes)
//!          └──> Clock           (entry age)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, StreamingCache};
//!
//! let cache = StreamingCache::builder(CacheConfig::default())
//!     .http_client(http)
//!     .build()?;
//!
//! let url = cache.get_optimized_stream("track-1", &qualities).await?;
//! println!("{}", cache.stats().usage_string());
//! ```

pub mod config;
pub mod entry;
pub mod manager;
pub mod stats;

// Re-export commonly used types
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use manager::{cache_key, StreamingCache, StreamingCacheBuilder};
pub use stats::{CacheStats, EvictionOutcome};
