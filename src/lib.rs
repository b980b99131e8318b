//! Workspace facade crate.
//!
//! Re-exports the playback engine crates so host applications can depend on
//! `playback-engine` alone. The `desktop-shims` feature (on by default) pulls
//! in the desktop bridge adapters and lets [`CoreConfig`] fall back to them
//! when no platform implementation is injected.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

pub use core_playback::{
    CacheConfig, EngineConfig, InsertPosition, NetworkMonitor, NextTrack, PlaybackError,
    PlaybackItem, PlaybackSession, QualityResolver, QueueConfig, QueueManager, QueueSnapshot,
    RepeatMode, StreamQuality, StreamingCache, Track,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventBus};
