//! # Core Playback Traits
//!
//! Seams between the playback core and the media-source layer of the host.
//!
//! Platform capabilities (HTTP, durable storage, network signal, blob URLs)
//! live in `bridge-traits`. The trait here is different: it is implemented by
//! the application's own API layer, which knows how to turn a track id into
//! the list of encodings the backend offers.

use crate::error::Result;
use crate::models::StreamQuality;
use async_trait::async_trait;

/// Resolves the available stream encodings for a track.
///
/// Implementations typically call the media-source API and map each format
/// into a [`StreamQuality`]. Order does not matter; the cache sorts by bitrate.
///
/// # Example
///
/// ```rust,ignore
/// use core_playback::{QualityResolver, StreamQuality};
///
/// struct StaticResolver;
///
/// #[async_trait::async_trait]
/// impl QualityResolver for StaticResolver {
///     async fn resolve_qualities(&self, track_id: &str) -> Result<Vec<StreamQuality>> {
///         Ok(vec![StreamQuality::new(128, "webm", format!("https://cdn/{track_id}/128"))])
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QualityResolver: Send + Sync {
    /// All encodings available for `track_id`.
    ///
    /// An empty list means the track is not playable right now.
    async fn resolve_qualities(&self, track_id: &str) -> Result<Vec<StreamQuality>>;
}
