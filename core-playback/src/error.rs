//! # Playback Error Types
//!
//! Error types for queue persistence, quality selection and stream caching.
//!
//! Most engine paths deliberately do not surface errors: stream fetch failures
//! degrade to the raw source URL and persistence failures are reported as
//! `false`. The variants below cover what remains.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback engine operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The quality resolver returned no playable qualities for a track.
    #[error("No stream quality available for track: {0}")]
    NoQualityAvailable(String),

    /// The quality resolver failed.
    #[error("Failed to resolve qualities for track {track_id}: {message}")]
    ResolverFailed { track_id: String, message: String },

    // ========================================================================
    // Streaming Errors
    // ========================================================================
    /// Fetching stream bytes failed.
    #[error("Stream fetch failed: {0}")]
    FetchFailed(String),

    /// A soft timeout elapsed.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The fetch was cancelled because playback moved to another track.
    #[error("Fetch cancelled")]
    Cancelled,

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// A single entry does not fit in the cache budget.
    #[error("Cache full: entry of {required} bytes exceeds budget of {max} bytes")]
    CacheFull { required: u64, max: u64 },

    /// Creating the playable URL for cached bytes failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    // ========================================================================
    // Persistence / Configuration Errors
    // ========================================================================
    /// Queue state could not be saved or restored.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Bridge (platform adapter) error.
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    /// Runtime error from core-runtime.
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::FetchFailed(_)
                | PlaybackError::Timeout(_)
                | PlaybackError::ResolverFailed { .. }
                | PlaybackError::Bridge(bridge_traits::BridgeError::Timeout(_))
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::FetchFailed(_)
                | PlaybackError::Timeout(_)
                | PlaybackError::Bridge(bridge_traits::BridgeError::Timeout(_))
        )
    }
}

/// Result type for playback engine operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
