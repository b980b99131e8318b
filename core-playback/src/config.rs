//! # Engine Configuration
//!
//! Tunables for the queue, the streaming cache and network probing.
//!
//! Every field has a serde default so hosts can ship a partial JSON document
//! and only override what they care about.

use crate::cache::CacheConfig;
use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration of the playback engine core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub network: NetworkProbeConfig,
}

impl EngineConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.queue.validate().map_err(PlaybackError::InvalidConfig)?;
        self.cache.validate().map_err(PlaybackError::InvalidConfig)?;
        self.network
            .validate()
            .map_err(PlaybackError::InvalidConfig)?;
        Ok(())
    }
}

// ============================================================================
// Queue
// ============================================================================

/// Queue manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Key under which the queue is persisted in the state store.
    ///
    /// Default: `"playback_queue"`.
    #[serde(default = "default_persistence_key")]
    pub persistence_key: String,

    /// History length that triggers a trim.
    ///
    /// Default: 50.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Number of most recent history entries kept after a trim.
    ///
    /// Default: 25.
    #[serde(default = "default_history_trim_to")]
    pub history_trim_to: usize,

    /// Size of the derived "up next" window.
    ///
    /// Default: 10.
    #[serde(default = "default_upcoming_window")]
    pub upcoming_window: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            persistence_key: default_persistence_key(),
            max_history: default_max_history(),
            history_trim_to: default_history_trim_to(),
            upcoming_window: default_upcoming_window(),
        }
    }
}

impl QueueConfig {
    pub fn with_persistence_key(mut self, key: impl Into<String>) -> Self {
        self.persistence_key = key.into();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.persistence_key.is_empty() {
            return Err("persistence_key cannot be empty".to_string());
        }

        if self.max_history == 0 {
            return Err("max_history must be greater than 0".to_string());
        }

        if self.history_trim_to > self.max_history {
            return Err("history_trim_to cannot exceed max_history".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Network probing
// ============================================================================

/// Latency probe settings, used when the host has no network signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkProbeConfig {
    /// URL hit with a `HEAD` request to measure round-trip time.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// How long a probe result stays fresh, and the probe loop period.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_probe_interval")]
    pub probe_interval: Duration,

    /// Soft timeout for a single probe.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: Duration,
}

impl Default for NetworkProbeConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            probe_interval: default_probe_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl NetworkProbeConfig {
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.probe_url.is_empty() {
            return Err("probe_url cannot be empty".to_string());
        }

        if self.probe_interval.is_zero() {
            return Err("probe_interval must be greater than 0".to_string());
        }

        if self.probe_timeout.is_zero() {
            return Err("probe_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_persistence_key() -> String {
    "playback_queue".to_string()
}

fn default_max_history() -> usize {
    50
}

fn default_history_trim_to() -> usize {
    25
}

fn default_upcoming_window() -> usize {
    10
}

fn default_probe_url() -> String {
    "https://www.gstatic.com/generate_204".to_string()
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}
