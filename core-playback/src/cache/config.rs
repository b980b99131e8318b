//! Streaming cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the streaming cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total size of cached stream bytes (default: 100MB)
    #[serde(default = "default_max_cache_size_bytes")]
    pub max_cache_size_bytes: u64,

    /// Age after which an entry is stale regardless of use (default: 24h)
    #[serde(default = "default_entry_ttl")]
    pub entry_ttl: Duration,

    /// Period of the expiry sweep (default: 5min)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,

    /// Soft timeout for fetching one stream (default: 60s)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,

    /// Upcoming tracks preloaded per pass (default: 3)
    #[serde(default = "default_preload_count")]
    pub preload_count: usize,

    /// Pause between two preloads (default: 1s)
    #[serde(default = "default_preload_spacing")]
    pub preload_spacing: Duration,

    /// Soft timeout for resolving and fetching one preloaded track (default: 60s)
    #[serde(default = "default_preload_timeout")]
    pub preload_timeout: Duration,

    /// Buffered seconds at or below which a lower bitrate is advised (default: 10)
    #[serde(default = "default_low_buffer_threshold_secs")]
    pub low_buffer_threshold_secs: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: default_max_cache_size_bytes(),
            entry_ttl: default_entry_ttl(),
            cleanup_interval: default_cleanup_interval(),
            fetch_timeout: default_fetch_timeout(),
            preload_count: default_preload_count(),
            preload_spacing: default_preload_spacing(),
            preload_timeout: default_preload_timeout(),
            low_buffer_threshold_secs: default_low_buffer_threshold_secs(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set entry time-to-live.
    pub fn with_entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_preload_count(mut self, count: usize) -> Self {
        self.preload_count = count;
        self
    }

    pub fn with_preload_spacing(mut self, spacing: Duration) -> Self {
        self.preload_spacing = spacing;
        self
    }

    pub fn with_low_buffer_threshold(mut self, secs: f64) -> Self {
        self.low_buffer_threshold_secs = secs;
        self
    }

    /// Entry TTL as a `chrono` duration for comparisons against entry timestamps.
    pub(crate) fn entry_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.entry_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(36_500))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if self.entry_ttl.is_zero() {
            return Err("entry_ttl must be greater than 0".to_string());
        }

        if self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0".to_string());
        }

        if self.fetch_timeout.is_zero() {
            return Err("fetch_timeout must be greater than 0".to_string());
        }

        if !self.low_buffer_threshold_secs.is_finite() || self.low_buffer_threshold_secs < 0.0 {
            return Err("low_buffer_threshold_secs must be a non-negative number".to_string());
        }

        Ok(())
    }
}

fn default_max_cache_size_bytes() -> u64 {
    100 * 1024 * 1024 // 100MB
}

fn default_entry_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_preload_count() -> usize {
    3
}

fn default_preload_spacing() -> Duration {
    Duration::from_secs(1)
}

fn default_preload_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_low_buffer_threshold_secs() -> f64 {
    10.0
}
