//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Point-in-time statistics about the streaming cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently cached
    pub entry_count: usize,

    /// Bytes held by cached entries
    pub total_bytes: u64,

    /// Configured budget
    pub max_bytes: u64,

    /// Lookups served from cache
    pub hits: u64,

    /// Lookups that needed a fetch
    pub misses: u64,

    /// Entries removed to make room
    pub evictions: u64,

    /// Entries removed for age
    pub expired: u64,

    /// Fetches that degraded to the raw URL
    pub fetch_failures: u64,

    /// Callers that joined an in-flight fetch instead of starting one
    pub deduplicated_requests: u64,
}

impl CacheStats {
    /// Cache usage as a percentage of the budget.
    pub fn usage_percentage(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.max_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Hits over all lookups, as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }

        (self.hits as f64 / lookups as f64) * 100.0
    }

    /// Bytes still available before eviction kicks in.
    pub fn free_bytes(&self) -> u64 {
        self.max_bytes.saturating_sub(self.total_bytes)
    }

    /// Human-readable usage, e.g. `"60.0 MB / 100.0 MB"`.
    pub fn usage_string(&self) -> String {
        format!(
            "{} / {}",
            format_bytes(self.total_bytes),
            format_bytes(self.max_bytes)
        )
    }
}

/// Result of an eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    pub entries_evicted: usize,
    pub bytes_freed: u64,
}

/// Format bytes as human-readable string.
pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
