use crate::models::StreamQuality;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

/// A cached stream.
///
/// The cache map is the only owner of `data`. `url` is a view minted by the
/// blob registry and must be revoked when the entry goes away.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub data: Bytes,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub quality: StreamQuality,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.timestamp >= ttl
    }
}
