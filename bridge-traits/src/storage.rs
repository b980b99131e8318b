//! Durable Key-Value Storage Abstraction
//!
//! Persistence seam for engine state that must survive restarts (the playback
//! queue). Values are opaque byte blobs; the core decides the encoding.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Durable key-value blob store
///
/// Abstracts platform-specific persistence:
/// - Desktop: SQLite table or files in the app data directory
/// - iOS: UserDefaults / files in Application Support
/// - Android: DataStore
/// - Web: localStorage / IndexedDB
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StateStore;
///
/// async fn remember(store: &dyn StateStore, json: Vec<u8>) -> Result<()> {
///     store.put("playback_queue", json.into()).await
/// }
/// ```
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store a value, replacing any previous value for the key
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Retrieve a value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// List all stored keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all values
    async fn clear_all(&self) -> Result<()>;
}
