//! Blob URL Abstraction
//!
//! The streaming cache owns the bytes of every cached track. Players consume
//! URLs, so each cached buffer is exposed through a URL minted by the host
//! (`URL.createObjectURL` on the web, a loopback HTTP route or a temp file on
//! desktop). A URL is only a borrowed view: once the cache entry is destroyed
//! the URL must be revoked and stop resolving.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{BridgeError, Result};

/// Registry of URLs backed by in-memory buffers.
///
/// Methods are synchronous: URL creation and revocation happen inside the
/// cache's eviction critical section.
pub trait BlobUrlRegistry: Send + Sync {
    /// Register `data` and return a URL that resolves to it.
    fn create_url(&self, data: Bytes, mime_type: &str) -> Result<String>;

    /// Invalidate a URL previously returned by [`create_url`](Self::create_url).
    fn revoke_url(&self, url: &str) -> Result<()>;

    /// Bytes behind a live URL, or `None` once revoked.
    fn resolve(&self, url: &str) -> Option<Bytes>;
}

#[derive(Debug, Clone)]
struct BlobRecord {
    data: Bytes,
    mime_type: String,
}

/// Process-local registry handing out `blob:` URLs.
///
/// Suitable for hosts that serve cached bytes themselves (e.g. through a
/// loopback server that calls [`resolve`](BlobUrlRegistry::resolve)) and for
/// tests.
#[derive(Debug, Default)]
pub struct InMemoryBlobRegistry {
    blobs: Mutex<HashMap<String, BlobRecord>>,
}

impl InMemoryBlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unrevoked) URLs.
    pub fn live_count(&self) -> usize {
        self.blobs.lock().len()
    }

    /// MIME type registered for a live URL.
    pub fn mime_type(&self, url: &str) -> Option<String> {
        self.blobs.lock().get(url).map(|r| r.mime_type.clone())
    }
}

impl BlobUrlRegistry for InMemoryBlobRegistry {
    fn create_url(&self, data: Bytes, mime_type: &str) -> Result<String> {
        let url = format!("blob:engine/{}", Uuid::new_v4());
        self.blobs.lock().insert(
            url.clone(),
            BlobRecord {
                data,
                mime_type: mime_type.to_string(),
            },
        );
        Ok(url)
    }

    fn revoke_url(&self, url: &str) -> Result<()> {
        match self.blobs.lock().remove(url) {
            Some(_) => Ok(()),
            None => Err(BridgeError::NotAvailable(format!(
                "Blob URL not registered: {}",
                url
            ))),
        }
    }

    fn resolve(&self, url: &str) -> Option<Bytes> {
        self.blobs.lock().get(url).map(|r| r.data.clone())
    }
}
