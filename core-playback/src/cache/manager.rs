//! # Streaming Cache
//!
//! In-memory cache of fetched stream bytes keyed by track.
//!
//! This module provides:
//! - Network-aware bitrate selection on miss
//! - One shared fetch per key, however many callers ask concurrently
//! - Cancellation of fetches orphaned by a track change
//! - Least-used eviction under a byte budget, with URL revocation
//! - Periodic expiry sweeps and spaced preloading of upcoming tracks
//!
//! A failed, timed out or cancelled fetch never surfaces as an error: the
//! caller gets the raw source URL and playback streams it directly.

use crate::cache::config::CacheConfig;
use crate::cache::entry::CacheEntry;
use crate::cache::stats::{format_bytes, CacheStats, EvictionOutcome};
use crate::config::NetworkProbeConfig;
use crate::error::{PlaybackError, Result};
use crate::models::StreamQuality;
use crate::network::NetworkMonitor;
use crate::quality::{next_lower_quality, select_optimal_quality};
use crate::traits::QualityResolver;
use bridge_traits::{
    BlobUrlRegistry, Clock, HttpClient, HttpRequest, InMemoryBlobRegistry, SystemClock,
};
use bytes::Bytes;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const KEY_SUFFIX: &str = "_optimized";

/// Cache key for a track.
pub fn cache_key(track_id: &str) -> String {
    format!("{}{}", track_id, KEY_SUFFIX)
}

fn track_id_from_key(key: &str) -> &str {
    key.strip_suffix(KEY_SUFFIX).unwrap_or(key)
}

type SharedFetch = Shared<BoxFuture<'static, String>>;

struct InFlight {
    id: u64,
    token: CancellationToken,
    fetch: SharedFetch,
}

enum Lookup {
    Hit(String),
    Miss,
}

enum Pending {
    Cached(String),
    Fetch(SharedFetch),
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
    fetch_failures: AtomicU64,
    deduplicated: AtomicU64,
}

struct CacheInner {
    config: CacheConfig,
    http: Arc<dyn HttpClient>,
    network: Arc<NetworkMonitor>,
    blobs: Arc<dyn BlobUrlRegistry>,
    clock: Arc<dyn Clock>,
    event_bus: Option<Arc<EventBus>>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_fetch_id: AtomicU64,
    is_preloading: AtomicBool,
    counters: Counters,
}

/// Resets the preload flag however the pass ends.
struct PreloadGuard<'a>(&'a AtomicBool);

impl Drop for PreloadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Adaptive streaming cache.
///
/// Cheap to clone: clones share the same entries and in-flight fetches.
#[derive(Clone)]
pub struct StreamingCache {
    inner: Arc<CacheInner>,
}

/// Builder for [`StreamingCache`].
///
/// Only the HTTP client is required. The network monitor defaults to probing
/// with the same client, the blob registry to [`InMemoryBlobRegistry`] and the
/// clock to [`SystemClock`].
pub struct StreamingCacheBuilder {
    config: CacheConfig,
    http: Option<Arc<dyn HttpClient>>,
    network: Option<Arc<NetworkMonitor>>,
    blobs: Option<Arc<dyn BlobUrlRegistry>>,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<Arc<EventBus>>,
}

impl StreamingCacheBuilder {
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn network_monitor(mut self, network: Arc<NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn blob_registry(mut self, blobs: Arc<dyn BlobUrlRegistry>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<StreamingCache> {
        self.config.validate().map_err(PlaybackError::InvalidConfig)?;

        let http = self.http.ok_or_else(|| {
            PlaybackError::Runtime(core_runtime::Error::CapabilityMissing {
                capability: "HttpClient".to_string(),
                message: "The streaming cache needs an HTTP client to fetch streams."
                    .to_string(),
            })
        })?;

        let network = self.network.unwrap_or_else(|| {
            Arc::new(NetworkMonitor::new(
                NetworkProbeConfig::default(),
                Arc::clone(&http),
            ))
        });

        Ok(StreamingCache {
            inner: Arc::new(CacheInner {
                config: self.config,
                http,
                network,
                blobs: self
                    .blobs
                    .unwrap_or_else(|| Arc::new(InMemoryBlobRegistry::new())),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                event_bus: self.event_bus,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_fetch_id: AtomicU64::new(1),
                is_preloading: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        })
    }
}

impl StreamingCache {
    pub fn builder(config: CacheConfig) -> StreamingCacheBuilder {
        StreamingCacheBuilder {
            config,
            http: None,
            network: None,
            blobs: None,
            clock: None,
            event_bus: None,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.inner.network
    }

    // ========================================================================
    // Lookup and fetch
    // ========================================================================

    /// Playable URL for `track_id`.
    ///
    /// Serves a live cache entry when there is one. Otherwise picks the best
    /// quality for current network conditions and fetches it, sharing the
    /// fetch with any concurrent caller for the same track. Fetch failures
    /// degrade to the quality's raw URL.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoQualityAvailable`] when `qualities` is empty.
    #[instrument(skip(self, qualities), fields(qualities = qualities.len()))]
    pub async fn get_optimized_stream(
        &self,
        track_id: &str,
        qualities: &[StreamQuality],
    ) -> Result<String> {
        if qualities.is_empty() {
            return Err(PlaybackError::NoQualityAvailable(track_id.to_string()));
        }

        let key = cache_key(track_id);
        if let Lookup::Hit(url) = self.lookup(&key) {
            return Ok(url);
        }

        let network = self.inner.network.sample().await;
        let quality = select_optimal_quality(qualities, &network)
            .ok_or_else(|| PlaybackError::NoQualityAvailable(track_id.to_string()))?;

        match self.join_or_start_fetch(&key, quality) {
            Pending::Cached(url) => Ok(url),
            Pending::Fetch(fetch) => Ok(fetch.await),
        }
    }

    fn lookup(&self, key: &str) -> Lookup {
        let now = self.inner.clock.now();
        let ttl = self.inner.config.entry_ttl_chrono();

        let mut entries = self.inner.entries.lock();
        let expired = match entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) => entry.is_expired(now, ttl),
        };

        if expired {
            let removed = entries.remove(key);
            drop(entries);
            if let Some(entry) = removed {
                debug!(key, "Cached stream expired");
                self.inner.counters.expired.fetch_add(1, Ordering::Relaxed);
                self.revoke(&entry.url);
            }
            return Lookup::Miss;
        }

        let Some(entry) = entries.get_mut(key) else {
            return Lookup::Miss;
        };
        entry.access_count += 1;
        let url = entry.url.clone();
        let event = CacheEvent::Hit {
            track_id: track_id_from_key(key).to_string(),
            bitrate: entry.quality.bitrate,
            access_count: entry.access_count,
        };
        drop(entries);

        self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key, "Cache hit");
        self.emit(event);
        Lookup::Hit(url)
    }

    fn join_or_start_fetch(&self, key: &str, quality: StreamQuality) -> Pending {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(existing) = in_flight.get(key) {
            self.inner
                .counters
                .deduplicated
                .fetch_add(1, Ordering::Relaxed);
            debug!(key, "Joining in-flight fetch");
            return Pending::Fetch(existing.fetch.clone());
        }

        // A fetch may have completed while the network was being sampled.
        if let Lookup::Hit(url) = self.lookup(key) {
            return Pending::Cached(url);
        }

        let track_id = track_id_from_key(key).to_string();
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.emit(CacheEvent::Miss {
            track_id: track_id.clone(),
        });

        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let fallback_url = quality.url.clone();

        let handle = tokio::spawn(self.clone().run_fetch(
            key.to_string(),
            quality,
            token.clone(),
            id,
        ));
        let fetch = async move {
            handle.await.unwrap_or_else(|e| {
                warn!("Fetch task for {} failed: {}", track_id, e);
                fallback_url
            })
        }
        .boxed()
        .shared();

        in_flight.insert(
            key.to_string(),
            InFlight {
                id,
                token,
                fetch: fetch.clone(),
            },
        );
        Pending::Fetch(fetch)
    }

    async fn run_fetch(
        self,
        key: String,
        quality: StreamQuality,
        token: CancellationToken,
        id: u64,
    ) -> String {
        let track_id = track_id_from_key(&key).to_string();
        let timeout = self.inner.config.fetch_timeout;
        let request = HttpRequest::get(quality.url.clone()).timeout(timeout);

        debug!(
            track_id = %track_id,
            bitrate = quality.bitrate,
            "Fetching stream"
        );

        let outcome: Result<Bytes> = tokio::select! {
            _ = token.cancelled() => Err(PlaybackError::Cancelled),
            response = tokio::time::timeout(timeout, self.inner.http.execute(request)) => {
                match response {
                    Err(_) => Err(PlaybackError::Timeout(timeout)),
                    Ok(Err(e)) => Err(e.into()),
                    Ok(Ok(resp)) if !resp.is_success() => {
                        Err(PlaybackError::FetchFailed(format!("HTTP {}", resp.status)))
                    }
                    Ok(Ok(resp)) => Ok(resp.body),
                }
            }
        };

        let url = match outcome {
            Ok(body) => match self.cache_stream(&key, body, quality.clone()) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Serving {} uncached: {}", track_id, e);
                    quality.url
                }
            },
            Err(PlaybackError::Cancelled) => {
                debug!(track_id = %track_id, "Fetch cancelled");
                quality.url
            }
            Err(e) => {
                warn!("Stream fetch failed for {}: {}", track_id, e);
                self.inner
                    .counters
                    .fetch_failures
                    .fetch_add(1, Ordering::Relaxed);
                self.emit(CacheEvent::FetchFailed {
                    track_id: track_id.clone(),
                    message: e.to_string(),
                });
                quality.url
            }
        };

        let mut in_flight = self.inner.in_flight.lock();
        if in_flight.get(&key).map(|f| f.id) == Some(id) {
            in_flight.remove(&key);
        }
        url
    }

    /// Cancel every in-flight fetch. Callers awaiting them get the raw URL.
    pub fn cancel_pending_fetches(&self) -> usize {
        let drained: Vec<InFlight> = self
            .inner
            .in_flight
            .lock()
            .drain()
            .map(|(_, f)| f)
            .collect();

        for fetch in &drained {
            fetch.token.cancel();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "Cancelled pending fetches");
        }
        drained.len()
    }

    /// Cancel every in-flight fetch except the one for `track_id`.
    pub fn cancel_pending_fetches_except(&self, track_id: &str) -> usize {
        let keep = cache_key(track_id);
        let mut cancelled = 0;

        self.inner.in_flight.lock().retain(|key, fetch| {
            if *key == keep {
                return true;
            }
            fetch.token.cancel();
            cancelled += 1;
            false
        });

        if cancelled > 0 {
            debug!(count = cancelled, kept = %track_id, "Cancelled orphaned fetches");
        }
        cancelled
    }

    pub fn pending_fetch_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    // ========================================================================
    // Storage and eviction
    // ========================================================================

    /// Store fetched bytes under `key` and return their playable URL.
    ///
    /// Evicts least-used entries first when the new entry would push the
    /// cache over budget. Replacing an existing key revokes its old URL.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::CacheFull`] when `data` alone exceeds the budget, or a
    /// bridge error when the registry cannot mint a URL.
    pub fn cache_stream(&self, key: &str, data: Bytes, quality: StreamQuality) -> Result<String> {
        let size = data.len() as u64;
        let max = self.inner.config.max_cache_size_bytes;
        if size > max {
            return Err(PlaybackError::CacheFull {
                required: size,
                max,
            });
        }

        let url = self
            .inner
            .blobs
            .create_url(data.clone(), &quality.mime_type())?;
        let bitrate = quality.bitrate;

        let (replaced, evicted) = {
            let mut entries = self.inner.entries.lock();
            let replaced = entries.remove(key);

            let total: u64 = entries.values().map(CacheEntry::size).sum();
            let evicted = if total + size > max {
                evict_least_used(&mut entries, size)
            } else {
                Vec::new()
            };

            entries.insert(
                key.to_string(),
                CacheEntry {
                    key: key.to_string(),
                    data,
                    url: url.clone(),
                    timestamp: self.inner.clock.now(),
                    quality,
                    access_count: 0,
                },
            );
            (replaced, evicted)
        };

        if let Some(old) = replaced {
            self.revoke(&old.url);
        }
        self.finish_eviction(&evicted);

        debug!(key, size = %format_bytes(size), bitrate, "Stream cached");
        self.emit(CacheEvent::Stored {
            track_id: track_id_from_key(key).to_string(),
            bitrate,
            size_bytes: size,
        });
        Ok(url)
    }

    /// Evict least-used entries (fewest accesses, then oldest) until at least
    /// `required` bytes are freed or the cache is empty.
    #[instrument(skip(self))]
    pub fn evict_least_used_entries(&self, required: u64) -> EvictionOutcome {
        let evicted = {
            let mut entries = self.inner.entries.lock();
            evict_least_used(&mut entries, required)
        };
        self.finish_eviction(&evicted)
    }

    fn finish_eviction(&self, evicted: &[CacheEntry]) -> EvictionOutcome {
        let mut outcome = EvictionOutcome::default();

        for entry in evicted {
            self.revoke(&entry.url);
            outcome.entries_evicted += 1;
            outcome.bytes_freed += entry.size();
            self.emit(CacheEvent::Evicted {
                key: entry.key.clone(),
                size_bytes: entry.size(),
            });
        }

        if outcome.entries_evicted > 0 {
            self.inner
                .counters
                .evictions
                .fetch_add(outcome.entries_evicted as u64, Ordering::Relaxed);
            info!(
                "Evicted {} entries ({})",
                outcome.entries_evicted,
                format_bytes(outcome.bytes_freed)
            );
        }
        outcome
    }

    /// Remove entries older than the TTL, however often they were used.
    pub fn cleanup_expired_entries(&self) -> usize {
        let now = self.inner.clock.now();
        let ttl = self.inner.config.entry_ttl_chrono();

        let expired: Vec<CacheEntry> = {
            let mut entries = self.inner.entries.lock();
            let keys: Vec<String> = entries
                .values()
                .filter(|e| e.is_expired(now, ttl))
                .map(|e| e.key.clone())
                .collect();
            keys.iter().filter_map(|k| entries.remove(k)).collect()
        };

        for entry in &expired {
            self.revoke(&entry.url);
        }

        let count = expired.len();
        if count > 0 {
            self.inner
                .counters
                .expired
                .fetch_add(count as u64, Ordering::Relaxed);
            info!("Removed {} expired cache entries", count);
            self.emit(CacheEvent::Expired { count });
        }
        count
    }

    /// Sweep expired entries every cleanup interval until `cancel` fires.
    pub fn spawn_cleanup_task(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        let period = self.inner.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Cache cleanup task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.cleanup_expired_entries();
                    }
                }
            }
        })
    }

    /// Drop every entry and revoke its URL.
    pub fn clear_cache(&self) -> usize {
        let drained: Vec<CacheEntry> = self
            .inner
            .entries
            .lock()
            .drain()
            .map(|(_, e)| e)
            .collect();

        for entry in &drained {
            self.revoke(&entry.url);
        }
        info!("Cleared {} cached streams", drained.len());
        drained.len()
    }

    fn revoke(&self, url: &str) {
        if let Err(e) = self.inner.blobs.revoke_url(url) {
            warn!("Failed to revoke cached stream URL {}: {}", url, e);
        }
    }

    // ========================================================================
    // Preload and quality adaptation
    // ========================================================================

    /// Fetch up to `preload_count` of `track_ids` that are not cached yet,
    /// one at a time with a pause in between.
    ///
    /// Only one pass runs at a time; a concurrent call returns 0 at once.
    /// Returns how many of the requested tracks ended up cached.
    #[instrument(skip(self, track_ids, resolver), fields(requested = track_ids.len()))]
    pub async fn preload_next_tracks(
        &self,
        track_ids: &[String],
        resolver: &dyn QualityResolver,
    ) -> usize {
        if self.inner.is_preloading.swap(true, Ordering::AcqRel) {
            debug!("Preload already running");
            return 0;
        }
        let _guard = PreloadGuard(&self.inner.is_preloading);

        let candidates: Vec<&String> = track_ids
            .iter()
            .filter(|id| !self.is_cached(id))
            .take(self.inner.config.preload_count)
            .collect();

        let mut cached = 0;
        for (i, track_id) in candidates.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.inner.config.preload_spacing).await;
            }

            let attempt = tokio::time::timeout(
                self.inner.config.preload_timeout,
                self.preload_one(track_id, resolver),
            )
            .await;

            match attempt {
                Ok(Ok(true)) => cached += 1,
                Ok(Ok(false)) => debug!(track_id = %track_id, "Preload served uncached"),
                Ok(Err(e)) => warn!("Preload failed for {}: {}", track_id, e),
                Err(_) => warn!("Preload timed out for {}", track_id),
            }
        }

        debug!(candidates = candidates.len(), cached, "Preload pass finished");
        self.emit(CacheEvent::PreloadCompleted {
            requested: candidates.len(),
            cached,
        });
        cached
    }

    async fn preload_one(&self, track_id: &str, resolver: &dyn QualityResolver) -> Result<bool> {
        let qualities = resolver.resolve_qualities(track_id).await?;
        self.get_optimized_stream(track_id, &qualities).await?;
        Ok(self.is_cached(track_id))
    }

    /// Lower quality to switch to when the playback buffer runs low.
    ///
    /// `None` while the buffer is healthy, or when the current quality (the
    /// cached one, else what would be selected now) is already the lowest.
    pub async fn adjust_quality_during_playback(
        &self,
        track_id: &str,
        qualities: &[StreamQuality],
        buffer_health_secs: f64,
    ) -> Option<StreamQuality> {
        if buffer_health_secs > self.inner.config.low_buffer_threshold_secs {
            return None;
        }

        let current_bitrate = match self.cached_quality(track_id) {
            Some(quality) => quality.bitrate,
            None => {
                let network = self.inner.network.sample().await;
                select_optimal_quality(qualities, &network)?.bitrate
            }
        };

        let lower = next_lower_quality(qualities, current_bitrate);
        if let Some(q) = &lower {
            info!(
                track_id,
                buffer_health_secs,
                from = current_bitrate,
                to = q.bitrate,
                "Buffer low, advising lower bitrate"
            );
        }
        lower
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// `true` if a live (unexpired) entry exists for `track_id`.
    pub fn is_cached(&self, track_id: &str) -> bool {
        let now = self.inner.clock.now();
        let ttl = self.inner.config.entry_ttl_chrono();
        self.inner
            .entries
            .lock()
            .get(&cache_key(track_id))
            .is_some_and(|e| !e.is_expired(now, ttl))
    }

    pub fn cached_quality(&self, track_id: &str) -> Option<StreamQuality> {
        self.inner
            .entries
            .lock()
            .get(&cache_key(track_id))
            .map(|e| e.quality.clone())
    }

    pub fn total_size(&self) -> u64 {
        self.inner.entries.lock().values().map(CacheEntry::size).sum()
    }

    pub fn stats(&self) -> CacheStats {
        let (entry_count, total_bytes) = {
            let entries = self.inner.entries.lock();
            (entries.len(), entries.values().map(CacheEntry::size).sum())
        };
        let c = &self.inner.counters;

        CacheStats {
            entry_count,
            total_bytes,
            max_bytes: self.inner.config.max_cache_size_bytes,
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expired: c.expired.load(Ordering::Relaxed),
            fetch_failures: c.fetch_failures.load(Ordering::Relaxed),
            deduplicated_requests: c.deduplicated.load(Ordering::Relaxed),
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.inner.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

/// Remove entries in (access_count, timestamp) order until `required` bytes
/// are freed. Caller holds the entries lock.
fn evict_least_used(entries: &mut HashMap<String, CacheEntry>, required: u64) -> Vec<CacheEntry> {
    let mut order: Vec<(u64, chrono::DateTime<chrono::Utc>, String)> = entries
        .values()
        .map(|e| (e.access_count, e.timestamp, e.key.clone()))
        .collect();
    order.sort();

    let mut freed = 0u64;
    let mut evicted = Vec::new();
    for (_, _, key) in order {
        if freed >= required {
            break;
        }
        if let Some(entry) = entries.remove(&key) {
            freed += entry.size();
            evicted.push(entry);
        }
    }
    evicted
}
