//! Streaming cache tests
//!
//! Uses a fake CDN that counts GET and HEAD requests, a fixed platform network signal,
//! a manual clock for expiry and the in-memory blob registry.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BlobUrlRegistry, EffectiveType, HttpClient, HttpMethod, HttpRequest, HttpResponse,
    InMemoryBlobRegistry, ManualClock, NetworkInfo, NetworkInfoSource,
};
use bytes::Bytes;
use core_playback::{
    CacheConfig, NetworkMonitor, NetworkProbeConfig, PlaybackError, QualityResolver,
    StreamQuality, StreamingCache,
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MB: usize = 1024 * 1024;

// ============================================================================
// Fakes
// ============================================================================

struct FakeCdn {
    gets: AtomicUsize,
    heads: AtomicUsize,
    requested: Mutex<Vec<String>>,
    bodies: Mutex<HashMap<String, Bytes>>,
    delay: Duration,
    status: u16,
}

impl FakeCdn {
    fn new() -> Self {
        Self {
            gets: AtomicUsize::new(0),
            heads: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            bodies: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            status: 200,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    fn serve(&self, url: &str, body: Bytes) {
        self.bodies.lock().insert(url.to_string(), body);
    }

    fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeCdn {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        if request.method == HttpMethod::Head {
            self.heads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            return Ok(HttpResponse {
                status: 204,
                headers: HashMap::new(),
                body: Bytes::new(),
            });
        }

        self.gets.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(request.url.clone());
        tokio::time::sleep(self.delay).await;

        let body = self
            .bodies
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Bytes::from_static(b"audio-bytes"));

        Ok(HttpResponse {
            status: self.status,
            headers: HashMap::new(),
            body,
        })
    }
}

struct FixedNetwork(NetworkInfo);

#[async_trait]
impl NetworkInfoSource for FixedNetwork {
    async fn current_network_info(&self) -> BridgeResult<Option<NetworkInfo>> {
        Ok(Some(self.0.clone()))
    }
}

struct LadderResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl QualityResolver for LadderResolver {
    async fn resolve_qualities(&self, track_id: &str) -> core_playback::Result<Vec<StreamQuality>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if track_id == "broken" {
            return Err(PlaybackError::ResolverFailed {
                track_id: track_id.to_string(),
                message: "source unavailable".to_string(),
            });
        }
        Ok(ladder(track_id))
    }
}

struct Harness {
    cache: StreamingCache,
    cdn: Arc<FakeCdn>,
    blobs: Arc<InMemoryBlobRegistry>,
    clock: Arc<ManualClock>,
    bus: Arc<EventBus>,
}

fn harness(cdn: FakeCdn, config: CacheConfig, network: NetworkInfo) -> Harness {
    let cdn = Arc::new(cdn);
    let blobs = Arc::new(InMemoryBlobRegistry::new());
    let clock = Arc::new(ManualClock::default());
    let bus = Arc::new(EventBus::new(256));

    let monitor = NetworkMonitor::new(NetworkProbeConfig::default(), cdn.clone())
        .with_source(Arc::new(FixedNetwork(network)));

    let cache = StreamingCache::builder(config)
        .http_client(cdn.clone())
        .network_monitor(Arc::new(monitor))
        .blob_registry(blobs.clone())
        .clock(clock.clone())
        .event_bus(bus.clone())
        .build()
        .unwrap();

    Harness {
        cache,
        cdn,
        blobs,
        clock,
        bus,
    }
}

fn fast() -> NetworkInfo {
    NetworkInfo::new(EffectiveType::Type4g, 10.0, 50.0)
}

fn ladder(track_id: &str) -> Vec<StreamQuality> {
    [320, 192, 128, 64]
        .into_iter()
        .map(|b| StreamQuality::new(b, "webm", format!("https://cdn.test/{track_id}/{b}")))
        .collect()
}

// ============================================================================
// Hits and misses
// ============================================================================

#[tokio::test]
async fn test_miss_then_hit() {
    let h = harness(FakeCdn::new(), CacheConfig::default(), fast());

    let first = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    assert!(first.starts_with("blob:"));
    assert_eq!(h.blobs.resolve(&first), Some(Bytes::from_static(b"audio-bytes")));

    let second = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.cdn.get_count(), 1);

    let stats = h.cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entry_count, 1);
}

#[tokio::test]
async fn test_empty_quality_list_is_an_error() {
    let h = harness(FakeCdn::new(), CacheConfig::default(), fast());
    let err = h.cache.get_optimized_stream("a", &[]).await.unwrap_err();
    assert!(matches!(err, PlaybackError::NoQualityAvailable(id) if id == "a"));
}

#[tokio::test]
async fn test_network_drives_selected_bitrate() {
    let slow_3g = NetworkInfo::new(EffectiveType::Type3g, 0.8, 400.0);
    let h = harness(FakeCdn::new(), CacheConfig::default(), slow_3g);

    h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();

    assert_eq!(
        h.cdn.requested.lock().as_slice(),
        &["https://cdn.test/a/128".to_string()]
    );
    assert_eq!(h.cache.cached_quality("a").unwrap().bitrate, 128);
}

#[tokio::test]
async fn test_data_saver_fetches_lowest() {
    let saver = fast().with_save_data(true);
    let h = harness(FakeCdn::new(), CacheConfig::default(), saver);

    h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    assert_eq!(h.cache.cached_quality("a").unwrap().bitrate, 64);
}

// ============================================================================
// Eviction and expiry
// ============================================================================

#[tokio::test]
async fn test_second_large_entry_evicts_first() {
    let cdn = FakeCdn::new();
    cdn.serve("https://cdn.test/a/320", Bytes::from(vec![1u8; 60 * MB]));
    cdn.serve("https://cdn.test/b/320", Bytes::from(vec![2u8; 50 * MB]));
    let h = harness(cdn, CacheConfig::default(), fast());

    let url_a = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(5));
    let url_b = h.cache.get_optimized_stream("b", &ladder("b")).await.unwrap();

    assert!(h.blobs.resolve(&url_a).is_none());
    assert!(h.blobs.resolve(&url_b).is_some());
    assert!(!h.cache.is_cached("a"));
    assert!(h.cache.is_cached("b"));
    assert_eq!(h.cache.total_size(), (50 * MB) as u64);
    assert_eq!(h.cache.stats().evictions, 1);
}

#[tokio::test]
async fn test_oversize_stream_served_uncached() {
    let cdn = FakeCdn::new();
    cdn.serve("https://cdn.test/a/320", Bytes::from(vec![0u8; 2048]));
    let h = harness(cdn, CacheConfig::default().with_max_size(1024), fast());

    let url = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    assert_eq!(url, "https://cdn.test/a/320");
    assert!(!h.cache.is_cached("a"));
    assert_eq!(h.blobs.live_count(), 0);
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let h = harness(FakeCdn::new(), CacheConfig::default(), fast());

    let old = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    h.clock.advance(chrono::Duration::hours(25));
    assert!(!h.cache.is_cached("a"));

    let fresh = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    assert_ne!(old, fresh);
    assert!(h.blobs.resolve(&old).is_none());
    assert_eq!(h.cdn.get_count(), 2);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_server_error_degrades_to_raw_url() {
    let h = harness(
        FakeCdn::new().with_status(503),
        CacheConfig::default(),
        fast(),
    );
    let mut events = h.bus.subscribe();

    let url = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    assert_eq!(url, "https://cdn.test/a/320");
    assert!(!h.cache.is_cached("a"));
    assert_eq!(h.cache.stats().fetch_failures, 1);
    assert_eq!(h.cache.pending_fetch_count(), 0);

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Cache(CacheEvent::FetchFailed { track_id, .. }) = event {
            assert_eq!(track_id, "a");
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_times_out_to_raw_url() {
    let h = harness(
        FakeCdn::new().with_delay(Duration::from_secs(120)),
        CacheConfig::default(),
        fast(),
    );

    let url = h.cache.get_optimized_stream("a", &ladder("a")).await.unwrap();
    assert_eq!(url, "https://cdn.test/a/320");
    assert!(!h.cache.is_cached("a"));
}

// ============================================================================
// Deduplication and cancellation
// ============================================================================

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let h = harness(
        FakeCdn::new().with_delay(Duration::from_millis(50)),
        CacheConfig::default(),
        fast(),
    );
    let qualities = ladder("a");

    let (first, second) = tokio::join!(
        h.cache.get_optimized_stream("a", &qualities),
        h.cache.get_optimized_stream("a", &qualities),
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(h.cdn.get_count(), 1);
    assert_eq!(h.cache.stats().deduplicated_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cold_callers_share_one_probe() {
    let cdn = Arc::new(FakeCdn::new().with_delay(Duration::from_millis(50)));
    let cache = StreamingCache::builder(CacheConfig::default())
        .http_client(cdn.clone())
        .build()
        .unwrap();
    let qualities = ladder("a");

    let (first, second, third) = tokio::join!(
        cache.get_optimized_stream("a", &qualities),
        cache.get_optimized_stream("a", &qualities),
        cache.get_optimized_stream("a", &qualities),
    );

    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(first, third.unwrap());
    assert_eq!(cdn.head_count(), 1);
    assert_eq!(cdn.get_count(), 1);
}

#[tokio::test]
async fn test_cancel_pending_fetches_returns_raw_url() {
    let h = harness(
        FakeCdn::new().with_delay(Duration::from_secs(30)),
        CacheConfig::default(),
        fast(),
    );

    let cache = h.cache.clone();
    let task = tokio::spawn(async move { cache.get_optimized_stream("a", &ladder("a")).await });

    while h.cache.pending_fetch_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.cache.cancel_pending_fetches(), 1);

    let url = task.await.unwrap().unwrap();
    assert_eq!(url, "https://cdn.test/a/320");
    assert!(!h.cache.is_cached("a"));
    assert_eq!(h.cache.stats().fetch_failures, 0);
}

#[tokio::test]
async fn test_cancel_except_keeps_current_track() {
    let h = harness(
        FakeCdn::new().with_delay(Duration::from_millis(100)),
        CacheConfig::default(),
        fast(),
    );

    let (a, b) = (h.cache.clone(), h.cache.clone());
    let task_a = tokio::spawn(async move { a.get_optimized_stream("a", &ladder("a")).await });
    let task_b = tokio::spawn(async move { b.get_optimized_stream("b", &ladder("b")).await });

    while h.cache.pending_fetch_count() < 2 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.cache.cancel_pending_fetches_except("b"), 1);

    assert_eq!(task_a.await.unwrap().unwrap(), "https://cdn.test/a/320");
    assert!(task_b.await.unwrap().unwrap().starts_with("blob:"));
    assert!(h.cache.is_cached("b"));
}

// ============================================================================
// Preload
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_preload_caches_up_to_three_uncached_tracks() {
    let h = harness(FakeCdn::new(), CacheConfig::default(), fast());
    let resolver = LadderResolver {
        calls: AtomicUsize::new(0),
    };

    h.cache.get_optimized_stream("t1", &ladder("t1")).await.unwrap();

    let upcoming: Vec<String> = ["t1", "t2", "t3", "t4", "t5"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let cached = h.cache.preload_next_tracks(&upcoming, &resolver).await;

    assert_eq!(cached, 3);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    for id in ["t2", "t3", "t4"] {
        assert!(h.cache.is_cached(id), "{id} should be preloaded");
    }
    assert!(!h.cache.is_cached("t5"));
}

#[tokio::test(start_paused = true)]
async fn test_preload_spaces_out_fetches() {
    let config = CacheConfig::default();
    let spacing = config.preload_spacing;
    let h = harness(FakeCdn::new(), config, fast());
    let resolver = LadderResolver {
        calls: AtomicUsize::new(0),
    };
    let upcoming: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();

    let started = tokio::time::Instant::now();
    let cached = h.cache.preload_next_tracks(&upcoming, &resolver).await;
    let elapsed = started.elapsed();

    assert_eq!(cached, 3);
    assert_eq!(h.cdn.get_count(), 3);
    assert!(elapsed >= spacing * 2, "preloads ran back to back: {elapsed:?}");
    assert!(elapsed < spacing * 3, "too much delay: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_preload_tolerates_resolver_failure() {
    let h = harness(FakeCdn::new(), CacheConfig::default(), fast());
    let resolver = LadderResolver {
        calls: AtomicUsize::new(0),
    };

    let upcoming = vec!["broken".to_string(), "ok".to_string()];
    let cached = h.cache.preload_next_tracks(&upcoming, &resolver).await;

    assert_eq!(cached, 1);
    assert!(h.cache.is_cached("ok"));
}

#[tokio::test(start_paused = true)]
async fn test_only_one_preload_pass_at_a_time() {
    let h = harness(
        FakeCdn::new().with_delay(Duration::from_millis(200)),
        CacheConfig::default(),
        fast(),
    );
    let resolver = LadderResolver {
        calls: AtomicUsize::new(0),
    };
    let upcoming = vec!["x".to_string(), "y".to_string()];

    let (first, second) = tokio::join!(
        h.cache.preload_next_tracks(&upcoming, &resolver),
        h.cache.preload_next_tracks(&upcoming, &resolver),
    );

    assert_eq!(first + second, 2);
    assert!(first == 0 || second == 0);
}
