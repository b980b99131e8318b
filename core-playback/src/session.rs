//! # Playback Session
//!
//! Wires the queue, the streaming cache and the quality resolver together for
//! one listening session.
//!
//! A session answers "what plays now, and from which URL". Moving through the
//! queue cancels fetches for tracks that are no longer current and kicks off a
//! background preload of what comes next.

use crate::cache::StreamingCache;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::Track;
use crate::network::NetworkMonitor;
use crate::queue::QueueManager;
use crate::traits::QualityResolver;
use core_runtime::config::{CoreConfig, FeatureFlags};
use core_runtime::events::{CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// What the player should load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    pub track: Track,
    /// Cached blob URL, or the raw stream URL when caching was not possible.
    pub url: String,
    pub should_crossfade: bool,
}

pub struct PlaybackSession {
    queue: Arc<QueueManager>,
    cache: StreamingCache,
    resolver: Arc<dyn QualityResolver>,
    event_bus: Arc<EventBus>,
    features: FeatureFlags,
    preload_task: Mutex<Option<(JoinHandle<usize>, CancellationToken)>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl PlaybackSession {
    /// Build a session from host capabilities and engine settings.
    ///
    /// # Errors
    ///
    /// Fails when either configuration is invalid.
    pub fn new(
        core: &CoreConfig,
        engine: EngineConfig,
        resolver: Arc<dyn QualityResolver>,
    ) -> Result<Self> {
        core.validate()?;
        engine.validate()?;

        let event_bus = Arc::new(EventBus::new(core.event_buffer_size));

        let mut network = NetworkMonitor::new(engine.network, Arc::clone(&core.http_client))
            .with_event_bus(Arc::clone(&event_bus));
        if let Some(source) = &core.network_source {
            network = network.with_source(Arc::clone(source));
        }

        let cache = StreamingCache::builder(engine.cache)
            .http_client(Arc::clone(&core.http_client))
            .network_monitor(Arc::new(network))
            .blob_registry(Arc::clone(&core.blob_registry))
            .clock(Arc::clone(&core.clock))
            .event_bus(Arc::clone(&event_bus))
            .build()?;

        let queue = QueueManager::new(engine.queue)
            .with_event_bus(Arc::clone(&event_bus))
            .with_store(Arc::clone(&core.state_store));

        info!("Playback session created");
        Ok(Self::from_parts(Arc::new(queue), cache, resolver, event_bus)
            .with_features(core.features))
    }

    /// Assemble a session from already-built components.
    pub fn from_parts(
        queue: Arc<QueueManager>,
        cache: StreamingCache,
        resolver: Arc<dyn QualityResolver>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            queue,
            cache,
            resolver,
            event_bus,
            features: FeatureFlags::default(),
            preload_task: Mutex::new(None),
            background: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Start the network probe loop and the cache expiry sweep, as enabled
    /// by the feature flags. Both stop on [`shutdown`](Self::shutdown).
    pub fn start_background_tasks(&self) {
        let mut background = self.background.lock();
        if !background.is_empty() {
            return;
        }

        if self.features.enable_network_probing {
            background.push(
                self.cache
                    .network()
                    .spawn_probe_loop(self.cancel.child_token()),
            );
        }
        if self.features.enable_cache_cleanup {
            background.push(self.cache.spawn_cleanup_task(self.cancel.child_token()));
        }
        debug!(tasks = background.len(), "Background tasks started");
    }

    pub fn queue(&self) -> &Arc<QueueManager> {
        &self.queue
    }

    pub fn cache(&self) -> &StreamingCache {
        &self.cache
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Advance the queue and resolve the new track's URL.
    ///
    /// `Ok(None)` when the queue is empty or exhausted.
    #[instrument(skip(self))]
    pub async fn play_next(&self) -> Result<Option<PlaybackItem>> {
        let next = self.queue.next_track();
        let Some(track) = next.track else {
            return Ok(None);
        };
        self.load(track, next.should_crossfade).await.map(Some)
    }

    /// Step back and resolve the track's URL. Manual back-navigation never
    /// crossfades.
    #[instrument(skip(self))]
    pub async fn play_previous(&self) -> Result<Option<PlaybackItem>> {
        let Some(track) = self.queue.previous_track() else {
            return Ok(None);
        };
        self.load(track, false).await.map(Some)
    }

    /// Resolve the URL of the current track without moving the cursor.
    pub async fn current_item(&self) -> Result<Option<PlaybackItem>> {
        let Some(track) = self.queue.current_track() else {
            return Ok(None);
        };
        self.load(track, false).await.map(Some)
    }

    /// Report how many seconds of the current track are buffered.
    ///
    /// Returns a lower-bitrate item to switch to when the cache advises one.
    pub async fn on_buffer_health(&self, buffered_secs: f64) -> Result<Option<PlaybackItem>> {
        let Some(track) = self.queue.current_track() else {
            return Ok(None);
        };

        let qualities = self.resolver.resolve_qualities(&track.id).await?;
        let Some(lower) = self
            .cache
            .adjust_quality_during_playback(&track.id, &qualities, buffered_secs)
            .await
        else {
            return Ok(None);
        };

        Ok(Some(PlaybackItem {
            track,
            url: lower.url,
            should_crossfade: false,
        }))
    }

    async fn load(&self, track: Track, should_crossfade: bool) -> Result<PlaybackItem> {
        self.cache.cancel_pending_fetches_except(&track.id);

        let qualities = self.resolver.resolve_qualities(&track.id).await?;
        let url = self.cache.get_optimized_stream(&track.id, &qualities).await?;

        self.schedule_preload();
        Ok(PlaybackItem {
            track,
            url,
            should_crossfade,
        })
    }

    /// Start preloading the upcoming window, superseding any pass still
    /// working on the previous one.
    fn schedule_preload(&self) {
        if !self.features.enable_preload {
            return;
        }

        let mut slot = self.preload_task.lock();
        let previous = slot.take().map(|(task, token)| {
            token.cancel();
            task
        });

        let upcoming = self.queue.upcoming_ids();
        if upcoming.is_empty() {
            return;
        }

        debug!(upcoming = upcoming.len(), "Preload scheduled");
        let cache = self.cache.clone();
        let resolver = Arc::clone(&self.resolver);
        let cancel = self.cancel.child_token();
        let pass = cancel.clone();
        let task = tokio::spawn(async move {
            // The superseded pass holds the preload flag until it stops.
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            tokio::select! {
                _ = pass.cancelled() => 0,
                cached = cache.preload_next_tracks(&upcoming, resolver.as_ref()) => cached,
            }
        });
        *slot = Some((task, cancel));
    }

    /// Wait for the current background preload, if any. Returns how many
    /// tracks it cached.
    pub async fn wait_for_preload(&self) -> usize {
        let task = self.preload_task.lock().take();
        match task {
            Some((task, _)) => task.await.unwrap_or(0),
            None => 0,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop background work, cancel pending fetches and persist the queue.
    ///
    /// Returns whether the queue was saved.
    pub async fn shutdown(&self) -> bool {
        self.cancel.cancel();
        self.cache.cancel_pending_fetches();

        let tasks: Vec<JoinHandle<()>> = self.background.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        self.wait_for_preload().await;

        let saved = self.queue.save_state().await;
        info!(saved, "Playback session shut down");
        saved
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
