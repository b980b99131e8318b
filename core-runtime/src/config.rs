//! # Core Configuration Module
//!
//! Holds the platform bridges the playback engine needs and validates them
//! up front.
//!
//! ## Required Dependencies
//!
//! - `StateStore` - Durable store for queue persistence
//! - `HttpClient` - Stream fetches and latency probes (desktop default: reqwest)
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `BlobUrlRegistry` - Cached-bytes URLs (default: `InMemoryBlobRegistry`)
//! - `Clock` - Cache timestamps (default: `SystemClock`)
//! - `NetworkInfoSource` - Platform network signal (default: none, probes only)
//!
//! When the `desktop-shims` feature is enabled, a `ReqwestHttpClient` is
//! injected automatically if no HTTP client is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use bridge_desktop::SqliteStateStore;
//! use std::sync::Arc;
//!
//! let store = SqliteStateStore::open_default().await?;
//! let config = CoreConfig::builder()
//!     .state_store(Arc::new(store))
//!     .enable_preload(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder fails fast with `Error::CapabilityMissing` naming the missing
//! bridge and how to supply it.

use crate::error::{Error, Result};
use bridge_traits::{
    BlobUrlRegistry, Clock, HttpClient, InMemoryBlobRegistry, NetworkInfoSource, StateStore,
    SystemClock,
};
use std::sync::Arc;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Core configuration for the playback engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Durable key-value store for queue persistence (required)
    pub state_store: Arc<dyn StateStore>,

    /// HTTP client for stream fetches and probes (required, desktop default)
    pub http_client: Arc<dyn HttpClient>,

    /// Registry turning cached bytes into playable URLs
    pub blob_registry: Arc<dyn BlobUrlRegistry>,

    /// Time source for cache entry ages
    pub clock: Arc<dyn Clock>,

    /// Platform network quality signal (optional)
    pub network_source: Option<Arc<dyn NetworkInfoSource>>,

    /// Event bus channel capacity
    pub event_buffer_size: usize,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("state_store", &"StateStore { ... }")
            .field("http_client", &"HttpClient { ... }")
            .field("blob_registry", &"BlobUrlRegistry { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "network_source",
                &self
                    .network_source
                    .as_ref()
                    .map(|_| "NetworkInfoSource { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional background behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Preload upcoming tracks after each track change
    pub enable_preload: bool,

    /// Run periodic latency probes when no platform network signal is available
    pub enable_network_probing: bool,

    /// Periodically sweep expired cache entries
    pub enable_cache_cleanup: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_preload: true,
            enable_network_probing: true,
            enable_cache_cleanup: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// Checks that the event buffer size is within `1..=10_000`.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 10_000 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 10,000 events".to_string(),
            ));
        }

        Ok(())
    }
}

fn state_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "StateStore".to_string(),
        message: "StateStore implementation is required for queue persistence. \
                 Desktop: use bridge_desktop::SqliteStateStore. \
                 Mobile: inject platform-native storage (UserDefaults/DataStore). \
                 Web: inject a localStorage-backed store."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for stream fetches and network probes. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Mobile/Web: inject the platform HTTP stack."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    state_store: Option<Arc<dyn StateStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    blob_registry: Option<Arc<dyn BlobUrlRegistry>>,
    clock: Option<Arc<dyn Clock>>,
    network_source: Option<Arc<dyn NetworkInfoSource>>,
    event_buffer_size: Option<usize>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    /// Sets the durable state store (required).
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the blob URL registry. Default: [`InMemoryBlobRegistry`].
    pub fn blob_registry(mut self, registry: Arc<dyn BlobUrlRegistry>) -> Self {
        self.blob_registry = Some(registry);
        self
    }

    /// Sets the clock. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the platform network information source (optional).
    pub fn network_source(mut self, source: Arc<dyn NetworkInfoSource>) -> Self {
        self.network_source = Some(source);
        self
    }

    /// Sets the event bus buffer size.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn enable_preload(mut self, enabled: bool) -> Self {
        self.features.get_or_insert_with(FeatureFlags::default).enable_preload = enabled;
        self
    }

    pub fn enable_network_probing(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_network_probing = enabled;
        self
    }

    pub fn enable_cache_cleanup(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_cache_cleanup = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` if no `StateStore` was provided, or no
    ///   `HttpClient` was provided without the `desktop-shims` feature
    /// - `Config` if values are out of range
    pub fn build(self) -> Result<CoreConfig> {
        let state_store = self.state_store.ok_or_else(state_store_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            state_store,
            http_client,
            blob_registry: self
                .blob_registry
                .unwrap_or_else(|| Arc::new(InMemoryBlobRegistry::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            network_source: self.network_source,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
