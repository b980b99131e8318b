//! # Host Bridge Traits
//!
//! Platform abstraction traits that the playback engine core consumes but does
//! not implement itself.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and the host application.
//! Each trait represents a capability the queue manager or the streaming cache
//! needs, but that is provided differently per platform (desktop, mobile, web).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//! - [`NetworkInfoSource`](network::NetworkInfoSource) - Platform network quality signal
//!
//! ### Storage
//! - [`StateStore`](storage::StateStore) - Durable key-value blob store used for queue persistence
//! - [`BlobUrlRegistry`](blob::BlobUrlRegistry) - Turns owned cached bytes into revocable URLs
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let store = config.state_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "StateStore".to_string(),
//!         message: "No durable store provided. \
//!                  Desktop: use bridge_desktop::SqliteStateStore.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert their native errors into it and keep the
//! message actionable (URL, key, status code).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across tokio tasks behind an `Arc`.

pub mod blob;
pub mod error;
pub mod http;
pub mod network;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use blob::{BlobUrlRegistry, InMemoryBlobRegistry};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use network::{EffectiveType, NetworkInfo, NetworkInfoSource};
pub use storage::StateStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
