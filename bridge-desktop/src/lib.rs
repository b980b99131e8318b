//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `StateStore` using an SQLite-backed key-value table
//!
//! Desktop hosts have no platform network-quality signal, so no
//! `NetworkInfoSource` is provided here; the core falls back to latency probes.
//! Blob URLs use `bridge_traits::InMemoryBlobRegistry`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteStateStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let store = SqliteStateStore::open_default().await.unwrap();
//!
//!     // Use in core configuration
//! }
//! ```

mod http;
mod state_store;

pub use http::ReqwestHttpClient;
pub use state_store::SqliteStateStore;
