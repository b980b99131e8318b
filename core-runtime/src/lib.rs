//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback engine:
//! - Logging and tracing infrastructure
//! - Configuration and bridge validation
//! - Event bus system
//!
//! Other engine crates depend on this one for their logging conventions and
//! for broadcasting queue, cache and network events.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
