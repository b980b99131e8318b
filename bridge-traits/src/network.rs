//! Network Quality Abstraction
//!
//! Provides the coarse network-quality signal used to pick streaming bitrates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Coarse network-quality classification.
///
/// Mirrors the effective connection types reported by platform network APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    Type2g,
    #[serde(rename = "3g")]
    Type3g,
    #[serde(rename = "4g")]
    Type4g,
    #[serde(rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveType::Slow2g => "slow-2g",
            EffectiveType::Type2g => "2g",
            EffectiveType::Type3g => "3g",
            EffectiveType::Type4g => "4g",
            EffectiveType::Unknown => "unknown",
        }
    }

    /// Parse a platform-reported type string. Unrecognized values map to
    /// [`EffectiveType::Unknown`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => EffectiveType::Slow2g,
            "2g" => EffectiveType::Type2g,
            "3g" => EffectiveType::Type3g,
            "4g" => EffectiveType::Type4g,
            _ => EffectiveType::Unknown,
        }
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of current network conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub effective_type: EffectiveType,
    /// Estimated downlink bandwidth in megabits per second
    pub downlink_mbps: f64,
    /// Estimated round-trip time in milliseconds
    pub rtt_ms: f64,
    /// User asked the platform to reduce data usage
    pub save_data: bool,
}

impl NetworkInfo {
    pub fn new(effective_type: EffectiveType, downlink_mbps: f64, rtt_ms: f64) -> Self {
        Self {
            effective_type,
            downlink_mbps,
            rtt_ms,
            save_data: false,
        }
    }

    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }
}

impl Default for NetworkInfo {
    /// Optimistic default used before the first sample: a fast connection
    /// with no data-saver preference.
    fn default() -> Self {
        Self::new(EffectiveType::Type4g, 10.0, 50.0)
    }
}

/// Platform network signal.
///
/// Hosts that expose a network information API (mobile OS, browsers with the
/// Network Information API) implement this. When no source is configured, or
/// the source reports `None`, the core falls back to timed latency probes.
///
/// # Platform Support
///
/// - **Android**: ConnectivityManager link bandwidth estimates
/// - **iOS**: NWPathMonitor (expensive/constrained flags map to `save_data`)
/// - **Web**: `navigator.connection`
/// - **Desktop**: usually unavailable
#[async_trait]
pub trait NetworkInfoSource: Send + Sync {
    /// Current network conditions, or `None` if the platform does not know.
    async fn current_network_info(&self) -> Result<Option<NetworkInfo>>;
}
