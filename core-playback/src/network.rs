//! # Network Monitor
//!
//! Classifies current network conditions for bitrate selection.
//!
//! The platform signal ([`NetworkInfoSource`]) wins whenever it reports
//! something. Without it the monitor measures round-trip time with a `HEAD`
//! probe and maps it to an [`EffectiveType`]. Probe results are reused until
//! they are older than the probe interval.

use crate::config::NetworkProbeConfig;
use bridge_traits::{
    EffectiveType, HttpClient, HttpRequest, NetworkInfo, NetworkInfoSource, RetryPolicy,
};
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Downlink assumed for probe-derived samples. A HEAD probe measures latency,
/// not throughput.
const PROBE_DOWNLINK_MBPS: f64 = 10.0;

/// Map a round-trip time in milliseconds to an effective connection type.
pub fn classify_rtt(rtt_ms: f64) -> EffectiveType {
    if rtt_ms > 2000.0 {
        EffectiveType::Slow2g
    } else if rtt_ms > 1400.0 {
        EffectiveType::Type2g
    } else if rtt_ms > 270.0 {
        EffectiveType::Type3g
    } else {
        EffectiveType::Type4g
    }
}

/// Samples network conditions from the platform or from latency probes.
pub struct NetworkMonitor {
    config: NetworkProbeConfig,
    http: Arc<dyn HttpClient>,
    source: Option<Arc<dyn NetworkInfoSource>>,
    last_probe: Mutex<Option<(Instant, NetworkInfo)>>,
    /// Held while a probe is in flight so concurrent samplers share it.
    probe_gate: tokio::sync::Mutex<()>,
    last_effective: Mutex<Option<EffectiveType>>,
    event_bus: Option<Arc<EventBus>>,
}

impl NetworkMonitor {
    pub fn new(config: NetworkProbeConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http,
            source: None,
            last_probe: Mutex::new(None),
            probe_gate: tokio::sync::Mutex::new(()),
            last_effective: Mutex::new(None),
            event_bus: None,
        }
    }

    /// Prefer the platform signal over probing.
    pub fn with_source(mut self, source: Arc<dyn NetworkInfoSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Current network conditions.
    ///
    /// Never fails: an unreachable probe target yields
    /// [`EffectiveType::Unknown`].
    pub async fn sample(&self) -> NetworkInfo {
        if let Some(info) = self.from_source().await {
            self.observe(&info);
            return info;
        }

        if let Some(info) = self.fresh_probe() {
            return info;
        }

        let _gate = self.probe_gate.lock().await;
        // Another sampler may have probed while this one waited.
        if let Some(info) = self.fresh_probe() {
            return info;
        }
        self.probe().await
    }

    /// Sample again, ignoring any cached probe result.
    pub async fn refresh(&self) -> NetworkInfo {
        if let Some(info) = self.from_source().await {
            self.observe(&info);
            return info;
        }
        let _gate = self.probe_gate.lock().await;
        self.probe().await
    }

    /// Most recent sample without touching the network.
    pub fn last_known(&self) -> Option<NetworkInfo> {
        self.last_probe.lock().as_ref().map(|(_, info)| info.clone())
    }

    /// Refresh conditions every probe interval until `cancel` fires.
    pub fn spawn_probe_loop(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let period = monitor.config.probe_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Network probe loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.refresh().await;
                    }
                }
            }
        })
    }

    fn fresh_probe(&self) -> Option<NetworkInfo> {
        let guard = self.last_probe.lock();
        let (at, info) = guard.as_ref()?;
        (at.elapsed() < self.config.probe_interval).then(|| info.clone())
    }

    async fn from_source(&self) -> Option<NetworkInfo> {
        let source = self.source.as_ref()?;
        match source.current_network_info().await {
            Ok(info) => info,
            Err(e) => {
                debug!("Platform network signal unavailable: {}", e);
                None
            }
        }
    }

    #[instrument(skip(self), fields(url = %self.config.probe_url))]
    async fn probe(&self) -> NetworkInfo {
        let timeout = self.config.probe_timeout;
        let request = HttpRequest::head(self.config.probe_url.clone())
            .no_cache()
            .timeout(timeout);

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            timeout,
            self.http
                .execute_with_retry(request, RetryPolicy::no_retry()),
        )
        .await;

        // Any response, whatever its status, proves the round trip.
        let info = match outcome {
            Ok(Ok(_)) => {
                let rtt_ms = started.elapsed().as_secs_f64() * 1000.0;
                NetworkInfo::new(classify_rtt(rtt_ms), PROBE_DOWNLINK_MBPS, rtt_ms)
            }
            Ok(Err(e)) => {
                warn!("Network probe failed: {}", e);
                NetworkInfo::new(EffectiveType::Unknown, PROBE_DOWNLINK_MBPS, 0.0)
            }
            Err(_) => {
                warn!("Network probe timed out after {:?}", timeout);
                NetworkInfo::new(EffectiveType::Unknown, PROBE_DOWNLINK_MBPS, 0.0)
            }
        };

        *self.last_probe.lock() = Some((Instant::now(), info.clone()));
        self.observe(&info);
        info
    }

    fn observe(&self, info: &NetworkInfo) {
        let changed = {
            let mut last = self.last_effective.lock();
            let changed = *last != Some(info.effective_type);
            *last = Some(info.effective_type);
            changed
        };

        if !changed {
            return;
        }

        info!(
            effective_type = %info.effective_type,
            downlink_mbps = info.downlink_mbps,
            rtt_ms = info.rtt_ms,
            "Network conditions changed"
        );

        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Network(NetworkEvent::ConditionsChanged {
                effective_type: info.effective_type.as_str().to_string(),
                downlink_mbps: info.downlink_mbps,
                rtt_ms: info.rtt_ms,
                save_data: info.save_data,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::HttpResponse;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct DelayedHttp {
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
    }

    impl DelayedHttp {
        fn new(delay: Duration, fail: bool) -> Self {
            Self {
                delay,
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for DelayedHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(BridgeError::OperationFailed("connection refused".into()));
            }
            Ok(HttpResponse {
                status: 204,
                headers: HashMap::new(),
                body: Bytes::new(),
            })
        }
    }

    struct FixedSource(Option<NetworkInfo>);

    #[async_trait]
    impl NetworkInfoSource for FixedSource {
        async fn current_network_info(&self) -> BridgeResult<Option<NetworkInfo>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_classify_rtt_thresholds() {
        assert_eq!(classify_rtt(2500.0), EffectiveType::Slow2g);
        assert_eq!(classify_rtt(1500.0), EffectiveType::Type2g);
        assert_eq!(classify_rtt(1400.0), EffectiveType::Type3g);
        assert_eq!(classify_rtt(300.0), EffectiveType::Type3g);
        assert_eq!(classify_rtt(270.0), EffectiveType::Type4g);
        assert_eq!(classify_rtt(20.0), EffectiveType::Type4g);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_measures_rtt_and_is_reused() {
        let http = Arc::new(DelayedHttp::new(Duration::from_millis(500), false));
        let monitor = NetworkMonitor::new(NetworkProbeConfig::default(), http.clone());

        let info = monitor.sample().await;
        assert_eq!(info.effective_type, EffectiveType::Type3g);
        assert_eq!(info.downlink_mbps, 10.0);

        // Fresh probe is reused.
        monitor.sample().await;
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        monitor.sample().await;
        assert_eq!(http.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_yields_unknown() {
        let http = Arc::new(DelayedHttp::new(Duration::from_secs(30), false));
        let monitor = NetworkMonitor::new(NetworkProbeConfig::default(), http);

        let info = monitor.sample().await;
        assert_eq!(info.effective_type, EffectiveType::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_samples_share_one_probe() {
        let http = Arc::new(DelayedHttp::new(Duration::from_millis(100), false));
        let monitor = NetworkMonitor::new(NetworkProbeConfig::default(), http.clone());

        let (a, b, c) = tokio::join!(monitor.sample(), monitor.sample(), monitor.sample());

        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[tokio::test]
    async fn test_probe_failure_yields_unknown() {
        let http = Arc::new(DelayedHttp::new(Duration::ZERO, true));
        let monitor = NetworkMonitor::new(NetworkProbeConfig::default(), http);

        assert_eq!(monitor.sample().await.effective_type, EffectiveType::Unknown);
        assert!(monitor.last_known().is_some());
    }

    #[tokio::test]
    async fn test_platform_source_wins() {
        let http = Arc::new(DelayedHttp::new(Duration::ZERO, false));
        let reported = NetworkInfo::new(EffectiveType::Type2g, 0.3, 1500.0).with_save_data(true);
        let monitor = NetworkMonitor::new(NetworkProbeConfig::default(), http.clone())
            .with_source(Arc::new(FixedSource(Some(reported.clone()))));

        assert_eq!(monitor.sample().await, reported);
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_silent_source_falls_back_to_probe() {
        let http = Arc::new(DelayedHttp::new(Duration::ZERO, false));
        let monitor = NetworkMonitor::new(NetworkProbeConfig::default(), http.clone())
            .with_source(Arc::new(FixedSource(None)));

        assert_eq!(monitor.sample().await.effective_type, EffectiveType::Type4g);
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conditions_changed_emitted_once_per_change() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let http = Arc::new(DelayedHttp::new(Duration::ZERO, false));
        let monitor =
            NetworkMonitor::new(NetworkProbeConfig::default(), http).with_event_bus(bus.clone());

        monitor.refresh().await;
        monitor.refresh().await;

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event,
            CoreEvent::Network(NetworkEvent::ConditionsChanged { ref effective_type, .. })
                if effective_type == "4g"
        ));
        assert!(rx.try_recv().is_err());
    }
}
