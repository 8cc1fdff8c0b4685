//! Metrics sink and Prometheus recorder wiring.
//!
//! The dispatch pools and the broadcast hub only need two primitives:
//! setting a gauge and observing a duration. [`MetricsSink`] captures that
//! seam so the core never depends on a concrete exporter. The default
//! [`MetricsFacade`] forwards to the `metrics` crate; when no recorder is
//! installed those calls are no-ops, which keeps the core correct without
//! an exporter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Fan-out latency for one broadcast pass (histogram, seconds).
pub const BROADCAST_LATENCY_SECONDS: &str = "realtime_broadcast_latency_seconds";
/// Pending report submissions (gauge).
pub const REPORT_SUBMIT_QUEUE_DEPTH: &str = "report_submit_queue_depth";
/// Pending folio lookups (gauge).
pub const REPORT_LOOKUP_QUEUE_DEPTH: &str = "report_lookup_queue_depth";
/// Pending authentication jobs (gauge).
pub const AUTH_QUEUE_DEPTH: &str = "auth_queue_depth";
/// Pending catalog fetches (gauge).
pub const CATALOG_QUEUE_DEPTH: &str = "catalog_queue_depth";
/// Live WebSocket sessions (gauge).
pub const WS_SESSIONS_ACTIVE: &str = "realtime_sessions_active";

/// Destination for gauge and histogram observations.
pub trait MetricsSink: Send + Sync + 'static {
    /// Sets the gauge `name` to `value`.
    fn set_gauge(&self, name: &str, value: f64);

    /// Records one duration observation into the histogram `name`.
    fn observe_histogram(&self, name: &str, duration: Duration);
}

/// Shared handle to a [`MetricsSink`].
pub type SharedMetrics = Arc<dyn MetricsSink>;

/// Forwards observations to the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsFacade;

impl MetricsSink for MetricsFacade {
    fn set_gauge(&self, name: &str, value: f64) {
        metrics::gauge!(name.to_string()).set(value);
    }

    fn observe_histogram(&self, name: &str, duration: Duration) {
        metrics::histogram!(name.to_string()).record(duration.as_secs_f64());
    }
}

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn set_gauge(&self, _name: &str, _value: f64) {}

    fn observe_histogram(&self, _name: &str, _duration: Duration) {}
}

impl fmt::Debug for dyn MetricsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MetricsSink")
    }
}

/// Returns the default sink backed by the `metrics` facade.
#[must_use]
pub fn facade() -> SharedMetrics {
    Arc::new(MetricsFacade)
}

/// Returns a sink that drops everything.
#[must_use]
pub fn noop() -> SharedMetrics {
    Arc::new(NoopSink)
}

/// Installs the global Prometheus recorder.
///
/// Must be called at most once per process, before any metrics are recorded.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("prometheus metrics recorder installed");
    Ok(handle)
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sink used by unit tests.

    use std::collections::HashMap;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::MetricsSink;

    /// Records every observation for later assertions.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        gauges: Mutex<HashMap<String, f64>>,
        histograms: Mutex<HashMap<String, Vec<Duration>>>,
    }

    impl RecordingSink {
        pub(crate) fn gauge(&self, name: &str) -> Option<f64> {
            self.gauges.lock().get(name).copied()
        }

        pub(crate) fn observations(&self, name: &str) -> usize {
            self.histograms.lock().get(name).map_or(0, Vec::len)
        }
    }

    impl MetricsSink for RecordingSink {
        fn set_gauge(&self, name: &str, value: f64) {
            self.gauges.lock().insert(name.to_string(), value);
        }

        fn observe_histogram(&self, name: &str, duration: Duration) {
            self.histograms
                .lock()
                .entry(name.to_string())
                .or_default()
                .push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn facade_without_recorder_is_harmless() {
        let sink = facade();
        sink.set_gauge(AUTH_QUEUE_DEPTH, 3.0);
        sink.observe_histogram(BROADCAST_LATENCY_SECONDS, Duration::from_millis(2));
    }

    #[test]
    fn recording_sink_keeps_last_gauge_value() {
        let sink = RecordingSink::default();
        sink.set_gauge(REPORT_SUBMIT_QUEUE_DEPTH, 4.0);
        sink.set_gauge(REPORT_SUBMIT_QUEUE_DEPTH, 1.0);
        assert_eq!(sink.gauge(REPORT_SUBMIT_QUEUE_DEPTH), Some(1.0));
        assert_eq!(sink.gauge(REPORT_LOOKUP_QUEUE_DEPTH), None);
    }

    #[test]
    fn recording_sink_counts_histogram_samples() {
        let sink = RecordingSink::default();
        sink.observe_histogram(BROADCAST_LATENCY_SECONDS, Duration::from_micros(10));
        sink.observe_histogram(BROADCAST_LATENCY_SECONDS, Duration::from_micros(20));
        assert_eq!(sink.observations(BROADCAST_LATENCY_SECONDS), 2);
    }
}
