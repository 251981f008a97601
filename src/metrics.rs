//! Prometheus metrics for request handling and dependency probes.
//!
//! This module provides metrics for:
//! - HTTP request latency and counts per bound route
//! - Dependency probe latency and outcomes

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::{debug, info};

use crate::probe::ProbeStatus;

// === Metric Name Constants ===

/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
/// Dependency probe latency metric name.
pub const METRIC_PROBE_LATENCY: &str = "dependency_probe_latency_ms";
/// Dependency probe outcomes counter metric name.
pub const METRIC_PROBE_CHECKS: &str = "dependency_probe_checks_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_PROBE_LATENCY,
        "Dependency probe latency in milliseconds"
    );

    describe_counter!(
        METRIC_HTTP_REQUESTS,
        "Total number of HTTP requests handled by bound routes"
    );
    describe_counter!(
        METRIC_PROBE_CHECKS,
        "Total number of dependency probe calls by outcome"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus exporter on `0.0.0.0:port`.
///
/// Must be called from within a tokio runtime.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

/// Record one handled HTTP request.
pub fn record_http_request(start: Instant, method: &str, endpoint: &str, status: u16) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(latency_ms);
    counter!(
        METRIC_HTTP_REQUESTS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Increment probe outcome counter.
pub fn inc_probe_checks(probe: &str, status: ProbeStatus) {
    counter!(
        METRIC_PROBE_CHECKS,
        "probe" => probe.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for a dependency probe call.
pub fn timer_probe() -> LatencyTimer {
    LatencyTimer::new(METRIC_PROBE_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 9.0); // Allow some tolerance
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        init_metrics();
        record_http_request(Instant::now(), "GET", "/api/healthz", 200);
        inc_probe_checks("self", ProbeStatus::Healthy);
    }
}
