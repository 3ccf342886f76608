//! Prometheus metrics
//!
//! Every series carries a `provider` label. Recording is a no-op until
//! [`init_metrics`] installs the exporter.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Inbound frames seen by a ready bridge
    FramesReceived,
    /// Frames that decoded to nothing
    FramesIgnored,
    /// Price results delivered
    PriceResults,
    /// Error results delivered
    ErrorResults,
    /// Results dropped because the consumer fell behind
    ResultsDropped,
    /// Subscribe frames sent
    Subscribes,
    /// Unsubscribe frames sent
    Unsubscribes,
    /// Handshakes that failed or timed out
    HandshakeFailures,
    /// Reconnection attempts
    Reconnects,
    /// REST fallback requests that failed
    RestErrors,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Keys subscribed on the current connection
    ActiveSubscriptions,
    /// Entries held by the result cache
    CachedResults,
}

/// Latency metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMetric {
    /// Connect to ready
    Handshake,
    /// REST fallback round trip
    RestRequest,
}

impl CounterMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::FramesReceived => "price_bridge_frames_received_total",
            CounterMetric::FramesIgnored => "price_bridge_frames_ignored_total",
            CounterMetric::PriceResults => "price_bridge_price_results_total",
            CounterMetric::ErrorResults => "price_bridge_error_results_total",
            CounterMetric::ResultsDropped => "price_bridge_results_dropped_total",
            CounterMetric::Subscribes => "price_bridge_subscribes_total",
            CounterMetric::Unsubscribes => "price_bridge_unsubscribes_total",
            CounterMetric::HandshakeFailures => "price_bridge_handshake_failures_total",
            CounterMetric::Reconnects => "price_bridge_reconnects_total",
            CounterMetric::RestErrors => "price_bridge_rest_errors_total",
        }
    }
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::ActiveSubscriptions => "price_bridge_active_subscriptions",
            GaugeMetric::CachedResults => "price_bridge_cached_results",
        }
    }
}

impl LatencyMetric {
    pub fn name(&self) -> &'static str {
        match self {
            LatencyMetric::Handshake => "price_bridge_handshake_latency_ms",
            LatencyMetric::RestRequest => "price_bridge_rest_request_latency_ms",
        }
    }
}

/// Install the Prometheus recorder and serve `/metrics` on `port`
///
/// Must be called from inside a tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    describe_counter!(
        CounterMetric::FramesReceived.name(),
        "Inbound frames received by ready bridges"
    );
    describe_counter!(
        CounterMetric::ResultsDropped.name(),
        "Results dropped because the consumer channel was full"
    );
    describe_counter!(CounterMetric::Reconnects.name(), "Reconnection attempts");
    describe_gauge!(
        GaugeMetric::ActiveSubscriptions.name(),
        "Keys subscribed on the current connection"
    );
    describe_histogram!(
        LatencyMetric::Handshake.name(),
        "Milliseconds from connect to provider ready"
    );

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric, provider: &'static str) {
    counter!(metric.name(), "provider" => provider).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, provider: &'static str, value: f64) {
    gauge!(metric.name(), "provider" => provider).set(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, provider: &'static str, duration: Duration) {
    let value_ms = duration.as_secs_f64() * 1_000.0;
    histogram!(metric.name(), "provider" => provider).record(value_ms);
    tracing::trace!(metric = metric.name(), value_ms, "Recorded latency");
}
