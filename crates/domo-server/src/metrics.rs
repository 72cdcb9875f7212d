//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a recorder that is not installed globally.
///
/// Used by tests and embedders that do not want a process-wide recorder.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

// Metric name constants to avoid typos across modules.

/// Gas readings ingested (counter, labels: tier).
pub const GAS_READINGS_TOTAL: &str = "gas_readings_total";
/// WebSocket subscribers accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket subscribers closed (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Registered live subscribers (gauge).
pub const WS_SUBSCRIBERS_ACTIVE: &str = "ws_subscribers_active";
/// Subscribers evicted for a full or closed outbound queue (counter).
pub const WS_EVICTIONS_TOTAL: &str = "ws_evictions_total";
/// Connection attempts refused at capacity (counter).
pub const WS_CAPACITY_REJECTIONS_TOTAL: &str = "ws_capacity_rejections_total";
/// HTTP requests handled (counter, labels: route, status).
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
