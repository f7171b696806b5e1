//! Metrics collection and Prometheus export.
//!
//! Installs the recorder at startup and renders the /metrics endpoint body.
//! The handler records `generate_requests_total` (labelled by outcome) and
//! `generate_duration_seconds` per inference run.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

// Inference runs take seconds to minutes; the exporter's default buckets top
// out far too early to resolve them.
const GENERATION_SECONDS_BUCKETS: &[f64] =
    &[0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Initialize the metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
/// Panics if called more than once.
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("generate_duration_seconds".to_string()),
            GENERATION_SECONDS_BUCKETS,
        )
        .expect("failed to configure histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}
