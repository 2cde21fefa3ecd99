//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relayer_blocks_observed_total` (counter): blocks delivered by a watcher, by source
//! - `relayer_watcher_reconnects_total` (counter): re-subscription attempts, by source
//! - `relayer_publish_jobs_total` (counter): jobs emitted by interval counters, by destination
//! - `relayer_submission_attempts_total` (counter): build + submit cycles, by destination
//! - `relayer_publications_total` (counter): terminal job results, by destination and outcome
//! - `relayer_publish_latency_seconds` (histogram): job start to terminal result

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_block_observed(source: &str) {
    ::metrics::counter!("relayer_blocks_observed_total", "source" => source.to_string()).increment(1);
}

pub fn record_watcher_reconnect(source: &str) {
    ::metrics::counter!("relayer_watcher_reconnects_total", "source" => source.to_string())
        .increment(1);
}

pub fn record_publish_job(destination: &str) {
    ::metrics::counter!("relayer_publish_jobs_total", "destination" => destination.to_string())
        .increment(1);
}

pub fn record_submission_attempt(destination: &str) {
    ::metrics::counter!(
        "relayer_submission_attempts_total",
        "destination" => destination.to_string()
    )
    .increment(1);
}

pub fn record_publication(destination: &str, outcome: &'static str) {
    ::metrics::counter!(
        "relayer_publications_total",
        "destination" => destination.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_publish_latency(destination: &str, started: Instant) {
    ::metrics::histogram!(
        "relayer_publish_latency_seconds",
        "destination" => destination.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}
