//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rewrite_responses_total` (counter): engaged responses by coding, outcome
//! - `rewrite_duration_seconds` (histogram): setup to final emission, by coding
//!
//! Outcomes: `rewritten`, `passed_through` (transform failed, body emitted
//! unchanged), `failed` (ended without body), `aborted`.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::coding::ContentCoding;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record the outcome of one engaged response.
pub fn record_rewrite(coding: ContentCoding, outcome: &'static str, started: Instant) {
    ::metrics::counter!(
        "rewrite_responses_total",
        "coding" => coding.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("rewrite_duration_seconds", "coding" => coding.as_str())
        .record(started.elapsed().as_secs_f64());
}
