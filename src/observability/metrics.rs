//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vidproxy_requests_total` (counter): requests by outcome and status
//! - `vidproxy_request_duration_seconds` (histogram): end-to-end latency
//! - `vidproxy_upstream_errors_total` (counter): failed fetches by kind
//! - `vidproxy_rewrite_rules_applied_total` (counter): rules that edited a page
//! - `vidproxy_rate_limited_total` (counter): requests rejected with 429

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const REQUESTS_TOTAL: &str = "vidproxy_requests_total";
const REQUEST_DURATION: &str = "vidproxy_request_duration_seconds";
const UPSTREAM_ERRORS_TOTAL: &str = "vidproxy_upstream_errors_total";
const RULES_APPLIED_TOTAL: &str = "vidproxy_rewrite_rules_applied_total";
const RATE_LIMITED_TOTAL: &str = "vidproxy_rate_limited_total";

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, "Proxied requests by outcome and status");
    describe_histogram!(REQUEST_DURATION, Unit::Seconds, "Request latency");
    describe_counter!(UPSTREAM_ERRORS_TOTAL, "Upstream fetch failures by kind");
    describe_counter!(RULES_APPLIED_TOTAL, "Rewrite rules that changed a document");
    describe_counter!(RATE_LIMITED_TOTAL, "Requests rejected by the rate limiter");

    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a finished proxy request.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome, "status" => status.to_string()).increment(1);
    histogram!(REQUEST_DURATION, "outcome" => outcome).record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!(UPSTREAM_ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_rule_applied(rule: &'static str) {
    counter!(RULES_APPLIED_TOTAL, "rule" => rule).increment(1);
}

pub fn record_rate_limited() {
    counter!(RATE_LIMITED_TOTAL).increment(1);
}
