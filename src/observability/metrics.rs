//! Metrics collection and exposition.
//!
//! # Metrics
//! - `geocode_searches_total` (counter): searches by outcome
//! - `geocode_search_duration_seconds` (histogram): end-to-end latency
//! - `geocode_cache_lookups_total` (counter): hit, negative_hit, miss
//! - `geocode_cache_dedup_total` (counter): callers joined to an in-flight search
//! - `geocode_cache_write_failures_total` (counter): durable tier write failures
//! - `geocode_fallbacks_total` (counter): primary failed or found nothing
//! - `geocode_queue_full_total` (counter): admission rejections by provider
//! - `geocode_timeouts_total` (counter): queue timeouts by provider
//! - `geocode_provider_load` (gauge): queued + in-flight by provider

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished top-level search.
pub fn record_search(outcome: &'static str, started: Instant) {
    ::metrics::counter!("geocode_searches_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("geocode_search_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(result: &'static str) {
    ::metrics::counter!("geocode_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_dedup() {
    ::metrics::counter!("geocode_cache_dedup_total").increment(1);
}

pub fn record_cache_write_failure() {
    ::metrics::counter!("geocode_cache_write_failures_total").increment(1);
}

pub fn record_fallback(primary: &str) {
    ::metrics::counter!("geocode_fallbacks_total", "provider" => primary.to_string()).increment(1);
}

pub fn record_queue_full(provider: &str) {
    ::metrics::counter!("geocode_queue_full_total", "provider" => provider.to_string())
        .increment(1);
}

pub fn record_timeout(provider: &str) {
    ::metrics::counter!("geocode_timeouts_total", "provider" => provider.to_string()).increment(1);
}

pub fn record_provider_load(provider: &str, load: usize) {
    ::metrics::gauge!("geocode_provider_load", "provider" => provider.to_string()).set(load as f64);
}
