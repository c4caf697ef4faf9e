//! Prometheus metrics for tickerhub.
//!
//! Covers:
//! - Stream connection state and reconnects per exchange
//! - Ticker ingestion by path (stream / poll)
//! - REST and normalization failures
//! - Symbol catalog resolution
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. Registration only fails on
//! duplicate metric names, which is a startup-time programming error.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};

/// Stream connected flag per exchange (1 = open).
pub static STREAM_CONNECTED: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tickerhub_stream_connected",
        "Stream connection open (1) or not (0)",
        &["exchange"]
    )
    .unwrap()
});

/// Current connection state per exchange.
/// Labels: exchange, state (disconnected/connecting/open/closing)
pub static STREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tickerhub_stream_state",
        "Stream state machine current state (1=active, 0=inactive)",
        &["exchange", "state"]
    )
    .unwrap()
});

/// Total reconnect attempts.
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickerhub_stream_reconnect_total",
        "Total stream reconnect attempts",
        &["exchange"]
    )
    .unwrap()
});

/// Tickers written to the cache.
/// Labels: exchange, source (stream/poll)
pub static TICKERS_INGESTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickerhub_tickers_ingested_total",
        "Tickers written to the ticker cache",
        &["exchange", "source"]
    )
    .unwrap()
});

/// REST ticker fetches that yielded no data.
pub static REST_FETCH_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickerhub_rest_fetch_failures_total",
        "REST ticker fetches that yielded no data",
        &["exchange"]
    )
    .unwrap()
});

/// REST request latency in milliseconds.
pub static REST_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tickerhub_rest_latency_ms",
        "REST ticker request latency in milliseconds",
        &["exchange"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Payloads dropped by a normalizer.
/// Labels: exchange, path (stream/rest)
pub static NORMALIZE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickerhub_normalize_failures_total",
        "Payloads dropped by a wire normalizer",
        &["exchange", "path"]
    )
    .unwrap()
});

/// Poll ticks skipped because the stream was open.
pub static POLL_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickerhub_poll_skipped_total",
        "Poll ticks skipped because the stream was open",
        &["exchange"]
    )
    .unwrap()
});

/// Catalog resolutions by winning source.
pub static CATALOG_RESOLVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickerhub_catalog_resolved_total",
        "Symbol catalog resolutions by source",
        &["exchange", "source"]
    )
    .unwrap()
});

/// Entries in the ticker cache.
pub static TICKER_CACHE_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tickerhub_ticker_cache_size", "Entries in the ticker cache").unwrap()
});

const STREAM_STATES: [&str; 4] = ["disconnected", "connecting", "open", "closing"];

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set the active stream state; all other states go to 0.
    pub fn stream_state(exchange: &str, state: &str) {
        for s in STREAM_STATES {
            STREAM_STATE.with_label_values(&[exchange, s]).set(0.0);
        }
        STREAM_STATE.with_label_values(&[exchange, state]).set(1.0);
        let open = if state == "open" { 1.0 } else { 0.0 };
        STREAM_CONNECTED.with_label_values(&[exchange]).set(open);
    }

    pub fn stream_reconnect(exchange: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[exchange]).inc();
    }

    pub fn ticker_ingested(exchange: &str, source: &str) {
        TICKERS_INGESTED_TOTAL
            .with_label_values(&[exchange, source])
            .inc();
    }

    pub fn rest_fetch_failed(exchange: &str) {
        REST_FETCH_FAILURES_TOTAL.with_label_values(&[exchange]).inc();
    }

    pub fn rest_latency(exchange: &str, latency_ms: f64) {
        REST_LATENCY_MS
            .with_label_values(&[exchange])
            .observe(latency_ms);
    }

    pub fn normalize_failed(exchange: &str, path: &str) {
        NORMALIZE_FAILURES_TOTAL
            .with_label_values(&[exchange, path])
            .inc();
    }

    pub fn poll_skipped(exchange: &str) {
        POLL_SKIPPED_TOTAL.with_label_values(&[exchange]).inc();
    }

    pub fn catalog_resolved(exchange: &str, source: &str) {
        CATALOG_RESOLVED_TOTAL
            .with_label_values(&[exchange, source])
            .inc();
    }

    pub fn cache_size(entries: usize) {
        TICKER_CACHE_SIZE.set(i64::try_from(entries).unwrap_or(i64::MAX));
    }

    /// Render the default registry in Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
