//! Prometheus metrics for property-ledger-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by method, route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "property_ledger_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// HTTP request duration histogram by method and route.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "property_ledger_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register http_request_duration")
});

/// Entries written, by write path and outcome.
pub static ENTRIES_WRITTEN: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "property_ledger_entries_written_total",
        "Total number of entries written",
        &["path", "status"] // batch|programmatic|manual, ok|error
    )
    .expect("Failed to register entries_written")
});

/// Write failures by error kind.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "property_ledger_errors_total",
        "Total number of write errors by kind",
        &["kind"]
    )
    .expect("Failed to register errors_total")
});

/// Requests rejected because their idempotency key was already used.
pub static IDEMPOTENCY_CONFLICTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "property_ledger_idempotency_conflicts_total",
        "Total number of duplicate idempotency keys",
        &["route"]
    )
    .expect("Failed to register idempotency_conflicts")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "property_ledger_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&ENTRIES_WRITTEN);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&IDEMPOTENCY_CONFLICTS);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_metrics_are_exported() {
        init_metrics();
        ENTRIES_WRITTEN.with_label_values(&["batch", "ok"]).inc();

        let text = get_metrics();
        assert!(text.contains("property_ledger_entries_written_total"));
    }
}
