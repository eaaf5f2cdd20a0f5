use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static UPSERTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "preference_upserts_total",
        "Total successful preference upserts"
    )
    .expect("register preference_upserts_total")
});

pub static SEARCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "preference_searches_total",
        "Total containment searches executed"
    )
    .expect("register preference_searches_total")
});

pub static SEARCH_ROWS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "preference_search_rows_skipped_total",
        "Rows dropped from search results because their document failed to decode"
    )
    .expect("register preference_search_rows_skipped_total")
});

pub static OPERATION_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "preference_operation_errors_total",
        "Store operation failures by operation and error kind",
        &["operation", "kind"]
    )
    .expect("register preference_operation_errors_total")
});

pub fn record_error(operation: &str, err: &crate::errors::ServiceError) {
    OPERATION_ERRORS_TOTAL.with_label_values(&[operation, err.kind()]).inc();
}

/// Text exposition of the default registry.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
