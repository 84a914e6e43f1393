//! Prometheus metrics for salt-rules-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Rule set counter by lifecycle operation.
pub static RULE_SET_OPERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salt_rule_set_operations_total",
        "Total number of rule set lifecycle operations",
        &["operation"] // ingest, publish, archive, delete
    )
    .expect("Failed to register rule_set_operations_total")
});

/// Validation issue counter by severity.
pub static VALIDATION_ISSUES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salt_validation_issues_total",
        "Total number of validation issues by severity",
        &["severity"] // error, warning
    )
    .expect("Failed to register validation_issues_total")
});

/// Tax calculation counter by trigger.
pub static TAX_CALCULATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salt_tax_calculations_total",
        "Total number of distributions run through the tax calculator",
        &["trigger"]
    )
    .expect("Failed to register tax_calculations_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "salt_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "salt_db_query_duration_seconds",
        "Database query duration in seconds",
        &["query"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Force registration of all metrics at startup.
pub fn init_metrics() {
    Lazy::force(&RULE_SET_OPERATIONS_TOTAL);
    Lazy::force(&VALIDATION_ISSUES_TOTAL);
    Lazy::force(&TAX_CALCULATIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Render the metrics registry in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
