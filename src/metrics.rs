use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize Prometheus metrics exporter
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    init_metric_descriptions();

    handle
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "pricing_evaluations_total",
        "Total number of segmented pricing evaluations"
    );
    describe_counter!(
        "pricing_admin_writes_total",
        "Total number of administrative mutations of the ratio store"
    );
    describe_counter!(
        "pricing_invalidations_total",
        "Total number of exposed-configuration cache invalidations"
    );
    describe_gauge!(
        "pricing_models",
        "Number of models with a segmented pricing configuration"
    );
    describe_gauge!(
        "pricing_engine_info",
        "Engine version and build information"
    );

    // Set engine info metric
    gauge!("pricing_engine_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one billing-path evaluation
pub fn record_evaluation(model: &str, matched: bool) {
    counter!(
        "pricing_evaluations_total",
        "model" => model.to_string(),
        "matched" => if matched { "true" } else { "false" },
    )
    .increment(1);
}

/// Record an administrative mutation (upsert, delete, import)
pub fn record_admin_write(op: &'static str) {
    counter!("pricing_admin_writes_total", "op" => op).increment(1);
}

/// Record one cache-invalidation notification
pub fn record_invalidation() {
    counter!("pricing_invalidations_total").increment(1);
}

/// Update the configured-model gauge
pub fn update_model_count(count: usize) {
    gauge!("pricing_models").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_metrics() {
        init_metric_descriptions();

        // Record some metrics
        record_evaluation("gpt-x", true);
        record_evaluation("gpt-x", false);
        record_admin_write("upsert");
        record_invalidation();
        update_model_count(3);

        // Just verify the function calls don't panic
        // We can't easily verify the metrics are recorded without access to the handle
    }
}
