//! Observability infrastructure for the AQI dashboard
//!
//! Provides:
//! - Prometheus metrics (prediction latency, model load latency, upload and
//!   prediction counters, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DashboardMetricsInner> = OnceLock::new();

struct DashboardMetricsInner {
    prediction_latency_seconds: Histogram,
    model_load_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    uploads_total: IntCounter,
    dataset_rows: IntGauge,
    model_info: GaugeVec,
}

impl DashboardMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "aqi_dashboard_prediction_latency_seconds",
                "Time spent handling a prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            model_load_latency_seconds: register_histogram!(
                "aqi_dashboard_model_load_latency_seconds",
                "Time spent deserializing a model artifact",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register model_load_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "aqi_dashboard_predictions_total",
                "Total number of successful predictions",
                &["schema"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "aqi_dashboard_prediction_errors_total",
                "Total number of failed predictions",
                &["schema"]
            )
            .expect("Failed to register prediction_errors_total"),

            uploads_total: register_int_counter!(
                "aqi_dashboard_uploads_total",
                "Total number of accepted dataset uploads"
            )
            .expect("Failed to register uploads_total"),

            dataset_rows: register_int_gauge!(
                "aqi_dashboard_dataset_rows",
                "Number of rows in the current dataset"
            )
            .expect("Failed to register dataset_rows"),

            model_info: register_gauge_vec!(
                "aqi_dashboard_model_info",
                "Information about loaded model artifacts",
                &["schema", "checksum"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Dashboard metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct DashboardMetrics {
    _private: (),
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardMetrics {
    /// Create a metrics handle (registers the global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DashboardMetricsInner {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_model_load_latency(&self, duration_secs: f64) {
        self.inner().model_load_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, schema: &str) {
        self.inner().predictions_total.with_label_values(&[schema]).inc();
    }

    pub fn inc_prediction_errors(&self, schema: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[schema])
            .inc();
    }

    pub fn inc_uploads(&self) {
        self.inner().uploads_total.inc();
    }

    pub fn set_dataset_rows(&self, rows: i64) {
        self.inner().dataset_rows.set(rows);
    }

    /// Record the checksum of the model loaded for `schema`
    pub fn set_model_info(&self, schema: &str, checksum: &str) {
        self.inner()
            .model_info
            .with_label_values(&[schema, checksum])
            .set(1.0);
    }
}

/// Structured logger for dashboard events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, addr: &str) {
        info!(
            event = "dashboard_started",
            instance = %self.instance,
            version = %version,
            addr = %addr,
            "AQI dashboard started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "dashboard_shutdown",
            instance = %self.instance,
            reason = %reason,
            "AQI dashboard shutting down"
        );
    }

    pub fn log_dataset_uploaded(&self, rows: usize, size_bytes: usize, checksum: &str) {
        info!(
            event = "dataset_uploaded",
            instance = %self.instance,
            rows = rows,
            size_bytes = size_bytes,
            checksum = %checksum,
            "Dataset uploaded"
        );
    }

    pub fn log_prediction(&self, schema: &str, value: f64, category: Option<&str>) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            schema = %schema,
            value = value,
            category = category.unwrap_or("-"),
            "Generated prediction"
        );
    }

    pub fn log_prediction_failure(&self, schema: &str, error: &str) {
        warn!(
            event = "prediction_failed",
            instance = %self.instance,
            schema = %schema,
            error = %error,
            "Prediction failed"
        );
    }

    pub fn log_model_loaded(&self, schema: &str, kind: &str, checksum: Option<&str>) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            schema = %schema,
            kind = %kind,
            checksum = checksum.unwrap_or("-"),
            "Model artifact loaded"
        );
    }

    pub fn log_model_load_failure(&self, schema: &str, error: &str) {
        warn!(
            event = "model_load_failed",
            instance = %self.instance,
            schema = %schema,
            error = %error,
            "Model artifact could not be loaded"
        );
    }
}
