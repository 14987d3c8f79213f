//! Observability infrastructure for the throughput monitor
//!
//! Provides:
//! - Prometheus metrics (tick latency, write counters, per-target rate,
//!   history length and model fit quality)
//! - Structured JSON logging with tracing

use crate::models::{FittedModel, Sample, StatusEntry, Target};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge_vec,
    GaugeVec, Histogram, IntCounter, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for tick latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    tick_latency_seconds: Histogram,
    ticks: IntCounter,
    tick_errors: IntCounter,
    samples_written: IntCounter,
    snapshots_written: IntCounter,
    status_entries: IntCounter,
    models_fitted: IntCounter,
    target_rate: GaugeVec,
    history_points: IntGaugeVec,
    model_r2: GaugeVec,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "throughput_monitor_tick_latency_seconds",
                "Time spent processing one polling tick",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            ticks: register_int_counter!(
                "throughput_monitor_ticks_total",
                "Total number of completed polling ticks"
            )
            .expect("Failed to register ticks_total"),

            tick_errors: register_int_counter!(
                "throughput_monitor_tick_errors_total",
                "Total number of polling ticks that failed"
            )
            .expect("Failed to register tick_errors_total"),

            samples_written: register_int_counter!(
                "throughput_monitor_samples_written_total",
                "Total number of samples persisted"
            )
            .expect("Failed to register samples_written_total"),

            snapshots_written: register_int_counter!(
                "throughput_monitor_snapshots_written_total",
                "Total number of count snapshots persisted"
            )
            .expect("Failed to register snapshots_written_total"),

            status_entries: register_int_counter!(
                "throughput_monitor_status_entries_total",
                "Total number of producer status entries processed"
            )
            .expect("Failed to register status_entries_total"),

            models_fitted: register_int_counter!(
                "throughput_monitor_models_fitted_total",
                "Total number of fitted models persisted"
            )
            .expect("Failed to register models_fitted_total"),

            target_rate: register_gauge_vec!(
                "throughput_monitor_target_rate_units_per_second",
                "Units produced per second during the last tick",
                &["target"]
            )
            .expect("Failed to register target_rate"),

            history_points: register_int_gauge_vec!(
                "throughput_monitor_history_points",
                "Number of points in the in-memory history of a target",
                &["target"]
            )
            .expect("Failed to register history_points"),

            model_r2: register_gauge_vec!(
                "throughput_monitor_model_r2",
                "Coefficient of determination of the latest fit",
                &["target", "model"]
            )
            .expect("Failed to register model_r2"),
        }
    }
}

/// Lightweight handle to the global metrics instance.
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
        self.inner().ticks.inc();
    }

    pub fn inc_tick_errors(&self) {
        self.inner().tick_errors.inc();
    }

    /// Record a persisted sample and its per-target rates
    pub fn record_sample(&self, sample: &Sample) {
        self.inner().samples_written.inc();
        for (target, rate) in &sample.rate {
            if let Some(rate) = rate {
                self.inner()
                    .target_rate
                    .with_label_values(&[target.as_str()])
                    .set(*rate);
            }
        }
    }

    pub fn inc_snapshots_written(&self) {
        self.inner().snapshots_written.inc();
    }

    pub fn inc_status_entries(&self, count: u64) {
        self.inner().status_entries.inc_by(count);
    }

    pub fn set_history_points(&self, target: &Target, points: usize) {
        self.inner()
            .history_points
            .with_label_values(&[target.as_str()])
            .set(points as i64);
    }

    /// Record a persisted model and its fit quality
    pub fn record_model(&self, model: &FittedModel) {
        self.inner().models_fitted.inc();
        let target = model.target.as_str();
        if let Some(r2) = model.linear.r2 {
            self.inner()
                .model_r2
                .with_label_values(&[target, "linear"])
                .set(r2);
        }
        if let Some(r2) = model.exponential.r2 {
            self.inner()
                .model_r2
                .with_label_values(&[target, "exponential"])
                .set(r2);
        }
    }
}

/// Render an optional float for log lines
fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.6}", v),
        None => "nan".to_string(),
    }
}

/// Structured logger for monitor events
///
/// Provides consistent JSON-formatted logging for samples, fitted models,
/// status updates and loop failures.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, targets: &[Target], poll_seconds: f64, cursor: &str) {
        let targets: Vec<&str> = targets.iter().map(Target::as_str).collect();
        info!(
            event = "monitor_started",
            node = %self.node_name,
            version = %version,
            targets = ?targets,
            poll_seconds = poll_seconds,
            last_status_ts = %cursor,
            "Throughput monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Throughput monitor shutting down"
        );
    }

    /// Log one producer status entry
    pub fn log_status_update(&self, entry: &StatusEntry) {
        info!(
            event = "status_update",
            node = %self.node_name,
            status_ts = %entry.timestamp.to_rfc3339(),
            message = %entry.message,
            "Producer status update"
        );
    }

    pub fn log_sample(&self, sample: &Sample) {
        if sample.is_baseline() {
            info!(
                event = "sample_recorded",
                node = %self.node_name,
                baseline = true,
                counts = ?sample.counts,
                "Baseline sample recorded"
            );
        } else {
            debug!(
                event = "sample_recorded",
                node = %self.node_name,
                baseline = false,
                elapsed_seconds = ?sample.elapsed_seconds,
                counts = ?sample.counts,
                deltas = ?sample.deltas,
                "Sample recorded"
            );
        }
    }

    pub fn log_fitted_model(&self, model: &FittedModel) {
        info!(
            event = "model_fitted",
            node = %self.node_name,
            target = %model.target,
            n_points = model.n_points,
            linear_a = %fmt_opt(model.linear.a),
            linear_b = %fmt_opt(model.linear.b),
            linear_r2 = %fmt_opt(model.linear.r2),
            exp_c = %fmt_opt(model.exponential.c),
            exp_d = %fmt_opt(model.exponential.d),
            exp_r2 = %fmt_opt(model.exponential.r2),
            preferred = %model.preferred,
            trend_slope_last_k = %fmt_opt(model.trend.slope_last_k),
            "Cost model fitted"
        );
    }

    pub fn log_history_reset(&self, target: &Target, dropped_points: usize) {
        warn!(
            event = "history_reset",
            node = %self.node_name,
            target = %target,
            dropped_points = dropped_points,
            "Count decreased, history reset"
        );
    }

    pub fn log_tick_failed(&self, error: &dyn std::fmt::Display, consecutive_failures: u32) {
        warn!(
            event = "tick_failed",
            node = %self.node_name,
            error = %error,
            consecutive_failures = consecutive_failures,
            "Polling tick failed, keeping previous baseline"
        );
    }

    pub fn log_model_persist_failed(&self, target: &Target, error: &dyn std::fmt::Display) {
        warn!(
            event = "model_persist_failed",
            node = %self.node_name,
            target = %target,
            error = %error,
            "Failed to persist fitted model"
        );
    }
}
