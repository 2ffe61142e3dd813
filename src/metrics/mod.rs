//! Prometheus metrics for booking runs
//!
//! This module tracks:
//! - Attempts: one count per acquisition attempt, by phase and outcome
//! - Phases: how each attack/fallback phase ended
//! - Runs: the final result of the last run
//!
//! # Usage
//!
//! Call `init_metrics()` at startup to register all metrics. If it is never
//! called, or registration fails, every recording function is a no-op. The
//! binary has no HTTP surface, so the exposition text is written to a file
//! for a node-exporter textfile collector via [`write_textfile`].

use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct RunMetrics {
    attempts: CounterVec,
    attempt_duration: HistogramVec,
    phases: CounterVec,
    auth_failures: CounterVec,
    run_result: GaugeVec,
}

/// Outcome of the one registration attempt; a failure is kept, not retried
static RUN_METRICS: OnceLock<Result<RunMetrics, String>> = OnceLock::new();

/// Every value the `result` label of `seat_killer_run_result` can take
pub const RUN_RESULTS: [&str; 5] = ["booked", "exhausted", "window_passed", "cancelled", "setup_failed"];

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Idempotent. On failure the caller may carry on without metrics.
///
/// ```ignore
/// if let Err(e) = seat_killer::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    match RUN_METRICS.get_or_init(|| register().map_err(|e| e.to_string())) {
        Ok(_) => Ok(()),
        Err(e) => Err(e.clone().into()),
    }
}

fn register() -> Result<RunMetrics, prometheus::Error> {
    let metrics = RunMetrics {
        attempts: register_counter_vec!(
            "seat_killer_attempts_total",
            "Acquisition attempts by phase and outcome",
            &["phase", "outcome"]
        )?,
        attempt_duration: register_histogram_vec!(
            "seat_killer_attempt_duration_seconds",
            "Round trip of one acquisition attempt in seconds",
            &["phase"],
            vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
        )?,
        phases: register_counter_vec!(
            "seat_killer_phases_total",
            "Completed phases by phase and result",
            &["phase", "result"]
        )?,
        auth_failures: register_counter_vec!(
            "seat_killer_auth_failures_total",
            "Failed validation or login attempts",
            &["stage"]
        )?,
        run_result: register_gauge_vec!(
            "seat_killer_run_result",
            "Result of the last run (1 for the result that happened, 0 otherwise)",
            &["result"]
        )?,
    };

    tracing::debug!("Prometheus metrics initialized");
    Ok(metrics)
}

fn run_metrics() -> Option<&'static RunMetrics> {
    RUN_METRICS.get().and_then(|m| m.as_ref().ok())
}

pub fn metrics_initialized() -> bool {
    run_metrics().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Write the text exposition to `path`, replacing it atomically
pub async fn write_textfile(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = encode_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Record one acquisition attempt
pub fn record_attempt(phase: &str, outcome: &str) {
    if let Some(m) = run_metrics() {
        m.attempts.with_label_values(&[phase, outcome]).inc();
    }
}

/// Record how a phase ended (`won`, `exhausted` or `cancelled`)
pub fn record_phase(phase: &str, result: &str) {
    if let Some(m) = run_metrics() {
        m.phases.with_label_values(&[phase, result]).inc();
    }
}

/// Record a failed validation or login attempt
pub fn record_auth_failure(stage: &str) {
    if let Some(m) = run_metrics() {
        m.auth_failures.with_label_values(&[stage]).inc();
    }
}

/// Mark `result` as the outcome of the last run
pub fn record_run_result(result: &str) {
    let Some(m) = run_metrics() else {
        return;
    };

    for candidate in RUN_RESULTS {
        let value = if candidate == result { 1.0 } else { 0.0 };
        m.run_result.with_label_values(&[candidate]).set(value);
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start timing one attempt
pub fn start_attempt_timer(phase: &str) -> MetricsTimer {
    match run_metrics() {
        Some(m) => MetricsTimer::new(m.attempt_duration.with_label_values(&[phase]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
