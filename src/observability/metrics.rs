//! # Metrics
//!
//! Prometheus metrics for monitoring the workload runner.
//!
//! ## Metrics Exposed
//!
//! - `workload_runner_reconciliations_total{controller}` - Total number of reconciliations
//! - `workload_runner_reconciliation_errors_total{controller}` - Total number of reconciliation errors
//! - `workload_runner_reconciliation_duration_seconds{controller}` - Duration of reconciliations
//! - `workload_runner_crash_events_total{action}` - Crash events created or updated
//! - `workload_runner_admission_requests_total{webhook,allowed}` - Admission requests served
//! - `workload_runner_requeues_total{reason}` - Explicit requeues by reason

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "workload_runner_reconciliations_total",
            "Total number of reconciliations by controller",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "workload_runner_reconciliation_errors_total",
            "Total number of reconciliation errors by controller",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "workload_runner_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds by controller",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CRASH_EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "workload_runner_crash_events_total",
            "Total number of crash events reported, by action (created, updated)",
        ),
        &["action"],
    )
    .expect("Failed to create CRASH_EVENTS_TOTAL metric - this should never happen")
});

static ADMISSION_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "workload_runner_admission_requests_total",
            "Total number of admission requests by webhook and outcome",
        ),
        &["webhook", "allowed"],
    )
    .expect("Failed to create ADMISSION_REQUESTS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "workload_runner_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register all metrics with the shared registry; fails when called twice
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CRASH_EVENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller])
        .inc();
}

pub fn observe_reconciliation_duration(controller: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[controller])
        .observe(duration);
}

pub fn increment_crash_events(action: &str) {
    CRASH_EVENTS_TOTAL.with_label_values(&[action]).inc();
}

pub fn increment_admission_requests(webhook: &str, allowed: bool) {
    let allowed = if allowed { "true" } else { "false" };
    ADMISSION_REQUESTS_TOTAL
        .with_label_values(&[webhook, allowed])
        .inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
