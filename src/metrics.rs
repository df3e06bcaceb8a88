// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for verification runs.
//!
//! All metrics carry the `hcpverify` namespace prefix. The harness has no
//! scrape endpoint; the CLI writes [`gather_metrics`] output to the artifact
//! directory at the end of a run.
//!
//! # Metrics Categories
//!
//! - **Operation Metrics** - Submitted mutations and how they ended
//! - **Polling Metrics** - Status fetches issued while waiting
//! - **Scenario Metrics** - Scenario outcomes, step and scenario durations
//! - **Cleanup Metrics** - Best-effort deletions that failed
//!
//! # Example
//!
//! ```rust,no_run
//! use hcpverify::metrics::record_operation;
//!
//! record_operation("nodePools", "create", "success", std::time::Duration::from_secs(300));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "hcpverify";

/// Buckets spanning seconds-long rejections up to 45 minute cluster creates.
const LONG_RUNNING_BUCKETS: [f64; 10] = [
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 2700.0,
];

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Operation Metrics
// ============================================================================

/// Total number of submitted operations
///
/// Labels:
/// - `resource_type`: ARM collection (e.g., `nodePools`)
/// - `operation`: `create`, `update` or `delete`
/// - `outcome`: `success`, `failed`, `rejected`, `timeout`, ...
pub static OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_operations_total"),
        "Total number of submitted operations by resource type, operation and outcome",
    );
    let counter = CounterVec::new(opts, &["resource_type", "operation", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Submission-to-terminal duration in seconds
pub static OPERATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_operation_duration_seconds"),
        "Duration from submission to terminal state by resource type and operation",
    )
    .buckets(LONG_RUNNING_BUCKETS.to_vec());
    let histogram = HistogramVec::new(opts, &["resource_type", "operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Polling Metrics
// ============================================================================

/// Total number of status fetches
///
/// Labels:
/// - `operation`: operation being polled
pub static POLL_ATTEMPTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_poll_attempts_total"),
        "Total number of status fetches issued while polling",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Scenario Metrics
// ============================================================================

/// Total number of scenario runs
///
/// Labels:
/// - `scenario`: scenario name
/// - `outcome`: `passed` or `failed`
pub static SCENARIOS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_scenarios_total"),
        "Total number of scenario runs by name and outcome",
    );
    let counter = CounterVec::new(opts, &["scenario", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

pub static SCENARIO_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_scenario_duration_seconds"),
        "Wall-clock duration of scenario bodies, excluding cleanup",
    )
    .buckets(LONG_RUNNING_BUCKETS.to_vec());
    let histogram = HistogramVec::new(opts, &["scenario"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Duration of named steps inside a scenario
pub static STEP_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_step_duration_seconds"),
        "Duration of named scenario steps",
    )
    .buckets(LONG_RUNNING_BUCKETS.to_vec());
    let histogram = HistogramVec::new(opts, &["scenario", "step"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Cleanup Metrics
// ============================================================================

/// Total number of cleanup deletions that did not complete
pub static CLEANUP_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cleanup_failures_total"),
        "Total number of best-effort cleanup deletions that failed by resource type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a finished operation
///
/// # Arguments
/// * `resource_type` - ARM collection of the target resource
/// * `operation` - `create`, `update` or `delete`
/// * `outcome` - `success` or an error kind
/// * `duration` - Submission to terminal state
pub fn record_operation(resource_type: &str, operation: &str, outcome: &str, duration: Duration) {
    OPERATIONS_TOTAL
        .with_label_values(&[resource_type, operation, outcome])
        .inc();
    OPERATION_DURATION_SECONDS
        .with_label_values(&[resource_type, operation])
        .observe(duration.as_secs_f64());
}

pub fn record_poll_attempt(operation: &str) {
    POLL_ATTEMPTS_TOTAL.with_label_values(&[operation]).inc();
}

/// Record a scenario outcome and the duration of its body
pub fn record_scenario(scenario: &str, passed: bool, duration: Duration) {
    let outcome = if passed { "passed" } else { "failed" };
    SCENARIOS_TOTAL
        .with_label_values(&[scenario, outcome])
        .inc();
    SCENARIO_DURATION_SECONDS
        .with_label_values(&[scenario])
        .observe(duration.as_secs_f64());
}

pub fn record_step(scenario: &str, step: &str, duration: Duration) {
    STEP_DURATION_SECONDS
        .with_label_values(&[scenario, step])
        .observe(duration.as_secs_f64());
}

pub fn record_cleanup_failure(resource_type: &str) {
    CLEANUP_FAILURES_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
