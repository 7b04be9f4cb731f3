// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Caddy watcher.
//!
//! All metrics use the namespace prefix `caddy_watcher` and are exposed on the
//! status server's `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Config Metrics** - configs written and removed, generation passes
//! - **Event Metrics** - Docker events processed
//! - **Error Metrics** - validation and DNS failures
//! - **Allowlist Metrics** - resolution changes

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all watcher metrics
const METRICS_NAMESPACE: &str = "caddy_watcher";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
}

fn int_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(format!("{METRICS_NAMESPACE}_{name}"), help).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
}

// ============================================================================
// Config Metrics
// ============================================================================

/// Configs written, by visibility
pub static CONFIGS_WRITTEN_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "configs_written_total",
        "Total number of site configs written by visibility",
        &["visibility"],
    )
});

/// Config files removed
pub static CONFIGS_REMOVED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter("configs_removed_total", "Total number of site config files removed")
});

/// Duration of a routing-domain generation pass
pub static GENERATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_generation_duration_seconds"),
        "Duration of config generation passes in seconds by outcome",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Orphaned routing domains cleaned up
pub static ORPHAN_CLEANUPS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter(
        "orphan_cleanups_total",
        "Total number of orphaned networks removed",
    )
});

// ============================================================================
// Event Metrics
// ============================================================================

/// Docker events handled, by type and action
pub static EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "events_total",
        "Total number of Docker events handled by type and action",
        &["type", "action"],
    )
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Service declarations rejected by validation
pub static VALIDATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter(
        "validation_errors_total",
        "Total number of rejected service declarations",
    )
});

/// Allowlist hostnames no provider could resolve
pub static DNS_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter(
        "dns_failures_total",
        "Total number of allowlist hostname resolution failures",
    )
});

// ============================================================================
// Allowlist Metrics
// ============================================================================

/// Allowlists whose resolved address set changed
pub static ALLOWLIST_CHANGES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter(
        "allowlist_changes_total",
        "Total number of allowlist resolution changes",
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

pub fn record_config_written(visibility: &str) {
    CONFIGS_WRITTEN_TOTAL.with_label_values(&[visibility]).inc();
}

pub fn record_configs_removed(count: usize) {
    CONFIGS_REMOVED_TOTAL.inc_by(count as u64);
}

/// Record a generation pass.
///
/// # Arguments
///
/// * `success` - Whether every service of the domain was written
/// * `duration` - Time spent in the pass
pub fn record_generation(success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "partial" };
    GENERATION_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

pub fn record_orphan_cleanup() {
    ORPHAN_CLEANUPS_TOTAL.inc();
}

pub fn record_event(event_type: &str, action: &str) {
    EVENTS_TOTAL.with_label_values(&[event_type, action]).inc();
}

pub fn record_validation_error() {
    VALIDATION_ERRORS_TOTAL.inc();
}

pub fn record_dns_failure() {
    DNS_FAILURES_TOTAL.inc();
}

pub fn record_allowlist_change() {
    ALLOWLIST_CHANGES_TOTAL.inc();
}

/// Gather all metrics in Prometheus text format.
///
/// # Errors
///
/// Returns an error if metrics cannot be encoded.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
