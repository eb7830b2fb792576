// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the klusterlet add-on controller.
//!
//! All metrics carry the prefix `agent_open_cluster_management_io_`
//! (prometheus-safe version of "agent.open-cluster-management.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - cycles, their outcome and duration
//! - **Requeue Metrics** - scheduling directives by reason
//! - **Dependent Metrics** - writes and deletions of `ManifestWork`s and add-ons
//! - **Teardown Metrics** - completed teardown tiers
//!
//! # Example
//!
//! ```rust,no_run
//! use klusterlet_addon_controller::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("KlusterletAddonConfig", std::time::Duration::from_millis(40));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all controller metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "agent_open_cluster_management_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind driving the cycle (`KlusterletAddonConfig`, `ManagedCluster`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue directives
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `reason`: Directive that scheduled the next cycle (`done`, `immediate`,
///   `retry`, `waiting`, `steady`), or `error` when the error policy requeued
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Dependent Metrics
// ============================================================================

/// Total number of dependent writes
///
/// Labels:
/// - `resource_type`: Kind of dependent (`ManifestWork`, `ManagedClusterAddOn`)
/// - `operation`: `create`, `update`, `patch` or `delete`
pub static DEPENDENT_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dependent_writes_total"),
        "Total number of writes to dependent resources by kind and operation",
    );
    let counter = CounterVec::new(opts, &["resource_type", "operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of teardown tiers observed complete
///
/// Labels:
/// - `tier`: `component-crs`, `operator` or `crds`
pub static TEARDOWN_TIERS_COMPLETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_teardown_tiers_completed_total"),
        "Total number of teardown tiers observed complete",
    );
    let counter = CounterVec::new(opts, &["tier"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Recorders
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a requeue directive
pub fn record_requeue(resource_type: &str, reason: &str) {
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record a create, update or delete issued against a dependent resource
pub fn record_dependent_write(resource_type: &str, operation: &str) {
    DEPENDENT_WRITES_TOTAL
        .with_label_values(&[resource_type, operation])
        .inc();
}

/// Record a teardown tier that reported completion
pub fn record_teardown_tier_completed(tier: &str) {
    TEARDOWN_TIERS_COMPLETED_TOTAL
        .with_label_values(&[tier])
        .inc();
}

/// Gather all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
