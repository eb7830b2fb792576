// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the klusterlet add-on controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group of the `KlusterletAddonConfig` and the per-component add-on CRs
pub const AGENT_API_GROUP: &str = "agent.open-cluster-management.io";

/// Fully qualified API version of the per-component add-on CRs
pub const AGENT_API_GROUP_VERSION: &str = "agent.open-cluster-management.io/v1";

/// Kind name for `KlusterletAddonConfig` resource
pub const KIND_KLUSTERLET_ADDON_CONFIG: &str = "KlusterletAddonConfig";

/// Kind name for `ManagedCluster` resource
pub const KIND_MANAGED_CLUSTER: &str = "ManagedCluster";

/// Kind name for `ManifestWork` resource
pub const KIND_MANIFEST_WORK: &str = "ManifestWork";

/// Kind name for `ManagedClusterAddOn` resource
pub const KIND_MANAGED_CLUSTER_ADDON: &str = "ManagedClusterAddOn";

// ============================================================================
// Requeue Intervals
// ============================================================================

/// Retry interval after an optimistic-concurrency conflict or incomplete teardown (5 seconds)
pub const REQUEUE_SHORT_SECS: u64 = 5;

/// Retry interval while waiting on remote availability of the CRD bundle (30 seconds)
pub const REQUEUE_WAITING_SECS: u64 = 30;

/// Steady-state re-check interval (5 minutes)
pub const REQUEUE_STEADY_SECS: u64 = 300;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Initial requeue delay after a failed reconciliation (5 seconds)
pub const ERROR_BACKOFF_INITIAL_SECS: u64 = 5;

/// Maximum requeue delay after repeated failed reconciliations (5 minutes)
pub const ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Backoff multiplier (exponential growth factor)
pub const ERROR_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
pub const ERROR_BACKOFF_RANDOMIZATION: f64 = 0.1;

// ============================================================================
// Status Condition Constants
// ============================================================================

/// Condition type the registration agent reports on a healthy `ManagedCluster`
pub const DEFAULT_CLUSTER_AVAILABLE_CONDITION: &str = "ManagedClusterConditionAvailable";

/// Condition type the work agent reports once a `ManifestWork` is applied and available
pub const DEFAULT_WORK_AVAILABLE_CONDITION: &str = "Available";

/// Literal status value of a satisfied condition
pub const CONDITION_STATUS_TRUE: &str = "True";

// ============================================================================
// Dependent Naming Constants
// ============================================================================

/// Suffix of the `ManifestWork` carrying the add-on CRDs
pub const CRDS_WORK_SUFFIX: &str = "-klusterlet-addon-crds";

/// Suffix of the `ManifestWork` carrying the add-on operator
pub const OPERATOR_WORK_SUFFIX: &str = "-klusterlet-addon-operator";

/// Infix of per-component `ManifestWork` names (`<owner>-klusterlet-addon-<addon>`)
pub const COMPONENT_WORK_INFIX: &str = "-klusterlet-addon-";

/// Prefix of the per-component CR names inside the agent namespace
pub const COMPONENT_CR_PREFIX: &str = "klusterlet-addon-";

/// Namespace on the managed cluster where the add-on agents run
pub const AGENT_ADDON_NAMESPACE: &str = "open-cluster-management-agent-addon";

/// Name of the add-on operator deployment and service account
pub const ADDON_OPERATOR_NAME: &str = "klusterlet-addon-operator";

// ============================================================================
// Image Constants
// ============================================================================

/// Registry used when neither the owner nor the process defaults name one
pub const DEFAULT_IMAGE_REGISTRY: &str = "quay.io/open-cluster-management";

/// Image tag used when the owner does not pin a version
pub const DEFAULT_ADDON_VERSION: &str = "2.2.0";

/// Image pull policy used when the owner does not set one
pub const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";

/// Minimum Kubernetes minor version that serves `apiextensions.k8s.io/v1`
pub const APIEXTENSIONS_V1_MIN_MINOR: u32 = 16;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness check
pub const SERVER_HEALTH_PATH: &str = "/healthz";

/// Path for the readiness check
pub const SERVER_READY_PATH: &str = "/readyz";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
