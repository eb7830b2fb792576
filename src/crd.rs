// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) used by the klusterlet add-on controller.
//!
//! Only [`KlusterletAddonConfig`] is owned by this controller. The other kinds
//! belong to the cluster registration, work and add-on APIs and are modelled
//! here with just the fields the reconciler reads or writes.
//!
//! # Resource Types
//!
//! - [`KlusterletAddonConfig`] - desired add-on configuration for one managed cluster
//! - [`ManagedCluster`] - a registered remote cluster (cluster-scoped)
//! - [`ManifestWork`] - a bundle of manifests the work agent applies on the remote cluster
//! - [`ManagedClusterAddOn`] - hub-side descriptor of an installed add-on
//!
//! # Example: Enabling add-ons for a cluster
//!
//! ```rust,no_run
//! use klusterlet_addon_controller::crd::{AddonAgentConfig, KlusterletAddonConfigSpec};
//!
//! let spec = KlusterletAddonConfigSpec {
//!     cluster_name: "cluster1".to_string(),
//!     cluster_namespace: "cluster1".to_string(),
//!     policy_controller: AddonAgentConfig { enabled: true },
//!     search_collector: AddonAgentConfig { enabled: true },
//!     ..Default::default()
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are reported by the registration and work agents; this
/// controller only reads them.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `ManagedClusterConditionAvailable` or `Available`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// KlusterletAddonConfig
// ============================================================================

/// Enablement switch for a single add-on agent.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct AddonAgentConfig {
    /// Whether the add-on agent is deployed to the managed cluster.
    #[serde(default)]
    pub enabled: bool,
}

/// `KlusterletAddonConfig` declares which add-on agents run on one managed cluster.
///
/// By convention the resource lives in the cluster namespace on the hub and is
/// named after the cluster, so `namespace == name == ManagedCluster.name`.
///
/// # Example
///
/// ```yaml
/// apiVersion: agent.open-cluster-management.io/v1
/// kind: KlusterletAddonConfig
/// metadata:
///   name: cluster1
///   namespace: cluster1
/// spec:
///   clusterName: cluster1
///   clusterNamespace: cluster1
///   applicationManager:
///     enabled: true
///   policyController:
///     enabled: true
///   searchCollector:
///     enabled: false
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "agent.open-cluster-management.io",
    version = "v1",
    kind = "KlusterletAddonConfig",
    namespaced,
    shortname = "kac",
    doc = "KlusterletAddonConfig declares the add-on agents to deploy on a managed cluster. The controller renders it into ManifestWorks and ManagedClusterAddOns in the cluster namespace and tears them down in reverse order on deletion."
)]
#[serde(rename_all = "camelCase")]
pub struct KlusterletAddonConfigSpec {
    /// Name of the managed cluster.
    #[serde(default)]
    pub cluster_name: String,

    /// Namespace of the managed cluster on the hub.
    #[serde(default)]
    pub cluster_namespace: String,

    /// Labels of the managed cluster, propagated to the add-on agents.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cluster_labels: BTreeMap<String, String>,

    /// Image pull policy for the add-on agents (`Always`, `IfNotPresent`, `Never`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Name of a secret in this namespace copied to the managed cluster for image pulls.
    ///
    /// Falls back to the controller's default pull secret when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_pull_secret: String,

    /// Registry prefix for the add-on images.
    ///
    /// Falls back to the controller's default registry when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_registry: String,

    /// Version tag of the add-on images.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Application manager agent.
    #[serde(default)]
    pub application_manager: AddonAgentConfig,

    /// Certificate policy controller agent.
    #[serde(default)]
    pub cert_policy_controller: AddonAgentConfig,

    /// IAM policy controller agent.
    #[serde(default)]
    pub iam_policy_controller: AddonAgentConfig,

    /// Policy controller agent.
    #[serde(default)]
    pub policy_controller: AddonAgentConfig,

    /// Search collector agent.
    #[serde(default)]
    pub search_collector: AddonAgentConfig,
}

// ============================================================================
// ManagedCluster
// ============================================================================

/// `ManagedCluster` represents a remote cluster registered with the hub.
///
/// Cluster-scoped. The reconciler never creates or deletes it; it only
/// toggles its finalizer and the policy-controller label.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1",
    kind = "ManagedCluster",
    doc = "ManagedCluster represents a cluster registered with the hub."
)]
#[kube(status = "ManagedClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    /// Whether the hub accepts the cluster's registration.
    #[serde(default)]
    pub hub_accepts_client: bool,

    /// Lease duration the registration agent renews on the hub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<i32>,
}

/// Version information reported by the managed cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManagedClusterVersion {
    /// Kubernetes version of the managed cluster, e.g. `v1.21.3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<String>,
}

/// `ManagedCluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ManagedClusterVersion>,
}

impl ManagedCluster {
    /// Kubernetes version reported by the registration agent, or `""` when unknown.
    #[must_use]
    pub fn kubernetes_version(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.version.as_ref())
            .and_then(|v| v.kubernetes.as_deref())
            .unwrap_or_default()
    }
}

// ============================================================================
// ManifestWork
// ============================================================================

/// Manifests delivered by a [`ManifestWork`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManifestsTemplate {
    /// Raw Kubernetes objects applied on the managed cluster.
    #[serde(default)]
    pub manifests: Vec<serde_json::Value>,
}

/// `ManifestWork` carries a set of manifests to a managed cluster.
///
/// Lives in the cluster namespace on the hub. The work agent applies the
/// manifests remotely and reports the outcome through status conditions.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "work.open-cluster-management.io",
    version = "v1",
    kind = "ManifestWork",
    namespaced,
    doc = "ManifestWork is a set of manifests applied to a managed cluster by its work agent."
)]
#[kube(status = "ManifestWorkStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    #[serde(default)]
    pub workload: ManifestsTemplate,
}

/// `ManifestWork` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManifestWorkStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// ManagedClusterAddOn
// ============================================================================

/// `ManagedClusterAddOn` advertises an add-on installed on a managed cluster.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ManagedClusterAddOn",
    namespaced,
    derive = "PartialEq",
    doc = "ManagedClusterAddOn is the hub-side record of an add-on installed on a managed cluster."
)]
#[kube(status = "ManagedClusterAddOnStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnSpec {
    /// Namespace on the managed cluster where the add-on agent runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,
}

/// `ManagedClusterAddOn` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManagedClusterAddOnStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
