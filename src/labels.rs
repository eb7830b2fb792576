// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer, annotation and label constants shared by the reconcilers.
//!
//! The finalizer names here are part of the on-cluster contract: the owner
//! (`KlusterletAddonConfig`) and the target (`ManagedCluster`) share the same
//! finalizer string, and the relation between them is resolved by name and
//! re-fetch rather than by holding either object across a cycle.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Value for `app.kubernetes.io/managed-by` on resources this controller creates
pub const MANAGED_BY_KLUSTERLET_ADDON_CONTROLLER: &str = "klusterlet-addon-controller";

/// Value for `app.kubernetes.io/part-of` on resources this controller creates
pub const PART_OF_KLUSTERLET_ADDON: &str = "klusterlet-addon";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer placed on both the `KlusterletAddonConfig` and its `ManagedCluster`
pub const FINALIZER_KLUSTERLET_ADDON: &str =
    "agent.open-cluster-management.io/klusterletaddonconfig-cleanup";

/// Finalizer the work agent places on a `ManifestWork` until it has removed the
/// applied resources from the managed cluster.
pub const FINALIZER_MANIFEST_WORK_CLEANUP: &str =
    "cluster.open-cluster-management.io/manifest-work-cleanup";

// ============================================================================
// Annotations
// ============================================================================

/// Annotation that pauses reconciliation of a `KlusterletAddonConfig` when set to `"true"`
/// (compared case-insensitively).
pub const ANNOTATION_PAUSE: &str = "klusterletaddonconfig-pause";

// ============================================================================
// Cross-component Labels
// ============================================================================

/// Label on the `ManagedCluster` announcing that the policy controller add-on is installed.
pub const LABEL_POLICY_CONTROLLER: &str = "policycontroller.addon.open-cluster-management.io";

/// Label on `ManifestWork`s naming the `KlusterletAddonConfig` that produced them
pub const LABEL_OWNER_NAME: &str = "agent.open-cluster-management.io/klusterletaddonconfig";
