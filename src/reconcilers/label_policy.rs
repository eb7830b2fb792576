// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cross-component label on the `ManagedCluster`.
//!
//! Other hub components detect an installed policy controller by a label on the
//! managed cluster rather than by reading the add-on resources. The label is
//! derived from the owner through a [`LabelPolicy`], so the rule can be replaced
//! without touching the reconcile loop.
//!
//! Failures to write the label never fail a cycle; the caller logs them and
//! carries on.

use crate::components::AddonComponent;
use crate::crd::{KlusterletAddonConfig, ManagedCluster};
use crate::labels::LABEL_POLICY_CONTROLLER;
use crate::reconcilers::lifecycle::is_deleting;
use tracing::debug;

/// Desired state of a single label on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelIntent {
    /// Label key
    pub key: String,
    /// `Some(value)` to set the label, `None` to remove it
    pub value: Option<String>,
}

/// Maps an owner to the label it wants on its `ManagedCluster`.
pub trait LabelPolicy: Send + Sync {
    fn intent(&self, owner: &KlusterletAddonConfig) -> LabelIntent;
}

/// Sets `policycontroller.addon.open-cluster-management.io=true` while the
/// policy controller is enabled and the owner is live; removes it otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyControllerLabel;

impl LabelPolicy for PolicyControllerLabel {
    fn intent(&self, owner: &KlusterletAddonConfig) -> LabelIntent {
        let installed = !is_deleting(owner) && AddonComponent::PolicyController.is_enabled(owner);
        LabelIntent {
            key: LABEL_POLICY_CONTROLLER.to_string(),
            value: installed.then(|| "true".to_string()),
        }
    }
}

/// Apply `intent` to the in-memory cluster.
///
/// Existing values are compared case-insensitively, so `True` already
/// satisfies `true`. Returns `true` when the cluster changed and must be
/// persisted.
pub fn apply_label_intent(cluster: &mut ManagedCluster, intent: &LabelIntent) -> bool {
    match &intent.value {
        None => {
            let removed = cluster
                .metadata
                .labels
                .as_mut()
                .is_some_and(|labels| labels.remove(&intent.key).is_some());
            if removed {
                debug!(label = %intent.key, "Removing label from ManagedCluster");
            }
            removed
        }
        Some(value) => {
            let labels = cluster.metadata.labels.get_or_insert_with(Default::default);
            if labels
                .get(&intent.key)
                .is_some_and(|current| current.eq_ignore_ascii_case(value))
            {
                return false;
            }
            debug!(label = %intent.key, value = %value, "Setting label on ManagedCluster");
            labels.insert(intent.key.clone(), value.clone());
            true
        }
    }
}

#[cfg(test)]
#[path = "label_policy_tests.rs"]
mod label_policy_tests;
