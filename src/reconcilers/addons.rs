// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hub-side `ManagedClusterAddOn` records for enabled components.
//!
//! Only missing records of enabled components are created. Existing records
//! are left alone and nothing is deleted here; records of a disabled component
//! go away with their owner through garbage collection of the controller
//! reference.

use crate::components::AddonComponent;
use crate::constants::{AGENT_ADDON_NAMESPACE, KIND_MANAGED_CLUSTER_ADDON};
use crate::crd::{KlusterletAddonConfig, ManagedClusterAddOn, ManagedClusterAddOnSpec};
use crate::manifests::{build_labels, owner_references};
use crate::metrics;
use crate::store::{ObjectKey, ObjectStore, StoreError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info};

/// The `ManagedClusterAddOn` an owner wants for `component`.
#[must_use]
pub fn desired_addon(owner: &KlusterletAddonConfig, component: AddonComponent) -> ManagedClusterAddOn {
    ManagedClusterAddOn {
        metadata: ObjectMeta {
            name: Some(component.managed_cluster_addon_name().to_string()),
            namespace: owner.namespace(),
            labels: Some(build_labels(owner, component.addon_name())),
            owner_references: Some(owner_references(owner)),
            ..Default::default()
        },
        spec: ManagedClusterAddOnSpec {
            install_namespace: Some(AGENT_ADDON_NAMESPACE.to_string()),
        },
        status: None,
    }
}

/// Create the missing `ManagedClusterAddOn`s of enabled components.
///
/// Returns the number of records created.
///
/// # Errors
///
/// Returns any [`StoreError`]; a create that races with another writer
/// surfaces as [`StoreError::AlreadyExists`].
pub async fn sync_managed_cluster_addons<S: ObjectStore>(
    store: &S,
    owner: &KlusterletAddonConfig,
) -> Result<usize, StoreError> {
    let namespace = owner.namespace().unwrap_or_default();
    let mut created = 0;

    for component in AddonComponent::ALL {
        if !component.is_enabled(owner) {
            continue;
        }
        let key = ObjectKey::namespaced(namespace.clone(), component.managed_cluster_addon_name());
        if store.get::<ManagedClusterAddOn>(&key).await?.is_some() {
            debug!("ManagedClusterAddOn {} already exists", key);
            continue;
        }

        info!("Creating ManagedClusterAddOn {} for {}", key, component);
        store.create(&desired_addon(owner, component)).await?;
        metrics::record_dependent_write(KIND_MANAGED_CLUSTER_ADDON, "create");
        created += 1;
    }

    Ok(created)
}

#[cfg(test)]
#[path = "addons_tests.rs"]
mod addons_tests;
