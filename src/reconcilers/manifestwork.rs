// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ManifestWork` synchronization and teardown.
//!
//! A `KlusterletAddonConfig` is delivered to its managed cluster as a set of
//! `ManifestWork`s in the cluster namespace:
//!
//! - `<owner>-klusterlet-addon-crds` - the component CRDs
//! - `<owner>-klusterlet-addon-operator` - the add-on operator
//! - `<owner>-klusterlet-addon-<addon>` - one CR per enabled component
//!
//! On deletion they are removed in the reverse order of their dependencies, one
//! [`TeardownTier`] at a time: component CRs first so the operator can clean up
//! after them, then the operator, then the CRDs. A tier only starts once every
//! unit of the previous tier is confirmed gone.

use crate::components::AddonComponent;
use crate::constants::{CRDS_WORK_SUFFIX, KIND_MANIFEST_WORK, OPERATOR_WORK_SUFFIX};
use crate::crd::{KlusterletAddonConfig, ManifestWork, ManifestWorkSpec};
use crate::labels::LABEL_OWNER_NAME;
use crate::manifests::{build_labels, owner_references, PayloadBuilder};
use crate::metrics;
use crate::reconcilers::lifecycle::is_deleting;
use crate::reconcilers::ReconcileError;
use crate::store::{MetadataPatch, ObjectKey, ObjectStore, StoreError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info};

/// Name of the CRD bundle work for an owner
#[must_use]
pub fn crd_work_name(owner_name: &str) -> String {
    format!("{owner_name}{CRDS_WORK_SUFFIX}")
}

/// Name of the operator bundle work for an owner
#[must_use]
pub fn operator_work_name(owner_name: &str) -> String {
    format!("{owner_name}{OPERATOR_WORK_SUFFIX}")
}

/// Result of [`ensure_work`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Created,
    Updated,
    Unchanged,
}

/// Build the `ManifestWork` an owner wants for one unit.
///
/// The work lives in the owner's namespace and carries a controller reference
/// back to the owner.
#[must_use]
pub fn desired_work(
    owner: &KlusterletAddonConfig,
    name: &str,
    component: &str,
    spec: ManifestWorkSpec,
) -> ManifestWork {
    let mut labels = build_labels(owner, component);
    labels.insert(LABEL_OWNER_NAME.to_string(), owner.name_any());

    ManifestWork {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: owner.namespace(),
            labels: Some(labels),
            owner_references: Some(owner_references(owner)),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// Create `desired` if missing, or bring a drifted spec back in line.
///
/// Only the spec is compared and overwritten; labels, annotations and
/// finalizers set by others on an existing work are left alone. Returning `Ok`
/// means the work exists with the desired spec.
///
/// # Errors
///
/// Returns any [`StoreError`] from the store. A concurrent create surfaces as
/// [`StoreError::AlreadyExists`] and a concurrent update as
/// [`StoreError::Conflict`].
pub async fn ensure_work<S: ObjectStore>(
    store: &S,
    desired: &ManifestWork,
) -> Result<Ensured, StoreError> {
    let key = ObjectKey::of(desired);

    let Some(mut existing) = store.get::<ManifestWork>(&key).await? else {
        info!("Creating ManifestWork {}", key);
        store.create(desired).await?;
        metrics::record_dependent_write(KIND_MANIFEST_WORK, "create");
        return Ok(Ensured::Created);
    };

    if existing.spec == desired.spec {
        debug!("ManifestWork {} is up to date", key);
        return Ok(Ensured::Unchanged);
    }

    info!("Updating drifted ManifestWork {}", key);
    existing.spec = desired.spec.clone();
    store.update(&existing).await?;
    metrics::record_dependent_write(KIND_MANIFEST_WORK, "update");
    Ok(Ensured::Updated)
}

/// Ask for a `ManifestWork` to go away.
///
/// With `remove_finalizers` set, every finalizer on the work is stripped first;
/// used when the managed cluster is gone or unreachable and its work agent will
/// never release them.
///
/// Returns `true` only when the store reports the work as not found. A delete
/// that was accepted but has not completed yet returns `false`, so callers
/// requeue and observe the disappearance on a later cycle.
///
/// # Errors
///
/// Returns any [`StoreError`] other than not-found.
pub async fn delete_work<S: ObjectStore>(
    store: &S,
    key: &ObjectKey,
    remove_finalizers: bool,
) -> Result<bool, StoreError> {
    let Some(mut work) = store.get::<ManifestWork>(key).await? else {
        return Ok(true);
    };

    if remove_finalizers && !work.finalizers().is_empty() {
        info!("Removing finalizers from ManifestWork {}", key);
        work.metadata.finalizers = None;
        match store
            .patch_metadata(key, &MetadataPatch::finalizers_of(&work))
            .await
        {
            Ok(updated) => work = updated,
            Err(e) if e.is_not_found() => return Ok(true),
            Err(e) => return Err(e),
        }
        metrics::record_dependent_write(KIND_MANIFEST_WORK, "patch");
    }

    if is_deleting(&work) {
        debug!("ManifestWork {} is already terminating", key);
        return Ok(false);
    }

    info!("Deleting ManifestWork {}", key);
    match store.delete::<ManifestWork>(key).await {
        Ok(()) => {
            metrics::record_dependent_write(KIND_MANIFEST_WORK, "delete");
            Ok(false)
        }
        Err(e) if e.is_not_found() => Ok(true),
        Err(e) => Err(e),
    }
}

/// Teardown stage, in the order the stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownTier {
    ComponentCrs,
    Operator,
    Crds,
}

impl TeardownTier {
    /// Tiers in teardown order.
    pub const ORDER: [TeardownTier; 3] = [
        TeardownTier::ComponentCrs,
        TeardownTier::Operator,
        TeardownTier::Crds,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ComponentCrs => "component-crs",
            Self::Operator => "operator",
            Self::Crds => "crds",
        }
    }

    /// Names of the works removed by this tier.
    ///
    /// The component tier covers every component, enabled or not, so works
    /// left behind by an earlier enablement are cleaned up too.
    #[must_use]
    pub fn work_names(self, owner_name: &str) -> Vec<String> {
        match self {
            Self::ComponentCrs => AddonComponent::ALL
                .iter()
                .map(|c| c.work_name(owner_name))
                .collect(),
            Self::Operator => vec![operator_work_name(owner_name)],
            Self::Crds => vec![crd_work_name(owner_name)],
        }
    }
}

/// Run one pass of the tiered teardown.
///
/// Every unit of the first incomplete tier is issued a delete; later tiers are
/// not touched. Returns `true` once all tiers are complete.
///
/// # Errors
///
/// Returns the first [`StoreError`] other than not-found.
pub async fn teardown<S: ObjectStore>(
    store: &S,
    owner: &KlusterletAddonConfig,
    remove_finalizers: bool,
) -> Result<bool, StoreError> {
    let namespace = owner.namespace().unwrap_or_default();
    let owner_name = owner.name_any();

    for tier in TeardownTier::ORDER {
        let mut complete = true;
        for name in tier.work_names(&owner_name) {
            let key = ObjectKey::namespaced(namespace.clone(), name);
            if !delete_work(store, &key, remove_finalizers).await? {
                complete = false;
            }
        }
        if !complete {
            debug!(
                namespace = %namespace,
                name = %owner_name,
                tier = tier.as_str(),
                "Teardown tier still in progress"
            );
            return Ok(false);
        }
        metrics::record_teardown_tier_completed(tier.as_str());
    }

    info!(namespace = %namespace, name = %owner_name, "All ManifestWorks removed");
    Ok(true)
}

/// Bring the per-component works in line with the owner's enablement flags.
///
/// # Errors
///
/// Returns [`ReconcileError`] if a payload cannot be rendered or a store call fails.
pub async fn sync_component_works<S: ObjectStore>(
    store: &S,
    payloads: &dyn PayloadBuilder,
    owner: &KlusterletAddonConfig,
) -> Result<(), ReconcileError> {
    let namespace = owner.namespace().unwrap_or_default();
    let owner_name = owner.name_any();

    for component in AddonComponent::ALL {
        let name = component.work_name(&owner_name);
        if component.is_enabled(owner) {
            let spec = payloads.component_cr(owner, component)?;
            let desired = desired_work(owner, &name, component.addon_name(), spec);
            ensure_work(store, &desired).await?;
        } else {
            let key = ObjectKey::namespaced(namespace.clone(), name);
            delete_work(store, &key, false).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "manifestwork_tests.rs"]
mod manifestwork_tests;
