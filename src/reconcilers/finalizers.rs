// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management on resource metadata.
//!
//! These functions only touch the in-memory object. The caller persists the
//! change with a `resourceVersion`-guarded metadata patch and treats a
//! conflict as a reason to rerun the whole cycle, never as something to merge.
//!
//! The finalizer list is kept duplicate-free and in insertion order, so adding
//! a finalizer that is already present produces no write at all.
//!
//! # Example
//!
//! ```rust
//! use klusterlet_addon_controller::crd::ManagedCluster;
//! use klusterlet_addon_controller::reconcilers::finalizers::{add_finalizer, has_finalizer};
//!
//! let mut cluster = ManagedCluster::new("cluster1", Default::default());
//! assert!(add_finalizer(&mut cluster, "example.com/cleanup"));
//! assert!(!add_finalizer(&mut cluster, "example.com/cleanup"));
//! assert!(has_finalizer(&cluster, "example.com/cleanup"));
//! ```

use kube::{Resource, ResourceExt};
use tracing::info;

/// Whether `finalizer` is present on the resource.
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Add `finalizer` if missing.
///
/// Returns `true` when the object changed and must be persisted.
pub fn add_finalizer<T: Resource<DynamicType = ()>>(resource: &mut T, finalizer: &str) -> bool {
    if has_finalizer(resource, finalizer) {
        return false;
    }

    info!(
        "Adding finalizer {} to {} {}",
        finalizer,
        T::kind(&()),
        describe(resource)
    );
    resource
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Remove every occurrence of `finalizer`.
///
/// Returns `true` when the object changed and must be persisted. An emptied
/// list is cleared to `None`.
pub fn remove_finalizer<T: Resource<DynamicType = ()>>(resource: &mut T, finalizer: &str) -> bool {
    if !has_finalizer(resource, finalizer) {
        return false;
    }

    info!(
        "Removing finalizer {} from {} {}",
        finalizer,
        T::kind(&()),
        describe(resource)
    );
    let meta = resource.meta_mut();
    if let Some(finalizers) = meta.finalizers.as_mut() {
        finalizers.retain(|f| f != finalizer);
        if finalizers.is_empty() {
            meta.finalizers = None;
        }
    }
    true
}

fn describe<T: Resource>(resource: &T) -> String {
    match resource.namespace() {
        Some(ns) => format!("{ns}/{}", resource.name_any()),
        None => resource.name_any(),
    }
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
