// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `KlusterletAddonConfig` reconciliation cycle.
//!
//! One cycle runs to completion for one owner key. The cycle fetches fresh
//! snapshots, derives a [`LifecycleState`], and then either tears the add-ons
//! down or brings the `ManifestWork`s, `ManagedClusterAddOn`s and cluster label
//! in line with the owner.
//!
//! The owner and its `ManagedCluster` protect each other with the same
//! finalizer. A `ManagedCluster` is never deleted while a
//! `KlusterletAddonConfig` still has add-ons to remove from it, and a
//! `KlusterletAddonConfig` is deleted as soon as its cluster starts deleting.
//!
//! Every write carries the `resourceVersion` of the last read. Finalizers and
//! labels are written as metadata patches so fields owned by other
//! controllers are never overwritten. Conflicts and
//! create races end the cycle with a short requeue instead of an error, and a
//! snapshot is never used again after it has been written; the cycle continues
//! with the object returned by the store or fetches it again.

use crate::context::Context;
use crate::crd::{KlusterletAddonConfig, ManagedCluster, ManifestWork};
use crate::labels::FINALIZER_KLUSTERLET_ADDON;
use crate::reconcilers::addons::sync_managed_cluster_addons;
use crate::reconcilers::conditions::is_cluster_available;
use crate::reconcilers::finalizers::{add_finalizer, remove_finalizer};
use crate::reconcilers::label_policy::apply_label_intent;
use crate::reconcilers::lifecycle::{
    backfill_image_defaults, ActivePhase, Directive, LifecycleState,
};
use crate::reconcilers::manifestwork::{
    crd_work_name, desired_work, ensure_work, operator_work_name, sync_component_works, teardown,
};
use crate::reconcilers::ReconcileError;
use crate::store::{MetadataPatch, ObjectKey, ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::{debug, error, info, warn};

/// Run one reconciliation cycle for the `KlusterletAddonConfig` at `key`.
///
/// The managed cluster is looked up by the owner's namespace, which is the
/// cluster namespace on the hub.
///
/// # Errors
///
/// Returns [`ReconcileError`] for store failures other than not-found and
/// conflicts, and for payloads that cannot be rendered. The owner's status is
/// never written on error.
pub async fn reconcile_klusterlet_addon_config<S: ObjectStore>(
    ctx: &Context<S>,
    key: &ObjectKey,
) -> Result<Directive, ReconcileError> {
    info!("Reconciling KlusterletAddonConfig {}", key);

    match run_cycle(ctx, key).await {
        Ok(directive) => {
            debug!("KlusterletAddonConfig {} cycle finished: {}", key, directive);
            Ok(directive)
        }
        Err(e) if e.is_conflict() || e.is_not_found() => {
            warn!(
                namespace = %key.namespace_or_empty(),
                name = %key.name,
                "Concurrent modification, retrying: {}",
                e
            );
            Ok(Directive::short())
        }
        Err(e) => {
            error!(
                namespace = %key.namespace_or_empty(),
                name = %key.name,
                "Reconciliation failed: {}",
                e
            );
            Err(e)
        }
    }
}

async fn run_cycle<S: ObjectStore>(
    ctx: &Context<S>,
    key: &ObjectKey,
) -> Result<Directive, ReconcileError> {
    let cluster_key = ObjectKey::cluster(key.namespace_or_empty());

    let target: Option<ManagedCluster> = ctx.store.get(&cluster_key).await?;
    if target.is_none() {
        debug!("ManagedCluster {} not found", cluster_key);
    }
    let owner: Option<KlusterletAddonConfig> = ctx.store.get(key).await?;

    let state = LifecycleState::observe(
        owner.as_ref(),
        target.as_ref(),
        &ctx.config.cluster_available_condition,
    );
    debug!("KlusterletAddonConfig {} is {}", key, state);

    let (mut owner, mut target) = match (state, owner, target) {
        (LifecycleState::NoOwner, _, target) => {
            if let Some(target) = target {
                release_cluster(&ctx.store, target).await?;
            }
            return Ok(Directive::Done);
        }
        (
            LifecycleState::Deleting {
                force_remove_finalizers,
            },
            Some(owner),
            target,
        ) => {
            return finalize(ctx, owner, target.is_some(), force_remove_finalizers).await;
        }
        (_, Some(owner), Some(target)) => (owner, target),
        _ => return Ok(Directive::Done),
    };

    if state.needs_finalizers() {
        if add_finalizer(&mut target, FINALIZER_KLUSTERLET_ADDON) {
            target = ctx
                .store
                .patch_metadata(&cluster_key, &MetadataPatch::finalizers_of(&target))
                .await?;
        }
        if add_finalizer(&mut owner, FINALIZER_KLUSTERLET_ADDON) {
            owner = ctx
                .store
                .patch_metadata(key, &MetadataPatch::finalizers_of(&owner))
                .await?;
        }
    }

    match state {
        LifecycleState::TargetDeleting => {
            info!(
                "ManagedCluster {} is deleting, deleting KlusterletAddonConfig {}",
                cluster_key, key
            );
            ctx.store.delete::<KlusterletAddonConfig>(key).await?;
            return Ok(Directive::Done);
        }
        LifecycleState::Paused => {
            info!("KlusterletAddonConfig {} reconciliation is paused", key);
            return Ok(Directive::Done);
        }
        _ => {}
    }

    let defaults = ctx.image_defaults.load();
    if backfill_image_defaults(&mut owner, &defaults) {
        debug!("Filled image defaults for KlusterletAddonConfig {}", key);
    }

    let owner_name = owner.name_any();
    let namespace = owner.namespace().unwrap_or_default();

    let crds = ctx
        .payloads
        .crd_bundle(&owner, target.kubernetes_version())?;
    let crd_work = crd_work_name(&owner_name);
    ensure_work(&ctx.store, &desired_work(&owner, &crd_work, "crds", crds)).await?;

    let pull_secret = read_pull_secret(&ctx.store, &owner).await?;
    let operator = ctx.payloads.operator_bundle(&owner, pull_secret.as_ref())?;
    ensure_work(
        &ctx.store,
        &desired_work(&owner, &operator_work_name(&owner_name), "operator", operator),
    )
    .await?;

    sync_managed_cluster_addons(&ctx.store, &owner).await?;

    let target_available =
        is_cluster_available(Some(&target), &ctx.config.cluster_available_condition);
    apply_label_policy(ctx, &owner, target).await;

    let crd_work: Option<ManifestWork> = ctx
        .store
        .get(&ObjectKey::namespaced(namespace, crd_work))
        .await?;
    let phase = ActivePhase::observe(
        crd_work.as_ref(),
        target_available,
        &ctx.config.work_available_condition,
    );
    debug!("KlusterletAddonConfig {} is {}", key, phase);

    if phase.syncs_components() {
        sync_component_works(&ctx.store, ctx.payloads.as_ref(), &owner).await?;
    }

    Ok(phase.directive())
}

/// Tear down the add-ons of a deleting owner and release both finalizers.
async fn finalize<S: ObjectStore>(
    ctx: &Context<S>,
    mut owner: KlusterletAddonConfig,
    target_exists: bool,
    force_remove_finalizers: bool,
) -> Result<Directive, ReconcileError> {
    let key = ObjectKey::of(&owner);
    if force_remove_finalizers {
        info!(
            "ManagedCluster for {} is gone or unavailable, forcing ManifestWork removal",
            key
        );
    }

    if !teardown(&ctx.store, &owner, force_remove_finalizers).await? {
        debug!("Waiting for ManifestWorks of {} to be removed", key);
        return Ok(Directive::short());
    }

    let cluster_key = ObjectKey::cluster(key.namespace_or_empty());
    if target_exists {
        if let Some(target) = ctx.store.get::<ManagedCluster>(&cluster_key).await? {
            apply_label_policy(ctx, &owner, target).await;
        }
    }

    if remove_finalizer(&mut owner, FINALIZER_KLUSTERLET_ADDON) {
        ctx.store
            .patch_metadata::<KlusterletAddonConfig>(&key, &MetadataPatch::finalizers_of(&owner))
            .await?;
    }

    if target_exists {
        if let Some(target) = ctx.store.get::<ManagedCluster>(&cluster_key).await? {
            release_cluster(&ctx.store, target).await?;
        }
    }

    info!("KlusterletAddonConfig {} finalized", key);
    Ok(Directive::Done)
}

/// Remove the shared finalizer from a `ManagedCluster`.
async fn release_cluster<S: ObjectStore>(
    store: &S,
    mut target: ManagedCluster,
) -> Result<(), StoreError> {
    if remove_finalizer(&mut target, FINALIZER_KLUSTERLET_ADDON) {
        store
            .patch_metadata::<ManagedCluster>(
                &ObjectKey::of(&target),
                &MetadataPatch::finalizers_of(&target),
            )
            .await?;
    }
    Ok(())
}

/// Apply the label policy to the cluster, logging instead of failing.
async fn apply_label_policy<S: ObjectStore>(
    ctx: &Context<S>,
    owner: &KlusterletAddonConfig,
    mut target: ManagedCluster,
) {
    let intent = ctx.label_policy.intent(owner);
    if !apply_label_intent(&mut target, &intent) {
        return;
    }
    let patch = MetadataPatch::label_of(&target, &intent.key);
    if let Err(e) = ctx
        .store
        .patch_metadata::<ManagedCluster>(&ObjectKey::of(&target), &patch)
        .await
    {
        warn!(
            name = %target.name_any(),
            label = %intent.key,
            "Failed to update label on ManagedCluster: {}",
            e
        );
    }
}

/// Read the owner's image pull secret straight from the API server.
async fn read_pull_secret<S: ObjectStore>(
    store: &S,
    owner: &KlusterletAddonConfig,
) -> Result<Option<Secret>, StoreError> {
    if owner.spec.image_pull_secret.is_empty() {
        return Ok(None);
    }

    let key = ObjectKey::namespaced(
        owner.namespace().unwrap_or_default(),
        owner.spec.image_pull_secret.clone(),
    );
    let secret = store.get_secret_uncached(&key).await?;
    if secret.is_none() {
        warn!(
            "Image pull secret {} not found, rendering operator without it",
            key
        );
    }
    Ok(secret)
}

/// Release a `ManagedCluster` whose `KlusterletAddonConfig` no longer exists.
///
/// A removed owner generates no further owner events, so this is driven by the
/// cluster's own notifications. The owner is looked up as `<cluster>/<cluster>`.
///
/// # Errors
///
/// Returns [`ReconcileError`] for store failures other than not-found and conflicts.
pub async fn reconcile_orphaned_cluster<S: ObjectStore>(
    ctx: &Context<S>,
    cluster_name: &str,
) -> Result<Directive, ReconcileError> {
    let owner_key = ObjectKey::namespaced(cluster_name, cluster_name);

    let result: Result<(), StoreError> = async {
        if ctx
            .store
            .get::<KlusterletAddonConfig>(&owner_key)
            .await?
            .is_some()
        {
            return Ok(());
        }
        if let Some(target) = ctx
            .store
            .get::<ManagedCluster>(&ObjectKey::cluster(cluster_name))
            .await?
        {
            release_cluster(&ctx.store, target).await?;
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok(Directive::Done),
        Err(e) if e.is_conflict() || e.is_not_found() => {
            warn!(name = %cluster_name, "Concurrent modification, retrying: {}", e);
            Ok(Directive::short())
        }
        Err(e) => {
            error!(name = %cluster_name, "Orphaned ManagedCluster sweep failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[path = "klusterletaddon_tests.rs"]
mod klusterletaddon_tests;
