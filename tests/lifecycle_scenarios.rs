// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end lifecycle scenarios over the in-memory store.
//!
//! Each test drives `reconcile_klusterlet_addon_config` through one or more
//! cycles and asserts on the resulting objects and on the store call log.

mod common;

use common::{
    cluster, cluster_key, memory_context, owner, owner_key, report_work_available, work, CLUSTER,
};
use klusterlet_addon_controller::components::AddonComponent;
use klusterlet_addon_controller::config::ImageDefaults;
use klusterlet_addon_controller::context::Context;
use klusterlet_addon_controller::crd::{KlusterletAddonConfig, ManagedCluster, ManifestWork};
use klusterlet_addon_controller::labels::{ANNOTATION_PAUSE, FINALIZER_KLUSTERLET_ADDON};
use klusterlet_addon_controller::reconcilers::lifecycle::Directive;
use klusterlet_addon_controller::reconcilers::manifestwork::{crd_work_name, operator_work_name};
use klusterlet_addon_controller::reconcilers::reconcile_klusterlet_addon_config;
use klusterlet_addon_controller::store::memory::{MemoryStore, Verb};
use klusterlet_addon_controller::store::{ObjectKey, ObjectStore};
use kube::ResourceExt;
use std::collections::BTreeMap;

async fn cycle(ctx: &Context<MemoryStore>) -> Directive {
    reconcile_klusterlet_addon_config(ctx, &owner_key())
        .await
        .expect("cycle should not fail")
}

fn work_key(name: &str) -> ObjectKey {
    ObjectKey::namespaced(CLUSTER, name)
}

/// Release the work agent's finalizer from a terminating work.
async fn agent_finishes(ctx: &Context<MemoryStore>, name: &str) {
    let mut work: ManifestWork = ctx.store.fetch(&work_key(name)).expect("work should exist");
    assert!(work.metadata.deletion_timestamp.is_some());
    work.metadata.finalizers = None;
    ctx.store.update(&work).await.expect("finalizer removal");
}

fn component_work_names() -> Vec<String> {
    AddonComponent::ALL
        .iter()
        .map(|c| c.work_name(CLUSTER))
        .collect()
}

#[tokio::test]
async fn test_absent_owner_releases_cluster() {
    let ctx = memory_context(ImageDefaults::default());
    ctx.store.insert(&cluster(true, true)).unwrap();

    let directive = cycle(&ctx).await;

    assert_eq!(directive, Directive::Done);
    let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
    assert!(cluster.finalizers().is_empty());
}

#[tokio::test]
async fn test_deleting_owner_without_cluster_forces_teardown() {
    let ctx = memory_context(ImageDefaults::default());
    ctx.store.insert(&owner(true)).unwrap();
    ctx.store.mark_deleting::<KlusterletAddonConfig>(&owner_key());

    let policy_work = AddonComponent::PolicyController.work_name(CLUSTER);
    for name in [
        policy_work.clone(),
        operator_work_name(CLUSTER),
        crd_work_name(CLUSTER),
    ] {
        ctx.store.insert(&work(&name)).unwrap();
    }

    // One tier per cycle: component CRs, operator, CRDs.
    for _ in 0..3 {
        assert_eq!(cycle(&ctx).await, Directive::short());
    }
    assert!(ctx.store.names::<ManifestWork>(Some(CLUSTER)).is_empty());

    // The agent finalizer is stripped from every work before it is deleted.
    let stripped: Vec<String> = ctx
        .store
        .calls_matching(Verb::Patch, "ManifestWork")
        .into_iter()
        .map(|c| c.key.name)
        .collect();
    assert_eq!(
        stripped,
        vec![
            policy_work,
            operator_work_name(CLUSTER),
            crd_work_name(CLUSTER)
        ]
    );

    assert_eq!(cycle(&ctx).await, Directive::Done);
    assert!(!ctx.store.contains::<KlusterletAddonConfig>(&owner_key()));
}

#[tokio::test]
async fn test_crds_without_conditions_wait_before_components() {
    let ctx = memory_context(ImageDefaults::default());
    ctx.store.insert(&owner(true)).unwrap();
    ctx.store.insert(&cluster(true, true)).unwrap();

    let directive = cycle(&ctx).await;

    assert_eq!(directive, Directive::waiting());
    let component_works = component_work_names();
    assert!(ctx
        .store
        .calls()
        .iter()
        .all(|c| !component_works.contains(&c.key.name)));
}

#[tokio::test]
async fn test_available_crds_sync_components_with_enablement() {
    let ctx = memory_context(ImageDefaults::default());
    ctx.store.insert(&owner(true)).unwrap();
    ctx.store.insert(&cluster(true, true)).unwrap();

    cycle(&ctx).await;
    report_work_available(&ctx.store, &crd_work_name(CLUSTER));

    let directive = cycle(&ctx).await;

    assert_eq!(directive, Directive::steady());
    let policy_work = AddonComponent::PolicyController.work_name(CLUSTER);
    let search_work = AddonComponent::SearchCollector.work_name(CLUSTER);
    for component in AddonComponent::ALL {
        let name = component.work_name(CLUSTER);
        let expected = name == policy_work || name == search_work;
        assert_eq!(
            ctx.store.contains::<ManifestWork>(&work_key(&name)),
            expected,
            "unexpected presence of {name}"
        );
    }

    // Disabling a component removes its work on the next cycle.
    let mut updated: KlusterletAddonConfig = ctx.store.fetch(&owner_key()).unwrap();
    updated.spec.search_collector.enabled = false;
    ctx.store.insert(&updated).unwrap();

    assert_eq!(cycle(&ctx).await, Directive::steady());
    assert!(!ctx.store.contains::<ManifestWork>(&work_key(&search_work)));
    assert!(ctx.store.contains::<ManifestWork>(&work_key(&policy_work)));
}

#[tokio::test]
async fn test_conflict_adding_cluster_finalizer_requeues_shortly() {
    let ctx = memory_context(ImageDefaults::default());
    ctx.store.insert(&owner(false)).unwrap();
    ctx.store.insert(&cluster(false, true)).unwrap();
    ctx.store.inject_conflict(Verb::Patch, "ManagedCluster", CLUSTER);

    let directive = reconcile_klusterlet_addon_config(&ctx, &owner_key()).await;

    assert_eq!(directive.unwrap(), Directive::short());
    assert!(ctx
        .store
        .calls_matching(Verb::Patch, "KlusterletAddonConfig")
        .is_empty());
}

#[tokio::test]
async fn test_conflict_adding_owner_finalizer_requeues_shortly() {
    let ctx = memory_context(ImageDefaults::default());
    ctx.store.insert(&owner(false)).unwrap();
    ctx.store.insert(&cluster(true, true)).unwrap();
    ctx.store
        .inject_conflict(Verb::Patch, "KlusterletAddonConfig", CLUSTER);

    let directive = reconcile_klusterlet_addon_config(&ctx, &owner_key()).await;

    assert_eq!(directive.unwrap(), Directive::short());
    let stored: KlusterletAddonConfig = ctx.store.fetch(&owner_key()).unwrap();
    assert!(stored.finalizers().is_empty());
    assert!(ctx
        .store
        .calls()
        .iter()
        .all(|c| c.kind != "ManifestWork"));
}

#[tokio::test]
async fn test_paused_owner_touches_no_dependents() {
    let ctx = memory_context(ImageDefaults::default());
    let mut paused = owner(true);
    paused.metadata.annotations = Some(BTreeMap::from([(
        ANNOTATION_PAUSE.to_string(),
        "TRUE".to_string(),
    )]));
    ctx.store.insert(&paused).unwrap();
    ctx.store.insert(&cluster(true, true)).unwrap();

    let directive = cycle(&ctx).await;

    assert_eq!(directive, Directive::Done);
    assert!(ctx
        .store
        .calls()
        .iter()
        .all(|c| c.kind != "ManifestWork" && c.kind != "ManagedClusterAddOn"));
    assert!(ctx.store.writes().is_empty());
}

#[tokio::test]
async fn test_empty_image_fields_render_with_defaults() {
    let ctx = memory_context(ImageDefaults {
        image_pull_secret: "default-pull-secret".to_string(),
        image_registry: "registry.example.com/acm".to_string(),
    });
    ctx.store.insert(&owner(true)).unwrap();
    ctx.store.insert(&cluster(true, true)).unwrap();

    cycle(&ctx).await;
    report_work_available(&ctx.store, &crd_work_name(CLUSTER));
    cycle(&ctx).await;

    let policy: ManifestWork = ctx
        .store
        .fetch(&work_key(&AddonComponent::PolicyController.work_name(CLUSTER)))
        .unwrap();
    let global = &policy.spec.workload.manifests[0]["spec"]["global"];
    assert_eq!(global["imagePullSecret"], "default-pull-secret");
    let image = global["imageOverrides"]["config_policy_controller"]
        .as_str()
        .unwrap();
    assert!(image.starts_with("registry.example.com/acm/"));

    let stored: KlusterletAddonConfig = ctx.store.fetch(&owner_key()).unwrap();
    assert!(stored.spec.image_pull_secret.is_empty());
}

#[tokio::test]
async fn test_teardown_runs_tiers_in_order_and_finalizes_once() {
    let ctx = memory_context(ImageDefaults::default());
    ctx.store.insert(&owner(true)).unwrap();
    ctx.store.insert(&cluster(true, true)).unwrap();

    let policy_work = AddonComponent::PolicyController.work_name(CLUSTER);
    let search_work = AddonComponent::SearchCollector.work_name(CLUSTER);
    for name in [
        policy_work.clone(),
        search_work.clone(),
        operator_work_name(CLUSTER),
        crd_work_name(CLUSTER),
    ] {
        ctx.store.insert(&work(&name)).unwrap();
    }
    ctx.store.mark_deleting::<KlusterletAddonConfig>(&owner_key());

    assert_eq!(cycle(&ctx).await, Directive::short());
    // Held by the agent: the next tier must not start.
    assert_eq!(cycle(&ctx).await, Directive::short());
    agent_finishes(&ctx, &policy_work).await;
    agent_finishes(&ctx, &search_work).await;

    assert_eq!(cycle(&ctx).await, Directive::short());
    agent_finishes(&ctx, &operator_work_name(CLUSTER)).await;

    assert_eq!(cycle(&ctx).await, Directive::short());
    agent_finishes(&ctx, &crd_work_name(CLUSTER)).await;

    assert_eq!(cycle(&ctx).await, Directive::Done);

    let deletes: Vec<String> = ctx
        .store
        .calls_matching(Verb::Delete, "ManifestWork")
        .into_iter()
        .map(|c| c.key.name)
        .collect();
    assert_eq!(
        deletes,
        vec![
            policy_work,
            search_work,
            operator_work_name(CLUSTER),
            crd_work_name(CLUSTER),
        ]
    );

    assert_eq!(
        ctx.store
            .calls_matching(Verb::Patch, "KlusterletAddonConfig")
            .len(),
        1
    );
    let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
    assert!(!cluster
        .finalizers()
        .contains(&FINALIZER_KLUSTERLET_ADDON.to_string()));

    // Further cycles find nothing left to do.
    let writes = ctx.store.writes().len();
    assert_eq!(cycle(&ctx).await, Directive::Done);
    assert_eq!(cycle(&ctx).await, Directive::Done);
    assert_eq!(ctx.store.writes().len(), writes);
}
