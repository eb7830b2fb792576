// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `klusterletaddon.rs`

#[cfg(test)]
mod tests {
    use crate::config::{ControllerConfig, ImageDefaults};
    use crate::context::Context;
    use crate::crd::{
        AddonAgentConfig, Condition, KlusterletAddonConfig, KlusterletAddonConfigSpec,
        ManagedCluster, ManagedClusterAddOn, ManagedClusterStatus, ManagedClusterVersion,
        ManifestWork,
    };
    use crate::labels::{FINALIZER_KLUSTERLET_ADDON, LABEL_POLICY_CONTROLLER};
    use crate::reconcilers::lifecycle::Directive;
    use crate::reconcilers::{reconcile_klusterlet_addon_config, reconcile_orphaned_cluster};
    use crate::store::memory::{MemoryStore, Verb};
    use crate::store::ObjectKey;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use kube::ResourceExt;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const NAME: &str = "cluster1";

    fn owner_key() -> ObjectKey {
        ObjectKey::namespaced(NAME, NAME)
    }

    fn cluster_key() -> ObjectKey {
        ObjectKey::cluster(NAME)
    }

    fn context(defaults: ImageDefaults) -> Context<MemoryStore> {
        Context::new(MemoryStore::new(), ControllerConfig::default())
            .with_image_defaults(Arc::new(defaults))
    }

    fn owner(finalized: bool) -> KlusterletAddonConfig {
        let mut owner = KlusterletAddonConfig::new(
            NAME,
            KlusterletAddonConfigSpec {
                cluster_name: NAME.to_string(),
                cluster_namespace: NAME.to_string(),
                policy_controller: AddonAgentConfig { enabled: true },
                ..Default::default()
            },
        );
        owner.metadata.namespace = Some(NAME.to_string());
        if finalized {
            owner.metadata.finalizers = Some(vec![FINALIZER_KLUSTERLET_ADDON.to_string()]);
        }
        owner
    }

    fn cluster(finalized: bool, available: bool) -> ManagedCluster {
        let mut cluster = ManagedCluster::new(NAME, Default::default());
        if finalized {
            cluster.metadata.finalizers = Some(vec![FINALIZER_KLUSTERLET_ADDON.to_string()]);
        }
        cluster.status = Some(ManagedClusterStatus {
            conditions: vec![Condition {
                r#type: "ManagedClusterConditionAvailable".to_string(),
                status: if available { "True" } else { "False" }.to_string(),
                ..Default::default()
            }],
            version: Some(ManagedClusterVersion {
                kubernetes: Some("v1.21.3".to_string()),
            }),
        });
        cluster
    }

    #[tokio::test]
    async fn test_adds_finalizers_to_both_sides() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(false)).unwrap();
        ctx.store.insert(&cluster(false, true)).unwrap();

        reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();

        let owner: KlusterletAddonConfig = ctx.store.fetch(&owner_key()).unwrap();
        let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
        assert_eq!(owner.finalizers(), [FINALIZER_KLUSTERLET_ADDON.to_string()]);
        assert_eq!(cluster.finalizers(), [FINALIZER_KLUSTERLET_ADDON.to_string()]);
    }

    #[tokio::test]
    async fn test_absent_target_is_done_without_writes() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(false)).unwrap();

        let directive = reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();
        assert_eq!(directive, Directive::Done);
        assert!(ctx.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_target_deletes_owner() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();
        ctx.store.mark_deleting::<ManagedCluster>(&cluster_key());

        let directive = reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();
        assert_eq!(directive, Directive::Done);
        assert_eq!(
            ctx.store
                .calls_matching(Verb::Delete, "KlusterletAddonConfig")
                .len(),
            1
        );
        assert!(ctx.store.names::<ManifestWork>(Some(NAME)).is_empty());

        let owner: KlusterletAddonConfig = ctx.store.fetch(&owner_key()).unwrap();
        assert!(owner.metadata.deletion_timestamp.is_some());
    }

    #[tokio::test]
    async fn test_active_owner_creates_bundles_and_addons() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();

        let directive = reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();

        assert_eq!(directive, Directive::waiting());
        assert_eq!(
            ctx.store.names::<ManifestWork>(Some(NAME)),
            vec![
                "cluster1-klusterlet-addon-crds".to_string(),
                "cluster1-klusterlet-addon-operator".to_string(),
            ]
        );
        assert_eq!(
            ctx.store.names::<ManagedClusterAddOn>(Some(NAME)),
            vec!["policy-controller".to_string()]
        );
        let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
        assert_eq!(
            cluster.labels().get(LABEL_POLICY_CONTROLLER),
            Some(&"true".to_string())
        );
    }

    #[tokio::test]
    async fn test_label_failure_does_not_fail_cycle() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();
        ctx.store.inject_failure(Verb::Patch, "ManagedCluster", NAME);

        let directive = reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();
        assert_eq!(directive, Directive::waiting());

        let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
        assert!(!cluster.labels().contains_key(LABEL_POLICY_CONTROLLER));
    }

    #[tokio::test]
    async fn test_label_failure_during_finalize_still_releases() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(true)).unwrap();
        let mut labelled = cluster(true, true);
        labelled.metadata.labels = Some(BTreeMap::from([(
            LABEL_POLICY_CONTROLLER.to_string(),
            "true".to_string(),
        )]));
        ctx.store.insert(&labelled).unwrap();
        ctx.store.mark_deleting::<KlusterletAddonConfig>(&owner_key());
        // The first cluster patch is the label clear.
        ctx.store.inject_failure(Verb::Patch, "ManagedCluster", NAME);

        let directive = reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();

        assert_eq!(directive, Directive::Done);
        assert!(!ctx.store.contains::<KlusterletAddonConfig>(&owner_key()));
        let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
        assert!(cluster.finalizers().is_empty());
        assert_eq!(
            cluster.labels().get(LABEL_POLICY_CONTROLLER),
            Some(&"true".to_string())
        );
        assert_eq!(
            ctx.store.calls_matching(Verb::Patch, "ManagedCluster").len(),
            2
        );
    }

    #[tokio::test]
    async fn test_finalizer_writes_leave_cluster_spec_alone() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(false)).unwrap();
        let mut seeded = cluster(false, true);
        seeded.spec.hub_accepts_client = true;
        seeded.spec.lease_duration_seconds = Some(60);
        ctx.store.insert(&seeded).unwrap();

        reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();

        assert!(ctx
            .store
            .calls_matching(Verb::Update, "ManagedCluster")
            .is_empty());
        let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
        assert!(cluster.spec.hub_accepts_client);
        assert_eq!(cluster.spec.lease_duration_seconds, Some(60));
        assert_eq!(cluster.finalizers(), [FINALIZER_KLUSTERLET_ADDON.to_string()]);
    }

    #[tokio::test]
    async fn test_transient_failure_is_returned() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();
        ctx.store
            .inject_failure(Verb::Create, "ManifestWork", "cluster1-klusterlet-addon-crds");

        let err = reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap_err();
        assert!(!err.is_conflict());
        assert!(ctx
            .store
            .calls_matching(Verb::Create, "ManagedClusterAddOn")
            .is_empty());
    }

    #[tokio::test]
    async fn test_pull_secret_is_read_uncached_and_copied() {
        let ctx = context(ImageDefaults {
            image_pull_secret: "multiclusterhub-operator-pull-secret".to_string(),
            image_registry: String::new(),
        });
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();
        let mut secret = Secret {
            data: Some(BTreeMap::from([(
                ".dockerconfigjson".to_string(),
                ByteString(b"{}".to_vec()),
            )])),
            type_: Some("kubernetes.io/dockerconfigjson".to_string()),
            ..Default::default()
        };
        secret.metadata.name = Some("multiclusterhub-operator-pull-secret".to_string());
        secret.metadata.namespace = Some(NAME.to_string());
        ctx.store.insert(&secret).unwrap();

        reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();

        assert_eq!(
            ctx.store.calls_matching(Verb::GetUncached, "Secret").len(),
            1
        );
        assert!(ctx.store.calls_matching(Verb::Get, "Secret").is_empty());

        let operator: ManifestWork = ctx
            .store
            .fetch(&ObjectKey::namespaced(NAME, "cluster1-klusterlet-addon-operator"))
            .unwrap();
        assert!(operator
            .spec
            .workload
            .manifests
            .iter()
            .any(|m| m["kind"] == "Secret"));
    }

    #[tokio::test]
    async fn test_missing_pull_secret_renders_operator_without_it() {
        let ctx = context(ImageDefaults {
            image_pull_secret: "missing".to_string(),
            image_registry: String::new(),
        });
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();

        reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();

        let operator: ManifestWork = ctx
            .store
            .fetch(&ObjectKey::namespaced(NAME, "cluster1-klusterlet-addon-operator"))
            .unwrap();
        assert!(operator
            .spec
            .workload
            .manifests
            .iter()
            .all(|m| m["kind"] != "Secret"));
    }

    #[tokio::test]
    async fn test_backfill_is_not_written_back() {
        let ctx = context(ImageDefaults {
            image_pull_secret: String::new(),
            image_registry: "registry.example.com/acm".to_string(),
        });
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();

        reconcile_klusterlet_addon_config(&ctx, &owner_key())
            .await
            .unwrap();

        assert!(ctx
            .store
            .writes()
            .iter()
            .all(|c| c.kind != "KlusterletAddonConfig"));
        let owner: KlusterletAddonConfig = ctx.store.fetch(&owner_key()).unwrap();
        assert!(owner.spec.image_registry.is_empty());
    }

    #[tokio::test]
    async fn test_orphan_sweep_releases_cluster() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&cluster(true, true)).unwrap();

        let directive = reconcile_orphaned_cluster(&ctx, NAME).await.unwrap();
        assert_eq!(directive, Directive::Done);
        let cluster: ManagedCluster = ctx.store.fetch(&cluster_key()).unwrap();
        assert!(cluster.finalizers().is_empty());
    }

    #[tokio::test]
    async fn test_orphan_sweep_leaves_owned_cluster_alone() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&owner(true)).unwrap();
        ctx.store.insert(&cluster(true, true)).unwrap();

        reconcile_orphaned_cluster(&ctx, NAME).await.unwrap();
        assert!(ctx.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_orphan_sweep_conflict_requeues() {
        let ctx = context(ImageDefaults::default());
        ctx.store.insert(&cluster(true, true)).unwrap();
        ctx.store.inject_conflict(Verb::Patch, "ManagedCluster", NAME);

        let directive = reconcile_orphaned_cluster(&ctx, NAME).await.unwrap();
        assert_eq!(directive, Directive::short());
    }
}
