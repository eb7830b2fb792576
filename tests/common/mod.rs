// Common test utilities for integration tests

#![allow(dead_code)]

use klusterlet_addon_controller::config::{ControllerConfig, ImageDefaults};
use klusterlet_addon_controller::context::Context;
use klusterlet_addon_controller::crd::{
    AddonAgentConfig, Condition, KlusterletAddonConfig, KlusterletAddonConfigSpec, ManagedCluster,
    ManagedClusterStatus, ManagedClusterVersion, ManifestWork, ManifestWorkStatus,
};
use klusterlet_addon_controller::labels::FINALIZER_KLUSTERLET_ADDON;
use klusterlet_addon_controller::store::memory::MemoryStore;
use klusterlet_addon_controller::store::ObjectKey;
use kube::client::Client;
use std::sync::Arc;

/// Name shared by the test cluster, its namespace and its config
pub const CLUSTER: &str = "cluster1";

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {}", e);
            None
        }
    }
}

pub fn owner_key() -> ObjectKey {
    ObjectKey::namespaced(CLUSTER, CLUSTER)
}

pub fn cluster_key() -> ObjectKey {
    ObjectKey::cluster(CLUSTER)
}

/// Context over a fresh in-memory store with fixed image defaults
pub fn memory_context(defaults: ImageDefaults) -> Context<MemoryStore> {
    Context::new(MemoryStore::new(), ControllerConfig::default())
        .with_image_defaults(Arc::new(defaults))
}

/// A `KlusterletAddonConfig` with the policy controller and search collector enabled
pub fn owner(finalized: bool) -> KlusterletAddonConfig {
    let mut owner = KlusterletAddonConfig::new(
        CLUSTER,
        KlusterletAddonConfigSpec {
            cluster_name: CLUSTER.to_string(),
            cluster_namespace: CLUSTER.to_string(),
            policy_controller: AddonAgentConfig { enabled: true },
            search_collector: AddonAgentConfig { enabled: true },
            ..Default::default()
        },
    );
    owner.metadata.namespace = Some(CLUSTER.to_string());
    if finalized {
        owner.metadata.finalizers = Some(vec![FINALIZER_KLUSTERLET_ADDON.to_string()]);
    }
    owner
}

/// A `ManagedCluster` reporting the given availability
pub fn cluster(finalized: bool, available: bool) -> ManagedCluster {
    let mut cluster = ManagedCluster::new(CLUSTER, Default::default());
    if finalized {
        cluster.metadata.finalizers = Some(vec![FINALIZER_KLUSTERLET_ADDON.to_string()]);
    }
    cluster.status = Some(ManagedClusterStatus {
        conditions: vec![condition(
            &ControllerConfig::default().cluster_available_condition,
            available,
        )],
        version: Some(ManagedClusterVersion {
            kubernetes: Some("v1.21.3".to_string()),
        }),
    });
    cluster
}

pub fn condition(kind: &str, status: bool) -> Condition {
    Condition {
        r#type: kind.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        ..Default::default()
    }
}

/// Seed a `ManifestWork` carrying the work agent's finalizer
pub fn work(name: &str) -> ManifestWork {
    let mut work = ManifestWork::new(name, Default::default());
    work.metadata.namespace = Some(CLUSTER.to_string());
    work.metadata.finalizers = Some(vec![
        klusterlet_addon_controller::labels::FINALIZER_MANIFEST_WORK_CLEANUP.to_string(),
    ]);
    work
}

/// Mark a stored `ManifestWork` as available, the way the work agent would
pub fn report_work_available(store: &MemoryStore, name: &str) {
    let key = ObjectKey::namespaced(CLUSTER, name);
    let mut work: ManifestWork = store.fetch(&key).expect("work should exist");
    work.status = Some(ManifestWorkStatus {
        conditions: vec![condition(
            &ControllerConfig::default().work_available_condition,
            true,
        )],
    });
    store.insert(&work).expect("work should serialize");
}
