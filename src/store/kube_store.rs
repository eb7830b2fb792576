// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] backed by the Kubernetes API server.
//!
//! Every call goes straight to the API server through `kube::Api`; no reflector
//! cache sits in front of it. Secrets are read through their own path so that
//! a cached store can be introduced for the other kinds without ever serving a
//! stale pull secret.

use super::{MetadataPatch, ObjectKey, ObjectStore, StoreError, StoreResource};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Store that issues every request against the API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreResource>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let api = K::api(&self.client, key.namespace.as_deref());
        api.get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube("get", &K::kind_name(), key, e))
    }

    async fn create<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj);
        debug!("Creating {} {}", K::kind_name(), key);
        let api = K::api(&self.client, key.namespace.as_deref());
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| StoreError::from_kube("create", &K::kind_name(), &key, e))
    }

    async fn update<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj);
        debug!(
            "Updating {} {} at resourceVersion {:?}",
            K::kind_name(),
            key,
            obj.resource_version()
        );
        let api = K::api(&self.client, key.namespace.as_deref());
        api.replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| StoreError::from_kube("update", &K::kind_name(), &key, e))
    }

    async fn patch_metadata<K: StoreResource>(
        &self,
        key: &ObjectKey,
        patch: &MetadataPatch,
    ) -> Result<K, StoreError> {
        debug!(
            "Patching metadata of {} {} at resourceVersion {:?}",
            K::kind_name(),
            key,
            patch.resource_version
        );
        let api = K::api(&self.client, key.namespace.as_deref());
        let body = patch.to_merge_patch();
        api.patch(&key.name, &PatchParams::default(), &Patch::Merge(&body))
            .await
            .map_err(|e| StoreError::from_kube("patch", &K::kind_name(), key, e))
    }

    async fn delete<K: StoreResource>(&self, key: &ObjectKey) -> Result<(), StoreError> {
        debug!("Deleting {} {}", K::kind_name(), key);
        let api = K::api(&self.client, key.namespace.as_deref());
        api.delete(&key.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube("delete", &K::kind_name(), key, e))
    }

    async fn get_secret_uncached(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = match key.namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        };
        api.get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube("get", "Secret", key, e))
    }
}
