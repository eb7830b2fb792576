// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store access used by the reconcilers.
//!
//! The reconcilers never talk to `kube::Api` directly. They go through
//! [`ObjectStore`], which exposes the four verbs the lifecycle needs plus an
//! uncached secret read, and folds API status codes into [`StoreError`]
//! variants the state machine can reason about:
//!
//! | API response            | [`StoreError`] variant |
//! |-------------------------|------------------------|
//! | 404                     | `NotFound`             |
//! | 409 `AlreadyExists`     | `AlreadyExists`        |
//! | 409 (other)             | `Conflict`             |
//! | anything else           | `Api`                  |
//!
//! Every write carries the `resourceVersion` of the object the caller last
//! read, so a concurrent writer surfaces as `Conflict` instead of being
//! silently overwritten.
//!
//! `update` replaces the whole object and is only used for objects this
//! controller owns. Objects owned by other controllers (`ManagedCluster`, and
//! `ManifestWork`s whose finalizers the work agent manages) are only ever
//! written through [`ObjectStore::patch_metadata`], a JSON merge patch of the
//! finalizers and labels. Fields the local types do not model are never sent.
//!
//! Two implementations are provided:
//!
//! - [`kube_store::KubeStore`] backed by a `kube::Client`
//! - [`memory::MemoryStore`] an in-process store with the same conflict and
//!   finalizer semantics, used by the test suites

use crate::crd::{KlusterletAddonConfig, ManagedCluster, ManagedClusterAddOn, ManifestWork};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::reflector::{Lookup, ObjectRef};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub mod kube_store;
pub mod memory;

pub use kube_store::KubeStore;
pub use memory::MemoryStore;

/// Identity of an object: optional namespace plus name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of a namespaced object
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of a cluster-scoped object
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of an existing object
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: ResourceExt::namespace(obj),
            name: obj.name_any(),
        }
    }

    /// Namespace, or `""` for cluster-scoped keys
    #[must_use]
    pub fn namespace_or_empty(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }
}

impl<K: Lookup + ?Sized> From<&ObjectRef<K>> for ObjectKey {
    fn from(obj: &ObjectRef<K>) -> Self {
        Self {
            namespace: obj.namespace.clone(),
            name: obj.name.clone(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A metadata-only write.
///
/// Rendered as a JSON merge patch that touches nothing but
/// `metadata.finalizers` and the listed labels. A label mapped to `None` is
/// removed. The `resourceVersion` is sent as a precondition, so a stale patch
/// is rejected with a conflict like a stale replace would be.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub resource_version: Option<String>,
    pub finalizers: Option<Vec<String>>,
    pub labels: BTreeMap<String, Option<String>>,
}

impl MetadataPatch {
    /// Set the finalizer list to the one carried by `obj`.
    pub fn finalizers_of<K: Resource>(obj: &K) -> Self {
        Self {
            resource_version: obj.meta().resource_version.clone(),
            finalizers: Some(obj.finalizers().to_vec()),
            labels: BTreeMap::new(),
        }
    }

    /// Set or remove label `key` to match `obj`.
    pub fn label_of<K: Resource>(obj: &K, key: &str) -> Self {
        Self {
            resource_version: obj.meta().resource_version.clone(),
            finalizers: None,
            labels: BTreeMap::from([(key.to_string(), obj.labels().get(key).cloned())]),
        }
    }

    /// The merge patch body sent to the API server.
    #[must_use]
    pub fn to_merge_patch(&self) -> Value {
        let mut metadata = Map::new();
        if let Some(rv) = &self.resource_version {
            metadata.insert("resourceVersion".to_string(), json!(rv));
        }
        if let Some(finalizers) = &self.finalizers {
            let value = if finalizers.is_empty() {
                Value::Null
            } else {
                json!(finalizers)
            };
            metadata.insert("finalizers".to_string(), value);
        }
        if !self.labels.is_empty() {
            metadata.insert("labels".to_string(), json!(self.labels));
        }
        json!({ "metadata": metadata })
    }
}

/// Errors returned by an [`ObjectStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: ObjectKey },

    /// The write was based on a stale `resourceVersion`.
    #[error("conflict writing {kind} {key}: the object has been modified")]
    Conflict { kind: String, key: ObjectKey },

    /// A create raced with another writer.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: ObjectKey },

    /// Any other failure talking to the store.
    #[error("{operation} {kind} {key} failed: {source}")]
    Api {
        operation: &'static str,
        kind: String,
        key: ObjectKey,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An object could not be converted to or from its stored form.
    #[error("failed to convert {kind}: {source}")]
    Serialization {
        kind: String,
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Map a `kube::Error` onto the store taxonomy.
    pub fn from_kube(operation: &'static str, kind: &str, key: &ObjectKey, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                key: key.clone(),
            },
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists {
                    kind: kind.to_string(),
                    key: key.clone(),
                }
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind: kind.to_string(),
                key: key.clone(),
            },
            other => Self::Api {
                operation,
                kind: kind.to_string(),
                key: key.clone(),
                source: Box::new(other),
            },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Conflicts and create races, both of which are resolved by retrying the cycle.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }
}

/// A Kubernetes type the store can read and write.
pub trait StoreResource:
    Resource<DynamicType = ()> + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// API handle scoped to `namespace` (ignored for cluster-scoped kinds).
    fn api(client: &Client, namespace: Option<&str>) -> Api<Self>;

    /// Kind name used in logs and errors
    fn kind_name() -> String {
        Self::kind(&()).to_string()
    }
}

macro_rules! namespaced_store_resource {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StoreResource for $ty {
                fn api(client: &Client, namespace: Option<&str>) -> Api<Self> {
                    match namespace {
                        Some(ns) => Api::namespaced(client.clone(), ns),
                        None => Api::default_namespaced(client.clone()),
                    }
                }
            }
        )*
    };
}

namespaced_store_resource!(KlusterletAddonConfig, ManifestWork, ManagedClusterAddOn, Secret);

impl StoreResource for ManagedCluster {
    fn api(client: &Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client.clone())
    }
}

/// Typed get/create/update/delete with optimistic concurrency.
///
/// `get` folds not-found into `Ok(None)`. `delete` reports not-found as
/// [`StoreError::NotFound`] so callers can tell "already gone" from "deletion
/// requested". `update` must carry the `resourceVersion` of the object read.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get<K: StoreResource>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    async fn create<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError>;

    async fn update<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError>;

    /// Apply a [`MetadataPatch`], leaving spec and status untouched.
    async fn patch_metadata<K: StoreResource>(
        &self,
        key: &ObjectKey,
        patch: &MetadataPatch,
    ) -> Result<K, StoreError>;

    async fn delete<K: StoreResource>(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// Read a secret straight from the API server, bypassing any cache.
    async fn get_secret_uncached(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError>;
}
