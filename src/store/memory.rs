// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`ObjectStore`] with API-server-like write semantics.
//!
//! Objects are kept as JSON keyed by kind, namespace and name. The store
//! reproduces the parts of API server behaviour the lifecycle depends on:
//!
//! - `resourceVersion` is bumped on every write and checked on `update`
//! - `delete` on an object with finalizers only sets `deletionTimestamp`
//! - an `update` that empties the finalizers of a deleting object removes it
//! - `deletionTimestamp` cannot be set or cleared through `update`
//! - `patch_metadata` changes only finalizers and labels, and finalizes a
//!   deleting object the same way `update` does
//!
//! Every call is appended to a log so tests can assert on ordering, and
//! conflicts or transient failures can be injected for a single call.

use super::{MetadataPatch, ObjectKey, ObjectStore, StoreError, StoreResource};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Store verb recorded in the call log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    GetUncached,
    Create,
    Update,
    Patch,
    Delete,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetUncached => "get_uncached",
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }

    /// Whether the verb mutates the store
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Patch | Self::Delete)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded store call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreCall {
    pub verb: Verb,
    pub kind: String,
    pub key: ObjectKey,
}

impl fmt::Display for StoreCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.verb, self.kind, self.key)
    }
}

type SlotKey = (String, Option<String>, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<SlotKey, Value>,
    next_version: u64,
    calls: Vec<StoreCall>,
    conflicts: Vec<(Verb, String, String)>,
    failures: Vec<(Verb, String, String)>,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn take_injected(list: &mut Vec<(Verb, String, String)>, verb: Verb, kind: &str, name: &str) -> bool {
        if let Some(pos) = list
            .iter()
            .position(|(v, k, n)| *v == verb && k == kind && n == name)
        {
            list.remove(pos);
            true
        } else {
            false
        }
    }
}

/// In-memory store used by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn slot<K: StoreResource>(key: &ObjectKey) -> SlotKey {
    (K::kind_name(), key.namespace.clone(), key.name.clone())
}

fn to_value<K: StoreResource>(obj: &K) -> Result<Value, StoreError> {
    serde_json::to_value(obj).map_err(|source| StoreError::Serialization {
        kind: K::kind_name(),
        source,
    })
}

fn from_value<K: StoreResource>(value: Value) -> Result<K, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Serialization {
        kind: K::kind_name(),
        source,
    })
}

fn set_meta(value: &mut Value, field: &str, v: Value) {
    if let Some(obj) = value.as_object_mut() {
        let meta = obj
            .entry("metadata")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(meta) = meta.as_object_mut() {
            meta.insert(field.to_string(), v);
        }
    }
}

fn remove_meta(value: &mut Value, field: &str) {
    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove(field);
    }
}

fn has_finalizers(value: &Value) -> bool {
    value
        .pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .is_some_and(|f| !f.is_empty())
}

fn deletion_timestamp(value: &Value) -> Option<Value> {
    value
        .pointer("/metadata/deletionTimestamp")
        .filter(|v| !v.is_null())
        .cloned()
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(state: &mut State, verb: Verb, kind: String, key: &ObjectKey) {
        state.calls.push(StoreCall {
            verb,
            kind,
            key: key.clone(),
        });
    }

    fn check_injected(state: &mut State, verb: Verb, kind: &str, key: &ObjectKey) -> Result<(), StoreError> {
        if State::take_injected(&mut state.conflicts, verb, kind, &key.name) {
            return Err(StoreError::Conflict {
                kind: kind.to_string(),
                key: key.clone(),
            });
        }
        if State::take_injected(&mut state.failures, verb, kind, &key.name) {
            return Err(StoreError::Api {
                operation: verb.as_str(),
                kind: kind.to_string(),
                key: key.clone(),
                source: "injected store failure".into(),
            });
        }
        Ok(())
    }

    /// Seed an object without recording a call.
    ///
    /// Assigns a `resourceVersion` and `uid` like a create would.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the object cannot be converted.
    pub fn insert<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj);
        let mut value = to_value(obj)?;
        let mut state = self.lock();
        let version = state.bump();
        if value.pointer("/metadata/uid").is_none() {
            set_meta(&mut value, "uid", Value::String(format!("uid-{version}")));
        }
        set_meta(&mut value, "resourceVersion", Value::String(version));
        state.objects.insert(slot::<K>(&key), value.clone());
        from_value(value)
    }

    /// Read an object without recording a call.
    #[must_use]
    pub fn fetch<K: StoreResource>(&self, key: &ObjectKey) -> Option<K> {
        let value = self.lock().objects.get(&slot::<K>(key)).cloned()?;
        from_value(value).ok()
    }

    /// Whether an object exists, without recording a call.
    #[must_use]
    pub fn contains<K: StoreResource>(&self, key: &ObjectKey) -> bool {
        self.lock().objects.contains_key(&slot::<K>(key))
    }

    /// Set `deletionTimestamp` directly, as if a user had requested deletion.
    ///
    /// Objects without finalizers are removed instead.
    pub fn mark_deleting<K: StoreResource>(&self, key: &ObjectKey) {
        let mut state = self.lock();
        let slot = slot::<K>(key);
        let Some(mut value) = state.objects.remove(&slot) else {
            return;
        };
        if has_finalizers(&value) {
            let version = state.bump();
            set_meta(&mut value, "deletionTimestamp", Value::String(now_rfc3339()));
            set_meta(&mut value, "resourceVersion", Value::String(version));
            state.objects.insert(slot, value);
        }
    }

    /// Make the next `verb` on `kind`/`name` fail with a conflict.
    pub fn inject_conflict(&self, verb: Verb, kind: &str, name: &str) {
        self.lock()
            .conflicts
            .push((verb, kind.to_string(), name.to_string()));
    }

    /// Make the next `verb` on `kind`/`name` fail with a transient API error.
    pub fn inject_failure(&self, verb: Verb, kind: &str, name: &str) {
        self.lock()
            .failures
            .push((verb, kind.to_string(), name.to_string()));
    }

    /// All calls recorded so far
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Recorded create, update, patch and delete calls
    #[must_use]
    pub fn writes(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.verb.is_write())
            .cloned()
            .collect()
    }

    /// Recorded calls matching a verb and kind
    #[must_use]
    pub fn calls_matching(&self, verb: Verb, kind: &str) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.verb == verb && c.kind == kind)
            .cloned()
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Names of stored objects of one kind in one namespace
    #[must_use]
    pub fn names<K: StoreResource>(&self, namespace: Option<&str>) -> Vec<String> {
        let kind = K::kind_name();
        self.lock()
            .objects
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns.as_deref() == namespace)
            .map(|(_, _, name)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreResource>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let kind = K::kind_name();
        let value = {
            let mut state = self.lock();
            Self::record(&mut state, Verb::Get, kind.clone(), key);
            Self::check_injected(&mut state, Verb::Get, &kind, key)?;
            state.objects.get(&slot::<K>(key)).cloned()
        };
        value.map(from_value::<K>).transpose()
    }

    async fn create<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let kind = K::kind_name();
        let key = ObjectKey::of(obj);
        let mut value = to_value(obj)?;
        let mut state = self.lock();
        Self::record(&mut state, Verb::Create, kind.clone(), &key);
        Self::check_injected(&mut state, Verb::Create, &kind, &key)?;

        let slot = slot::<K>(&key);
        if state.objects.contains_key(&slot) {
            return Err(StoreError::AlreadyExists { kind, key });
        }
        let version = state.bump();
        set_meta(&mut value, "uid", Value::String(format!("uid-{version}")));
        set_meta(&mut value, "resourceVersion", Value::String(version));
        remove_meta(&mut value, "deletionTimestamp");
        state.objects.insert(slot, value.clone());
        drop(state);
        from_value(value)
    }

    async fn update<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let kind = K::kind_name();
        let key = ObjectKey::of(obj);
        let mut value = to_value(obj)?;
        let mut state = self.lock();
        Self::record(&mut state, Verb::Update, kind.clone(), &key);
        Self::check_injected(&mut state, Verb::Update, &kind, &key)?;

        let slot = slot::<K>(&key);
        let Some(stored) = state.objects.get(&slot) else {
            return Err(StoreError::NotFound { kind, key });
        };
        let stored_version = stored.pointer("/metadata/resourceVersion").cloned();
        let stored_deletion = deletion_timestamp(stored);
        let stored_uid = stored.pointer("/metadata/uid").cloned();
        if value.pointer("/metadata/resourceVersion") != stored_version.as_ref() {
            return Err(StoreError::Conflict { kind, key });
        }

        let finalized = stored_deletion.is_some() && !has_finalizers(&value);
        let version = state.bump();
        set_meta(&mut value, "resourceVersion", Value::String(version));
        match stored_deletion {
            Some(ts) => set_meta(&mut value, "deletionTimestamp", ts),
            None => remove_meta(&mut value, "deletionTimestamp"),
        }
        if let Some(uid) = stored_uid {
            set_meta(&mut value, "uid", uid);
        }

        if finalized {
            state.objects.remove(&slot);
        } else {
            state.objects.insert(slot, value.clone());
        }
        drop(state);
        from_value(value)
    }

    async fn patch_metadata<K: StoreResource>(
        &self,
        key: &ObjectKey,
        patch: &MetadataPatch,
    ) -> Result<K, StoreError> {
        let kind = K::kind_name();
        let mut state = self.lock();
        Self::record(&mut state, Verb::Patch, kind.clone(), key);
        Self::check_injected(&mut state, Verb::Patch, &kind, key)?;

        let slot = slot::<K>(key);
        let Some(mut value) = state.objects.get(&slot).cloned() else {
            return Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            });
        };
        if let Some(rv) = &patch.resource_version {
            if value.pointer("/metadata/resourceVersion") != Some(&Value::String(rv.clone())) {
                return Err(StoreError::Conflict {
                    kind,
                    key: key.clone(),
                });
            }
        }

        if let Some(finalizers) = &patch.finalizers {
            if finalizers.is_empty() {
                remove_meta(&mut value, "finalizers");
            } else {
                set_meta(&mut value, "finalizers", serde_json::json!(finalizers));
            }
        }
        if !patch.labels.is_empty() {
            let mut labels = value
                .pointer("/metadata/labels")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            for (label, v) in &patch.labels {
                match v {
                    Some(v) => {
                        labels.insert(label.clone(), Value::String(v.clone()));
                    }
                    None => {
                        labels.remove(label);
                    }
                }
            }
            set_meta(&mut value, "labels", Value::Object(labels));
        }

        let version = state.bump();
        set_meta(&mut value, "resourceVersion", Value::String(version));
        if deletion_timestamp(&value).is_some() && !has_finalizers(&value) {
            state.objects.remove(&slot);
        } else {
            state.objects.insert(slot, value.clone());
        }
        drop(state);
        from_value(value)
    }

    async fn delete<K: StoreResource>(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let kind = K::kind_name();
        let mut state = self.lock();
        Self::record(&mut state, Verb::Delete, kind.clone(), key);
        Self::check_injected(&mut state, Verb::Delete, &kind, key)?;

        let slot = slot::<K>(key);
        let Some(mut value) = state.objects.remove(&slot) else {
            return Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            });
        };
        if has_finalizers(&value) {
            if deletion_timestamp(&value).is_none() {
                let version = state.bump();
                set_meta(&mut value, "deletionTimestamp", Value::String(now_rfc3339()));
                set_meta(&mut value, "resourceVersion", Value::String(version));
            }
            state.objects.insert(slot, value);
        }
        Ok(())
    }

    async fn get_secret_uncached(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        let kind = Secret::kind_name();
        let value = {
            let mut state = self.lock();
            Self::record(&mut state, Verb::GetUncached, kind.clone(), key);
            Self::check_injected(&mut state, Verb::GetUncached, &kind, key)?;
            state.objects.get(&slot::<Secret>(key)).cloned()
        };
        value.map(from_value::<Secret>).transpose()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
