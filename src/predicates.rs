// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admission of dependent-resource notifications.
//!
//! `ManagedClusterAddOn`s are watched only so that an out-of-band deletion
//! triggers a cycle that recreates them. Creates, updates and resyncs of
//! those objects carry no information the owner cycle needs, so they are
//! dropped before they reach the controller queue.

use futures::future;
use futures::{Stream, TryStreamExt};
use kube::runtime::watcher;
use kube::Resource;
use tracing::error;

/// A change notification for a dependent resource.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent<K> {
    Create(K),
    Update(K),
    /// A deletion; the object may be missing from a malformed notification.
    Delete(Option<K>),
    Generic(K),
}

impl<K> LifecycleEvent<K> {
    /// Translate a watcher event.
    ///
    /// Objects seen during the initial listing are creates, later applies are
    /// updates. Listing boundaries carry no object and map to `None`.
    pub fn from_watch(event: watcher::Event<K>) -> Option<Self> {
        match event {
            watcher::Event::InitApply(obj) => Some(Self::Create(obj)),
            watcher::Event::Apply(obj) => Some(Self::Update(obj)),
            watcher::Event::Delete(obj) => Some(Self::Delete(Some(obj))),
            watcher::Event::Init | watcher::Event::InitDone => None,
        }
    }
}

/// Whether a dependent notification should trigger a cycle.
///
/// Only deletions that carry a named object are admitted.
pub fn admit_dependent_event<K: Resource>(event: &LifecycleEvent<K>) -> bool {
    match event {
        LifecycleEvent::Delete(Some(obj)) => {
            if obj.meta().name.as_deref().is_some_and(|n| !n.is_empty()) {
                true
            } else {
                error!("Delete event object has no name, ignoring");
                false
            }
        }
        LifecycleEvent::Delete(None) => {
            error!("Delete event has no object to delete, ignoring");
            false
        }
        LifecycleEvent::Create(_) | LifecycleEvent::Update(_) | LifecycleEvent::Generic(_) => {
            false
        }
    }
}

/// The deleted object of an admitted watcher event.
pub fn admitted_deletion<K: Resource>(event: watcher::Event<K>) -> Option<K> {
    let event = LifecycleEvent::from_watch(event)?;
    if !admit_dependent_event(&event) {
        return None;
    }
    match event {
        LifecycleEvent::Delete(obj) => obj,
        _ => None,
    }
}

/// Narrow a watcher stream to admitted deletions.
///
/// The result can be handed to `Controller::owns_stream`, which maps each
/// object back to its controlling owner.
pub fn dependent_deletions<K, S>(events: S) -> impl Stream<Item = Result<K, watcher::Error>>
where
    K: Resource,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    events.try_filter_map(|event| future::ready(Ok(admitted_deletion(event))))
}

#[cfg(test)]
#[path = "predicates_tests.rs"]
mod predicates_tests;
