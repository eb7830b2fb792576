// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle decisions for a `KlusterletAddonConfig`.
//!
//! Nothing in this module performs I/O. The reconciler fetches the owner
//! (`KlusterletAddonConfig`), the target (`ManagedCluster`) and the CRD bundle
//! `ManifestWork`, hands the snapshots to [`LifecycleState::observe`] and
//! [`ActivePhase::observe`], and acts on the answer.
//!
//! States are derived from the snapshots on every cycle and never stored:
//!
//! | State | Condition |
//! |---|---|
//! | `NoOwner` | owner absent |
//! | `Deleting` | owner has a deletion timestamp |
//! | `NoTarget` | target absent |
//! | `TargetDeleting` | target has a deletion timestamp, owner does not |
//! | `Paused` | owner carries the pause annotation |
//! | `Active` | everything else; refined by [`ActivePhase`] |

use crate::config::ImageDefaults;
use crate::constants::{REQUEUE_SHORT_SECS, REQUEUE_STEADY_SECS, REQUEUE_WAITING_SECS};
use crate::crd::{KlusterletAddonConfig, ManagedCluster, ManifestWork};
use crate::labels::ANNOTATION_PAUSE;
use crate::reconcilers::conditions::{has_conditions, is_cluster_available, is_work_available};
use kube::runtime::controller::Action;
use kube::Resource;
use std::fmt;
use std::time::Duration;

/// Scheduling outcome of a reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Nothing left to do until the next change notification
    Done,
    /// Run again immediately
    RequeueNow,
    /// Run again after the given delay
    RequeueAfter(Duration),
}

impl Directive {
    /// Retry after a conflict or an incomplete teardown.
    #[must_use]
    pub const fn short() -> Self {
        Self::RequeueAfter(Duration::from_secs(REQUEUE_SHORT_SECS))
    }

    /// Re-check while the managed cluster applies a payload.
    #[must_use]
    pub const fn waiting() -> Self {
        Self::RequeueAfter(Duration::from_secs(REQUEUE_WAITING_SECS))
    }

    /// Steady-state re-check.
    #[must_use]
    pub const fn steady() -> Self {
        Self::RequeueAfter(Duration::from_secs(REQUEUE_STEADY_SECS))
    }

    /// Label used when recording the requeue in metrics.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::RequeueNow => "immediate",
            Self::RequeueAfter(d) if d.as_secs() <= REQUEUE_SHORT_SECS => "retry",
            Self::RequeueAfter(d) if d.as_secs() <= REQUEUE_WAITING_SECS => "waiting",
            Self::RequeueAfter(_) => "steady",
        }
    }
}

impl From<Directive> for Action {
    fn from(directive: Directive) -> Self {
        match directive {
            Directive::Done => Action::await_change(),
            Directive::RequeueNow => Action::requeue(Duration::ZERO),
            Directive::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::RequeueNow => f.write_str("requeue now"),
            Self::RequeueAfter(d) => write!(f, "requeue after {}s", d.as_secs()),
        }
    }
}

/// Lifecycle state of an owner/target pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// The `KlusterletAddonConfig` no longer exists.
    NoOwner,
    /// The `KlusterletAddonConfig` is being deleted.
    ///
    /// `force_remove_finalizers` is set when the managed cluster is gone or
    /// unavailable; its work agent will never release the `ManifestWork`s, so
    /// their finalizers are stripped during teardown.
    Deleting { force_remove_finalizers: bool },
    /// The `ManagedCluster` does not exist.
    NoTarget,
    /// The `ManagedCluster` is being deleted and the owner must follow.
    TargetDeleting,
    /// Reconciliation is paused by annotation.
    Paused,
    /// Normal operation.
    Active,
}

impl LifecycleState {
    /// Derive the state from the current snapshots.
    #[must_use]
    pub fn observe(
        owner: Option<&KlusterletAddonConfig>,
        target: Option<&ManagedCluster>,
        cluster_available_condition: &str,
    ) -> Self {
        let Some(owner) = owner else {
            return Self::NoOwner;
        };

        if is_deleting(owner) {
            let force_remove_finalizers =
                target.is_none() || !is_cluster_available(target, cluster_available_condition);
            return Self::Deleting {
                force_remove_finalizers,
            };
        }

        let Some(target) = target else {
            return Self::NoTarget;
        };

        if is_deleting(target) {
            return Self::TargetDeleting;
        }

        if is_paused(owner) {
            return Self::Paused;
        }

        Self::Active
    }

    /// Whether the owner and target must both carry the shared finalizer.
    #[must_use]
    pub fn needs_finalizers(self) -> bool {
        matches!(self, Self::TargetDeleting | Self::Paused | Self::Active)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOwner => "NoOwner",
            Self::Deleting { .. } => "Deleting",
            Self::NoTarget => "NoTarget",
            Self::TargetDeleting => "TargetDeleting",
            Self::Paused => "Paused",
            Self::Active => "Active",
        };
        f.write_str(name)
    }
}

/// Refinement of [`LifecycleState::Active`] once the bundles are ensured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePhase {
    /// The CRD bundle has not reported any condition yet.
    Provisioning { target_available: bool },
    /// The CRD bundle reported conditions, but not availability.
    WaitingCrdAvailability,
    /// The CRDs are in place; component CRs follow the enablement flags.
    Steady,
}

impl ActivePhase {
    #[must_use]
    pub fn observe(
        crd_work: Option<&ManifestWork>,
        target_available: bool,
        work_available_condition: &str,
    ) -> Self {
        if !has_conditions(crd_work) {
            return Self::Provisioning { target_available };
        }
        if is_work_available(crd_work, work_available_condition) {
            Self::Steady
        } else {
            Self::WaitingCrdAvailability
        }
    }

    /// Whether component CR works are synchronized in this phase.
    #[must_use]
    pub fn syncs_components(self) -> bool {
        matches!(self, Self::Steady)
    }

    /// When to look again.
    ///
    /// An unavailable cluster will not apply the CRD bundle any time soon, so
    /// provisioning against it falls back to the steady-state interval.
    #[must_use]
    pub fn directive(self) -> Directive {
        match self {
            Self::Provisioning {
                target_available: true,
            }
            | Self::WaitingCrdAvailability => Directive::waiting(),
            Self::Provisioning {
                target_available: false,
            }
            | Self::Steady => Directive::steady(),
        }
    }
}

impl fmt::Display for ActivePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Provisioning { .. } => "Active-Provisioning",
            Self::WaitingCrdAvailability => "Active-WaitingCRDAvailability",
            Self::Steady => "Active-Steady",
        };
        f.write_str(name)
    }
}

/// Whether the resource has a deletion timestamp.
pub fn is_deleting<K: Resource>(resource: &K) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Whether the pause annotation is set to `"true"` in any letter case.
#[must_use]
pub fn is_paused(owner: &KlusterletAddonConfig) -> bool {
    owner
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_PAUSE))
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Fill the owner's empty image fields from the process defaults.
///
/// Only the in-memory copy changes; the owner is never written back. Returns
/// `true` when a field was filled.
pub fn backfill_image_defaults(owner: &mut KlusterletAddonConfig, defaults: &ImageDefaults) -> bool {
    let mut changed = false;
    if owner.spec.image_pull_secret.is_empty() && !defaults.image_pull_secret.is_empty() {
        owner.spec.image_pull_secret.clone_from(&defaults.image_pull_secret);
        changed = true;
    }
    if owner.spec.image_registry.is_empty() && !defaults.image_registry.is_empty() {
        owner.spec.image_registry.clone_from(&defaults.image_registry);
        changed = true;
    }
    changed
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;
