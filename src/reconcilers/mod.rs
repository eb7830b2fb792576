// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `KlusterletAddonConfig`.
//!
//! # Reconciliation Architecture
//!
//! Each cycle is split into a pure decision layer and a thin I/O shell:
//!
//! 1. **Observe** - fetch the owner, the `ManagedCluster` and the CRD bundle work
//! 2. **Decide** - derive a [`lifecycle::LifecycleState`] and, when active, an
//!    [`lifecycle::ActivePhase`]
//! 3. **Act** - ensure or tear down `ManifestWork`s, toggle finalizers and labels
//! 4. **Schedule** - return a [`lifecycle::Directive`] to the controller
//!
//! # Modules
//!
//! - [`klusterletaddon`] - the cycle shell and the orphaned cluster sweep
//! - [`lifecycle`] - states, phases and directives
//! - [`manifestwork`] - `ensure`/`delete` and the tiered teardown
//! - [`addons`] - `ManagedClusterAddOn` creation
//! - [`label_policy`] - the policy-controller label on the `ManagedCluster`
//! - [`conditions`] - availability checks
//! - [`finalizers`] - finalizer bookkeeping
//! - [`backoff`] - error requeue delays

pub mod addons;
pub mod backoff;
pub mod conditions;
pub mod finalizers;
pub mod klusterletaddon;
pub mod label_policy;
pub mod lifecycle;
pub mod manifestwork;

pub use klusterletaddon::{reconcile_klusterlet_addon_config, reconcile_orphaned_cluster};

use crate::manifests::ManifestError;
use crate::store::StoreError;
use thiserror::Error;

/// Error that aborts a reconciliation cycle.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Payload(#[from] ManifestError),
}

impl ReconcileError {
    /// Whether the error is a benign race the cycle absorbs with a short requeue.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }

    /// Whether an object the cycle read has disappeared since.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}
