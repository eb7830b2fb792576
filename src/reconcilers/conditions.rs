// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Availability checks over status conditions.
//!
//! Conditions are written by the registration and work agents, never by this
//! controller. A missing resource, a missing status, an empty list or a
//! condition whose status is anything other than the literal `"True"` all
//! read as "not available"; none of them is an error.
//!
//! The condition types are configuration (see
//! [`ControllerConfig`](crate::config::ControllerConfig)) rather than constants.

use crate::constants::CONDITION_STATUS_TRUE;
use crate::crd::{Condition, ManagedCluster, ManifestWork};

/// Whether any condition of `condition_type` has status `"True"`.
#[must_use]
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.r#type == condition_type && c.status == CONDITION_STATUS_TRUE)
}

/// Whether the managed cluster reports itself available.
///
/// ```rust
/// use klusterlet_addon_controller::reconcilers::conditions::is_cluster_available;
///
/// assert!(!is_cluster_available(None, "ManagedClusterConditionAvailable"));
/// ```
#[must_use]
pub fn is_cluster_available(cluster: Option<&ManagedCluster>, condition_type: &str) -> bool {
    cluster
        .and_then(|c| c.status.as_ref())
        .is_some_and(|s| is_condition_true(&s.conditions, condition_type))
}

/// Whether a `ManifestWork` has been applied and reported available.
#[must_use]
pub fn is_work_available(work: Option<&ManifestWork>, condition_type: &str) -> bool {
    work.and_then(|w| w.status.as_ref())
        .is_some_and(|s| is_condition_true(&s.conditions, condition_type))
}

/// Whether a `ManifestWork` has reported any condition at all.
#[must_use]
pub fn has_conditions(work: Option<&ManifestWork>) -> bool {
    work.and_then(|w| w.status.as_ref())
        .is_some_and(|s| !s.conditions.is_empty())
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod conditions_tests;
