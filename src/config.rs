// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration loaded from environment variables.
//!
//! Two kinds of settings live here:
//!
//! - [`ControllerConfig`] is read once at startup and fixed for the life of the
//!   process (condition kinds, image defaults for the operator, backoff bounds,
//!   metrics address).
//! - [`ImageDefaults`] are the fallback pull secret and registry applied to a
//!   `KlusterletAddonConfig` whose own fields are empty. They are read through an
//!   [`ImageDefaultsSource`] once per reconciliation cycle, so a change to the
//!   deployment environment is picked up without a restart of the cycle logic.

use crate::constants::{
    DEFAULT_ADDON_VERSION, DEFAULT_CLUSTER_AVAILABLE_CONDITION, DEFAULT_IMAGE_PULL_POLICY,
    DEFAULT_IMAGE_REGISTRY, DEFAULT_WORK_AVAILABLE_CONDITION, ERROR_BACKOFF_INITIAL_SECS,
    ERROR_BACKOFF_MAX_SECS, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT,
};
use std::time::Duration;

/// Environment variable naming the default image pull secret
pub const ENV_DEFAULT_IMAGE_PULL_SECRET: &str = "DEFAULT_IMAGE_PULL_SECRET";

/// Environment variable naming the default image registry
pub const ENV_DEFAULT_IMAGE_REGISTRY: &str = "DEFAULT_IMAGE_REGISTRY";

/// Process-level controller settings.
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Condition type that marks a `ManagedCluster` as available
    pub cluster_available_condition: String,
    /// Condition type that marks a `ManifestWork` as available
    pub work_available_condition: String,
    /// Registry used for the add-on operator image when the owner names none
    pub operator_image_registry: String,
    /// Image tag used when the owner does not pin a version
    pub addon_version: String,
    /// Pull policy used when the owner does not set one
    pub image_pull_policy: String,
    /// First requeue delay after a failed cycle (seconds)
    pub error_backoff_initial_secs: u64,
    /// Upper bound on the requeue delay after repeated failures (seconds)
    pub error_backoff_max_secs: u64,
    /// Address the metrics and health server binds to
    pub metrics_bind_address: String,
    /// Port the metrics and health server listens on
    pub metrics_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cluster_available_condition: DEFAULT_CLUSTER_AVAILABLE_CONDITION.to_string(),
            work_available_condition: DEFAULT_WORK_AVAILABLE_CONDITION.to_string(),
            operator_image_registry: DEFAULT_IMAGE_REGISTRY.to_string(),
            addon_version: DEFAULT_ADDON_VERSION.to_string(),
            image_pull_policy: DEFAULT_IMAGE_PULL_POLICY.to_string(),
            error_backoff_initial_secs: ERROR_BACKOFF_INITIAL_SECS,
            error_backoff_max_secs: ERROR_BACKOFF_MAX_SECS,
            metrics_bind_address: METRICS_SERVER_BIND_ADDRESS.to_string(),
            metrics_port: METRICS_SERVER_PORT,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_or = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            cluster_available_condition: get("CLUSTER_AVAILABLE_CONDITION")
                .unwrap_or(defaults.cluster_available_condition),
            work_available_condition: get("WORK_AVAILABLE_CONDITION")
                .unwrap_or(defaults.work_available_condition),
            operator_image_registry: get("OPERATOR_IMAGE_REGISTRY")
                .unwrap_or(defaults.operator_image_registry),
            addon_version: get("ADDON_VERSION").unwrap_or(defaults.addon_version),
            image_pull_policy: get("IMAGE_PULL_POLICY").unwrap_or(defaults.image_pull_policy),
            error_backoff_initial_secs: parse_or(
                "ERROR_BACKOFF_INITIAL_SECS",
                defaults.error_backoff_initial_secs,
            ),
            error_backoff_max_secs: parse_or(
                "ERROR_BACKOFF_MAX_SECS",
                defaults.error_backoff_max_secs,
            ),
            metrics_bind_address: get("METRICS_BIND_ADDRESS")
                .unwrap_or(defaults.metrics_bind_address),
            metrics_port: get("METRICS_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.metrics_port),
        }
    }

    /// First requeue delay after a failed cycle
    #[must_use]
    pub fn error_backoff_initial(&self) -> Duration {
        Duration::from_secs(self.error_backoff_initial_secs)
    }

    /// Upper bound on the requeue delay after repeated failures
    #[must_use]
    pub fn error_backoff_max(&self) -> Duration {
        Duration::from_secs(self.error_backoff_max_secs.max(self.error_backoff_initial_secs))
    }

    /// `address:port` of the metrics and health server
    #[must_use]
    pub fn metrics_socket_address(&self) -> String {
        format!("{}:{}", self.metrics_bind_address, self.metrics_port)
    }
}

/// Fallback values for a `KlusterletAddonConfig`'s image fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDefaults {
    /// Default image pull secret name
    pub image_pull_secret: String,
    /// Default image registry
    pub image_registry: String,
}

/// Supplies [`ImageDefaults`] to a reconciliation cycle.
///
/// Read once at the start of the active path of every cycle.
pub trait ImageDefaultsSource: Send + Sync {
    fn load(&self) -> ImageDefaults;
}

/// A fixed set of defaults.
impl ImageDefaultsSource for ImageDefaults {
    fn load(&self) -> ImageDefaults {
        self.clone()
    }
}

/// Reads `DEFAULT_IMAGE_PULL_SECRET` and `DEFAULT_IMAGE_REGISTRY` on every load.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvImageDefaults;

impl ImageDefaultsSource for EnvImageDefaults {
    fn load(&self) -> ImageDefaults {
        ImageDefaults {
            image_pull_secret: std::env::var(ENV_DEFAULT_IMAGE_PULL_SECRET).unwrap_or_default(),
            image_registry: std::env::var(ENV_DEFAULT_IMAGE_REGISTRY).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
