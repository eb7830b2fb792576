// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the controllers.
//!
//! Both controllers receive an `Arc<Context<S>>` that contains:
//! - the object store used for every read and write
//! - the process configuration
//! - the pluggable collaborators (payload builder, label policy, image defaults)
//! - the per-key failure backoff used by the error policy
//!
//! `S` is [`KubeStore`](crate::store::KubeStore) in the running controller and
//! [`MemoryStore`](crate::store::MemoryStore) in tests.

use crate::config::{ControllerConfig, EnvImageDefaults, ImageDefaultsSource};
use crate::manifests::{DefaultPayloadBuilder, PayloadBuilder};
use crate::reconcilers::backoff::FailureBackoff;
use crate::reconcilers::label_policy::{LabelPolicy, PolicyControllerLabel};
use crate::store::ObjectStore;
use std::sync::Arc;

/// Shared context passed to the controllers.
pub struct Context<S: ObjectStore> {
    /// Object store for API operations
    pub store: S,

    /// Process configuration
    pub config: ControllerConfig,

    /// Renders `ManifestWork` payloads
    pub payloads: Arc<dyn PayloadBuilder>,

    /// Decides the cross-component label on the `ManagedCluster`
    pub label_policy: Arc<dyn LabelPolicy>,

    /// Fallback image pull secret and registry, read once per cycle
    pub image_defaults: Arc<dyn ImageDefaultsSource>,

    /// Requeue delays after failed cycles
    pub backoff: FailureBackoff,
}

impl<S: ObjectStore> Context<S> {
    /// Context with the production collaborators.
    ///
    /// Image defaults come from `DEFAULT_IMAGE_PULL_SECRET` and
    /// `DEFAULT_IMAGE_REGISTRY`.
    #[must_use]
    pub fn new(store: S, config: ControllerConfig) -> Self {
        Self {
            store,
            payloads: Arc::new(DefaultPayloadBuilder::new(&config)),
            label_policy: Arc::new(PolicyControllerLabel),
            image_defaults: Arc::new(EnvImageDefaults),
            backoff: FailureBackoff::from_config(&config),
            config,
        }
    }

    #[must_use]
    pub fn with_payloads(mut self, payloads: Arc<dyn PayloadBuilder>) -> Self {
        self.payloads = payloads;
        self
    }

    #[must_use]
    pub fn with_label_policy(mut self, label_policy: Arc<dyn LabelPolicy>) -> Self {
        self.label_policy = label_policy;
        self
    }

    #[must_use]
    pub fn with_image_defaults(mut self, image_defaults: Arc<dyn ImageDefaultsSource>) -> Self {
        self.image_defaults = image_defaults;
        self
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
