// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry of the add-on components a `KlusterletAddonConfig` can enable.
//!
//! Each component maps to one per-component `ManifestWork`
//! (`<owner>-klusterlet-addon-<addon>`), one custom resource rendered into that
//! work, and one hub-side `ManagedClusterAddOn`.

use crate::constants::{COMPONENT_CR_PREFIX, COMPONENT_WORK_INFIX};
use crate::crd::KlusterletAddonConfig;
use std::fmt;

/// An add-on component managed through a `KlusterletAddonConfig`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddonComponent {
    ApplicationManager,
    CertPolicyController,
    IamPolicyController,
    PolicyController,
    SearchCollector,
}

impl AddonComponent {
    /// Every component, in rendering order.
    pub const ALL: [AddonComponent; 5] = [
        AddonComponent::ApplicationManager,
        AddonComponent::CertPolicyController,
        AddonComponent::IamPolicyController,
        AddonComponent::PolicyController,
        AddonComponent::SearchCollector,
    ];

    /// Short addon name used in `ManifestWork` names
    #[must_use]
    pub fn addon_name(self) -> &'static str {
        match self {
            Self::ApplicationManager => "appmgr",
            Self::CertPolicyController => "certpolicyctrl",
            Self::IamPolicyController => "iampolicyctrl",
            Self::PolicyController => "policyctrl",
            Self::SearchCollector => "search",
        }
    }

    /// Name of the hub-side `ManagedClusterAddOn`
    #[must_use]
    pub fn managed_cluster_addon_name(self) -> &'static str {
        match self {
            Self::ApplicationManager => "application-manager",
            Self::CertPolicyController => "cert-policy-controller",
            Self::IamPolicyController => "iam-policy-controller",
            Self::PolicyController => "policy-controller",
            Self::SearchCollector => "search-collector",
        }
    }

    /// Kind of the custom resource the add-on operator consumes
    #[must_use]
    pub fn cr_kind(self) -> &'static str {
        match self {
            Self::ApplicationManager => "ApplicationManager",
            Self::CertPolicyController => "CertPolicyController",
            Self::IamPolicyController => "IAMPolicyController",
            Self::PolicyController => "PolicyController",
            Self::SearchCollector => "SearchCollector",
        }
    }

    /// Key of the component image in `imageOverrides`
    #[must_use]
    pub fn image_key(self) -> &'static str {
        match self {
            Self::ApplicationManager => "multicluster_operators_subscription",
            Self::CertPolicyController => "cert_policy_controller",
            Self::IamPolicyController => "iam_policy_controller",
            Self::PolicyController => "config_policy_controller",
            Self::SearchCollector => "search_collector",
        }
    }

    /// Whether the agent talks back to the hub and needs a hub kubeconfig secret.
    #[must_use]
    pub fn requires_hub_kubeconfig(self) -> bool {
        true
    }

    /// Name of the hub kubeconfig secret mounted by the agent
    #[must_use]
    pub fn hub_kubeconfig_secret(self) -> String {
        format!("{}-hub-kubeconfig", self.managed_cluster_addon_name())
    }

    /// Name of the custom resource inside the agent namespace
    #[must_use]
    pub fn cr_name(self) -> String {
        format!("{COMPONENT_CR_PREFIX}{}", self.addon_name())
    }

    /// Name of the per-component `ManifestWork` for an owner
    #[must_use]
    pub fn work_name(self, owner_name: &str) -> String {
        format!("{owner_name}{COMPONENT_WORK_INFIX}{}", self.addon_name())
    }

    /// Whether the owner enables this component
    #[must_use]
    pub fn is_enabled(self, owner: &KlusterletAddonConfig) -> bool {
        let spec = &owner.spec;
        match self {
            Self::ApplicationManager => spec.application_manager.enabled,
            Self::CertPolicyController => spec.cert_policy_controller.enabled,
            Self::IamPolicyController => spec.iam_policy_controller.enabled,
            Self::PolicyController => spec.policy_controller.enabled,
            Self::SearchCollector => spec.search_collector.enabled,
        }
    }
}

impl fmt::Display for AddonComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.addon_name())
    }
}

#[cfg(test)]
#[path = "components_tests.rs"]
mod components_tests;
