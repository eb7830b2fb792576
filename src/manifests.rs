// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Payloads delivered to the managed cluster through `ManifestWork`s.
//!
//! The reconcilers treat payloads as opaque: they ask a [`PayloadBuilder`] for
//! the desired [`ManifestWorkSpec`] of a unit and hand it to `ensure`. The
//! [`DefaultPayloadBuilder`] renders three kinds of unit:
//!
//! - **CRD bundle** - the CRDs of every component kind, served as
//!   `apiextensions.k8s.io/v1beta1` to clusters older than 1.16 and as
//!   `apiextensions.k8s.io/v1` otherwise
//! - **Operator bundle** - the agent namespace, the operator service account and
//!   binding, the operator deployment and, when the owner names one, a copy of
//!   the image pull secret
//! - **Component CR** - one custom resource per enabled component carrying the
//!   global image values and the hub kubeconfig secret name

use crate::components::AddonComponent;
use crate::config::ControllerConfig;
use crate::constants::{
    ADDON_OPERATOR_NAME, AGENT_ADDON_NAMESPACE, AGENT_API_GROUP, AGENT_API_GROUP_VERSION,
    APIEXTENSIONS_V1_MIN_MINOR, KIND_KLUSTERLET_ADDON_CONFIG,
};
use crate::crd::{KlusterletAddonConfig, ManifestWorkSpec, ManifestsTemplate};
use crate::labels::{
    K8S_COMPONENT, K8S_MANAGED_BY, K8S_PART_OF, MANAGED_BY_KLUSTERLET_ADDON_CONTROLLER,
    PART_OF_KLUSTERLET_ADDON,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, LocalObjectReference, Namespace, PodSpec, PodTemplateSpec, Secret,
    ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::ResourceExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised while rendering a payload.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to render {kind} {name}: {source}")]
    Render {
        kind: String,
        name: String,
        source: serde_json::Error,
    },
}

/// Renders the desired payload of each `ManifestWork` unit.
pub trait PayloadBuilder: Send + Sync {
    /// CRDs for every component kind, in the `apiextensions` version the
    /// managed cluster serves.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if a manifest cannot be rendered.
    fn crd_bundle(
        &self,
        owner: &KlusterletAddonConfig,
        kube_version: &str,
    ) -> Result<ManifestWorkSpec, ManifestError>;

    /// Namespace, RBAC and deployment of the add-on operator.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if a manifest cannot be rendered.
    fn operator_bundle(
        &self,
        owner: &KlusterletAddonConfig,
        pull_secret: Option<&Secret>,
    ) -> Result<ManifestWorkSpec, ManifestError>;

    /// The custom resource consumed by the operator for one component.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if a manifest cannot be rendered.
    fn component_cr(
        &self,
        owner: &KlusterletAddonConfig,
        component: AddonComponent,
    ) -> Result<ManifestWorkSpec, ManifestError>;
}

/// Controller reference from a dependent to its `KlusterletAddonConfig`.
#[must_use]
pub fn owner_references(owner: &KlusterletAddonConfig) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: AGENT_API_GROUP_VERSION.to_string(),
        kind: KIND_KLUSTERLET_ADDON_CONFIG.to_string(),
        name: owner.name_any(),
        uid: owner.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Standard labels for resources rendered on behalf of an owner
#[must_use]
pub fn build_labels(owner: &KlusterletAddonConfig, component: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".into(), owner.name_any());
    labels.insert(K8S_COMPONENT.into(), component.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_KLUSTERLET_ADDON.into());
    labels.insert(
        K8S_MANAGED_BY.into(),
        MANAGED_BY_KLUSTERLET_ADDON_CONTROLLER.into(),
    );
    labels
}

/// Whether a Kubernetes version string predates `apiextensions.k8s.io/v1`.
///
/// Accepts `v1.15.3`, `1.15`, `v1.15.3+k3s1` and similar. An empty or
/// unparsable version is treated as current.
#[must_use]
pub fn uses_legacy_apiextensions(kube_version: &str) -> bool {
    let trimmed = kube_version.trim().trim_start_matches('v');
    let mut parts = trimmed.split('.');
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| {
        let digits: String = p.chars().take_while(char::is_ascii_digit).collect();
        digits.parse::<u32>().ok()
    });
    matches!((major, minor), (Some(1), Some(minor)) if minor < APIEXTENSIONS_V1_MIN_MINOR)
}

fn to_manifest<T: Serialize>(kind: &str, name: &str, obj: &T) -> Result<Value, ManifestError> {
    serde_json::to_value(obj).map_err(|source| ManifestError::Render {
        kind: kind.to_string(),
        name: name.to_string(),
        source,
    })
}

fn work_spec(manifests: Vec<Value>) -> ManifestWorkSpec {
    ManifestWorkSpec {
        workload: ManifestsTemplate { manifests },
    }
}

/// Plural resource name of a component kind
fn plural(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}

/// Payload builder used in production.
#[derive(Clone, Debug)]
pub struct DefaultPayloadBuilder {
    default_registry: String,
    default_version: String,
    default_pull_policy: String,
}

impl DefaultPayloadBuilder {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            default_registry: config.operator_image_registry.clone(),
            default_version: config.addon_version.clone(),
            default_pull_policy: config.image_pull_policy.clone(),
        }
    }

    /// Fully qualified image for an image key, honouring the owner's overrides.
    #[must_use]
    pub fn image(&self, owner: &KlusterletAddonConfig, image_key: &str) -> String {
        let registry = if owner.spec.image_registry.is_empty() {
            self.default_registry.as_str()
        } else {
            owner.spec.image_registry.as_str()
        };
        let version = if owner.spec.version.is_empty() {
            self.default_version.as_str()
        } else {
            owner.spec.version.as_str()
        };
        format!(
            "{}/{}:{version}",
            registry.trim_end_matches('/'),
            image_key.replace('_', "-")
        )
    }

    fn pull_policy<'a>(&'a self, owner: &'a KlusterletAddonConfig) -> &'a str {
        owner
            .spec
            .image_pull_policy
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_pull_policy)
    }

    fn crd_manifest(component: AddonComponent, legacy: bool) -> Value {
        let kind = component.cr_kind();
        let plural = plural(kind);
        let names = json!({
            "kind": kind,
            "listKind": format!("{kind}List"),
            "plural": plural,
            "singular": kind.to_lowercase(),
        });
        let schema = json!({
            "openAPIV3Schema": {
                "type": "object",
                "x-kubernetes-preserve-unknown-fields": true,
            }
        });

        if legacy {
            json!({
                "apiVersion": "apiextensions.k8s.io/v1beta1",
                "kind": "CustomResourceDefinition",
                "metadata": { "name": format!("{plural}.{AGENT_API_GROUP}") },
                "spec": {
                    "group": AGENT_API_GROUP,
                    "names": names,
                    "scope": "Namespaced",
                    "version": "v1",
                    "versions": [{ "name": "v1", "served": true, "storage": true }],
                    "subresources": { "status": {} },
                    "validation": schema,
                }
            })
        } else {
            json!({
                "apiVersion": "apiextensions.k8s.io/v1",
                "kind": "CustomResourceDefinition",
                "metadata": { "name": format!("{plural}.{AGENT_API_GROUP}") },
                "spec": {
                    "group": AGENT_API_GROUP,
                    "names": names,
                    "scope": "Namespaced",
                    "versions": [{
                        "name": "v1",
                        "served": true,
                        "storage": true,
                        "schema": schema,
                        "subresources": { "status": {} },
                    }],
                }
            })
        }
    }

    fn operator_deployment(
        &self,
        owner: &KlusterletAddonConfig,
        pull_secret_name: Option<&str>,
    ) -> Deployment {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), ADDON_OPERATOR_NAME.to_string());

        Deployment {
            metadata: ObjectMeta {
                name: Some(ADDON_OPERATOR_NAME.to_string()),
                namespace: Some(AGENT_ADDON_NAMESPACE.to_string()),
                labels: Some(build_labels(owner, ADDON_OPERATOR_NAME)),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: Some(ADDON_OPERATOR_NAME.to_string()),
                        image_pull_secrets: pull_secret_name.map(|name| {
                            vec![LocalObjectReference {
                                name: name.to_string(),
                            }]
                        }),
                        containers: vec![Container {
                            name: ADDON_OPERATOR_NAME.to_string(),
                            image: Some(self.image(owner, "klusterlet_addon_operator")),
                            image_pull_policy: Some(self.pull_policy(owner).to_string()),
                            env: Some(vec![
                                EnvVar {
                                    name: "WATCH_NAMESPACE".to_string(),
                                    value: Some(AGENT_ADDON_NAMESPACE.to_string()),
                                    ..Default::default()
                                },
                                EnvVar {
                                    name: "OPERATOR_NAME".to_string(),
                                    value: Some(ADDON_OPERATOR_NAME.to_string()),
                                    ..Default::default()
                                },
                            ]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl PayloadBuilder for DefaultPayloadBuilder {
    fn crd_bundle(
        &self,
        _owner: &KlusterletAddonConfig,
        kube_version: &str,
    ) -> Result<ManifestWorkSpec, ManifestError> {
        let legacy = uses_legacy_apiextensions(kube_version);
        debug!(
            kube_version = %kube_version,
            legacy,
            "Rendering add-on CRD bundle"
        );
        let manifests = AddonComponent::ALL
            .iter()
            .map(|c| Self::crd_manifest(*c, legacy))
            .collect();
        Ok(work_spec(manifests))
    }

    fn operator_bundle(
        &self,
        owner: &KlusterletAddonConfig,
        pull_secret: Option<&Secret>,
    ) -> Result<ManifestWorkSpec, ManifestError> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(AGENT_ADDON_NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let service_account = ServiceAccount {
            metadata: ObjectMeta {
                name: Some(ADDON_OPERATOR_NAME.to_string()),
                namespace: Some(AGENT_ADDON_NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let binding = ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(ADDON_OPERATOR_NAME.to_string()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: "cluster-admin".to_string(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: ADDON_OPERATOR_NAME.to_string(),
                namespace: Some(AGENT_ADDON_NAMESPACE.to_string()),
                ..Default::default()
            }]),
        };

        // The secret is re-homed into the agent namespace under its original name.
        let copied_secret = pull_secret.map(|secret| Secret {
            metadata: ObjectMeta {
                name: Some(secret.name_any()),
                namespace: Some(AGENT_ADDON_NAMESPACE.to_string()),
                ..Default::default()
            },
            type_: secret.type_.clone(),
            data: secret.data.clone(),
            ..Default::default()
        });
        let pull_secret_name = copied_secret.as_ref().map(ResourceExt::name_any);

        let deployment = self.operator_deployment(owner, pull_secret_name.as_deref());

        let mut manifests = vec![
            to_manifest("Namespace", AGENT_ADDON_NAMESPACE, &namespace)?,
            to_manifest("ServiceAccount", ADDON_OPERATOR_NAME, &service_account)?,
            to_manifest("ClusterRoleBinding", ADDON_OPERATOR_NAME, &binding)?,
        ];
        if let Some(secret) = &copied_secret {
            manifests.push(to_manifest("Secret", &secret.name_any(), secret)?);
        }
        manifests.push(to_manifest("Deployment", ADDON_OPERATOR_NAME, &deployment)?);
        Ok(work_spec(manifests))
    }

    fn component_cr(
        &self,
        owner: &KlusterletAddonConfig,
        component: AddonComponent,
    ) -> Result<ManifestWorkSpec, ManifestError> {
        let mut image_overrides = BTreeMap::new();
        image_overrides.insert(
            component.image_key().to_string(),
            self.image(owner, component.image_key()),
        );
        image_overrides.insert(
            "klusterlet_addon_lease_controller".to_string(),
            self.image(owner, "klusterlet_addon_lease_controller"),
        );

        let mut spec = json!({
            "fullNameOverride": component.cr_name(),
            "clusterName": owner.spec.cluster_name,
            "clusterNamespace": owner.spec.cluster_namespace,
            "global": {
                "imagePullPolicy": self.pull_policy(owner),
                "imagePullSecret": owner.spec.image_pull_secret,
                "imageOverrides": image_overrides,
            },
        });
        if !owner.spec.cluster_labels.is_empty() {
            spec["clusterLabels"] = json!(owner.spec.cluster_labels);
        }
        if component.requires_hub_kubeconfig() {
            spec["hubKubeconfigSecret"] = json!(component.hub_kubeconfig_secret());
        }

        let cr = json!({
            "apiVersion": AGENT_API_GROUP_VERSION,
            "kind": component.cr_kind(),
            "metadata": {
                "name": component.cr_name(),
                "namespace": AGENT_ADDON_NAMESPACE,
                "labels": build_labels(owner, component.addon_name()),
            },
            "spec": spec,
        });
        Ok(work_spec(vec![cr]))
    }
}

#[cfg(test)]
#[path = "manifests_tests.rs"]
mod manifests_tests;
