#[cfg(test)]
mod tests {
    use crate::crd::*;
    use kube::Resource;
    use serde_json::json;

    #[test]
    fn test_klusterlet_addon_config_deserializes_camel_case() {
        let value = json!({
            "apiVersion": "agent.open-cluster-management.io/v1",
            "kind": "KlusterletAddonConfig",
            "metadata": { "name": "cluster1", "namespace": "cluster1" },
            "spec": {
                "clusterName": "cluster1",
                "clusterNamespace": "cluster1",
                "imagePullSecret": "pull-secret",
                "policyController": { "enabled": true },
                "searchCollector": { "enabled": false }
            }
        });

        let config: KlusterletAddonConfig = serde_json::from_value(value).unwrap();
        assert_eq!(config.spec.cluster_name, "cluster1");
        assert_eq!(config.spec.image_pull_secret, "pull-secret");
        assert!(config.spec.image_registry.is_empty());
        assert!(config.spec.policy_controller.enabled);
        assert!(!config.spec.search_collector.enabled);
        assert!(!config.spec.application_manager.enabled);
    }

    #[test]
    fn test_klusterlet_addon_config_empty_fields_not_serialized() {
        let spec = KlusterletAddonConfigSpec {
            cluster_name: "c".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert!(value.get("imagePullSecret").is_none());
        assert!(value.get("imageRegistry").is_none());
        assert!(value.get("imagePullPolicy").is_none());
        assert_eq!(value["applicationManager"]["enabled"], json!(false));
    }

    #[test]
    fn test_resource_identity() {
        assert_eq!(KlusterletAddonConfig::kind(&()), "KlusterletAddonConfig");
        assert_eq!(
            KlusterletAddonConfig::api_version(&()),
            "agent.open-cluster-management.io/v1"
        );
        assert_eq!(ManagedCluster::group(&()), "cluster.open-cluster-management.io");
        assert_eq!(ManifestWork::api_version(&()), "work.open-cluster-management.io/v1");
        assert_eq!(
            ManagedClusterAddOn::api_version(&()),
            "addon.open-cluster-management.io/v1alpha1"
        );
    }

    #[test]
    fn test_managed_cluster_kubernetes_version() {
        let value = json!({
            "apiVersion": "cluster.open-cluster-management.io/v1",
            "kind": "ManagedCluster",
            "metadata": { "name": "cluster1" },
            "spec": { "hubAcceptsClient": true },
            "status": {
                "conditions": [
                    { "type": "ManagedClusterConditionAvailable", "status": "True",
                      "lastTransitionTime": "2025-01-01T00:00:00Z" }
                ],
                "version": { "kubernetes": "v1.21.3" }
            }
        });

        let cluster: ManagedCluster = serde_json::from_value(value).unwrap();
        assert_eq!(cluster.kubernetes_version(), "v1.21.3");
        let status = cluster.status.unwrap();
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(
            status.conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_managed_cluster_without_status_has_empty_version() {
        let cluster = ManagedCluster::new("cluster1", ManagedClusterSpec::default());
        assert_eq!(cluster.kubernetes_version(), "");
    }

    #[test]
    fn test_manifest_work_spec_equality_tracks_payload() {
        let a = ManifestWorkSpec {
            workload: ManifestsTemplate {
                manifests: vec![json!({ "kind": "Namespace", "metadata": { "name": "x" } })],
            },
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.workload.manifests.push(json!({ "kind": "ServiceAccount" }));
        assert_ne!(a, b);
    }

    #[test]
    fn test_condition_defaults_optional_fields() {
        let condition: Condition =
            serde_json::from_value(json!({ "type": "Available", "status": "True" })).unwrap();
        assert_eq!(condition.r#type, "Available");
        assert!(condition.reason.is_none());
        assert!(condition.message.is_none());
    }
}
