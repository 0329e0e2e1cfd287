// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Property-based and round-trip tests for the object pipeline
//!
//! These verify with random inputs that:
//! 1. GVK stamping is idempotent and never clobbers an existing GVK
//! 2. List ordering does not depend on input (directory) order
//! 3. Selector filtering equals a plain filter over the same predicate
//! 4. Bare-array decoding preserves every element
//!
//! and, table-driven across every built-in kind, the round-trip laws:
//! decoding an encoded object is the identity, and converting a typed
//! object to its unstructured form and back is the identity.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::batch::v1::{Job, JobSpec, JobStatus};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, Pod, PodSpec, PodStatus, PodTemplateSpec, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector as MetaLabelSelector, ObjectMeta,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

use sbserver::objects;
use sbserver::selector::LabelSelector;

// =============================================================================
// Strategy generators
// =============================================================================

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}"
}

fn timestamp_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (0i64..2_000_000_000).prop_map(|secs| {
            Some(Utc.timestamp_opt(secs, 0).unwrap().to_rfc3339())
        }),
    ]
}

fn label_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("web".to_string()), Just("api".to_string()), Just("db".to_string())]
}

fn item_strategy() -> impl Strategy<Value = Value> {
    (
        name_strategy(),
        name_strategy(),
        timestamp_strategy(),
        proptest::option::of(label_value_strategy()),
    )
        .prop_map(|(name, namespace, timestamp, app)| {
            let mut metadata = json!({ "name": name, "namespace": namespace });
            if let Some(ts) = timestamp {
                metadata["creationTimestamp"] = json!(ts);
            }
            if let Some(app) = app {
                metadata["labels"] = json!({ "app": app });
            }
            json!({ "metadata": metadata })
        })
}

fn items_strategy() -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec(item_strategy(), 0..12)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn stamping_is_idempotent(mut item in item_strategy()) {
        objects::stamp_gvk(&mut item, "Pod", "v1");
        let once = item.clone();
        objects::stamp_gvk(&mut item, "Pod", "v1");
        prop_assert_eq!(&item, &once);
        prop_assert_eq!(item["kind"].as_str(), Some("Pod"));
        prop_assert_eq!(item["apiVersion"].as_str(), Some("v1"));
    }

    #[test]
    fn stamping_never_clobbers_an_existing_gvk(mut item in item_strategy()) {
        item["kind"] = json!("Widget");
        item["apiVersion"] = json!("example.com/v1");
        objects::stamp_gvk(&mut item, "Pod", "v1");
        prop_assert_eq!(item["kind"].as_str(), Some("Widget"));
        prop_assert_eq!(item["apiVersion"].as_str(), Some("example.com/v1"));
    }

    #[test]
    fn list_order_is_independent_of_input_order(items in items_strategy()) {
        // Distinct names per namespace, as in any real capture; without
        // that the ordering could not be total.
        let items: Vec<Value> = items
            .into_iter()
            .enumerate()
            .map(|(i, mut item)| {
                let name = item["metadata"]["name"].as_str().unwrap_or("x").to_string();
                item["metadata"]["name"] = json!(format!("{name}-{i}"));
                item
            })
            .collect();

        let mut sorted_once = items.clone();
        objects::sort_by_creation_timestamp(&mut sorted_once);

        let mut reversed: Vec<Value> = items.iter().rev().cloned().collect();
        objects::sort_by_creation_timestamp(&mut reversed);

        // Responses must be byte-identical regardless of enumeration order.
        let body_a = serde_json::to_vec(&objects::list_envelope("PodList", "v1", sorted_once)).unwrap();
        let body_b = serde_json::to_vec(&objects::list_envelope("PodList", "v1", reversed)).unwrap();
        prop_assert_eq!(body_a, body_b);
    }

    #[test]
    fn sorting_is_monotone_in_creation_timestamp(items in items_strategy()) {
        let mut items = items;
        objects::sort_by_creation_timestamp(&mut items);
        let timestamps: Vec<_> = items.iter().map(objects::creation_timestamp).collect();
        for pair in timestamps.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn selector_filtering_equals_plain_filter(items in items_strategy()) {
        let selector = LabelSelector::parse("app=web").unwrap();
        let filtered: Vec<&Value> = items.iter().filter(|i| selector.matches(i)).collect();
        for item in &filtered {
            prop_assert_eq!(
                item.pointer("/metadata/labels/app").and_then(Value::as_str),
                Some("web")
            );
        }
        let kept = items.iter().filter(|i| {
            i.pointer("/metadata/labels/app").and_then(Value::as_str) == Some("web")
        });
        prop_assert_eq!(filtered.len(), kept.count());
    }

    #[test]
    fn bare_arrays_decode_to_lists_of_the_same_length(items in proptest::collection::vec(item_strategy(), 1..8)) {
        let bytes = serde_json::to_vec(&items).unwrap();
        let decoded = sbserver::decode::decode(Some("pods"), &bytes).unwrap();
        prop_assert_eq!(decoded.gvk.kind.as_str(), "PodList");
        prop_assert_eq!(decoded.into_items().len(), items.len());
    }
}

// =============================================================================
// Round-trip laws
// =============================================================================

/// One representative object per built-in kind, fully stamped and carrying
/// the required fields of its typed counterpart, so the strict typed decode
/// path is the one exercised.
fn builtin_fixtures() -> Vec<(&'static str, Value)> {
    vec![
        (
            "pods",
            json!({
                "apiVersion": "v1", "kind": "Pod",
                "metadata": {
                    "name": "web-0", "namespace": "prod",
                    "creationTimestamp": "2023-01-01T00:00:00Z",
                    "labels": {"app": "web"}
                },
                "spec": {"containers": [{"name": "app", "image": "web:1"}]},
                "status": {
                    "phase": "Running",
                    "containerStatuses": [{
                        "name": "app", "ready": true, "restartCount": 2,
                        "image": "web:1", "imageID": "docker://abc"
                    }]
                }
            }),
        ),
        (
            "events",
            json!({
                "apiVersion": "v1", "kind": "Event",
                "metadata": {"name": "web-0.1", "namespace": "prod"},
                "involvedObject": {"kind": "Pod", "name": "web-0", "namespace": "prod"},
                "reason": "Started", "message": "Started container", "type": "Normal",
                "count": 3
            }),
        ),
        (
            "limitranges",
            json!({
                "apiVersion": "v1", "kind": "LimitRange",
                "metadata": {"name": "limits", "namespace": "prod"},
                "spec": {"limits": [{"type": "Container", "max": {"cpu": "2"}, "default": {"cpu": "500m"}}]}
            }),
        ),
        (
            "services",
            json!({
                "apiVersion": "v1", "kind": "Service",
                "metadata": {"name": "web", "namespace": "prod"},
                "spec": {
                    "type": "ClusterIP", "clusterIP": "10.0.0.1",
                    "ports": [{"port": 80, "protocol": "TCP", "targetPort": 8080}]
                }
            }),
        ),
        (
            "configmaps",
            json!({
                "apiVersion": "v1", "kind": "ConfigMap",
                "metadata": {"name": "cfg", "namespace": "prod"},
                "data": {"key": "value"},
                "immutable": true
            }),
        ),
        (
            "persistentvolumeclaims",
            json!({
                "apiVersion": "v1", "kind": "PersistentVolumeClaim",
                "metadata": {"name": "data-0", "namespace": "prod"},
                "spec": {
                    "accessModes": ["ReadWriteOnce"],
                    "resources": {"requests": {"storage": "10Gi"}}
                },
                "status": {"phase": "Bound"}
            }),
        ),
        (
            "namespaces",
            json!({
                "apiVersion": "v1", "kind": "Namespace",
                "metadata": {"name": "prod"},
                "status": {"phase": "Active"}
            }),
        ),
        (
            "nodes",
            json!({
                "apiVersion": "v1", "kind": "Node",
                "metadata": {"name": "node-1"},
                "status": {
                    "conditions": [{"type": "Ready", "status": "True"}],
                    "capacity": {"cpu": "4"}
                }
            }),
        ),
        (
            "persistentvolumes",
            json!({
                "apiVersion": "v1", "kind": "PersistentVolume",
                "metadata": {"name": "pv-1"},
                "spec": {
                    "capacity": {"storage": "10Gi"},
                    "accessModes": ["ReadWriteOnce"],
                    "persistentVolumeReclaimPolicy": "Retain"
                },
                "status": {"phase": "Bound"}
            }),
        ),
        (
            "deployments",
            json!({
                "apiVersion": "apps/v1", "kind": "Deployment",
                "metadata": {"name": "web", "namespace": "prod"},
                "spec": {
                    "replicas": 2,
                    "selector": {"matchLabels": {"app": "web"}},
                    "template": {"metadata": {"labels": {"app": "web"}}}
                },
                "status": {"readyReplicas": 2}
            }),
        ),
        (
            "replicasets",
            json!({
                "apiVersion": "apps/v1", "kind": "ReplicaSet",
                "metadata": {"name": "web-abc12", "namespace": "prod"},
                "spec": {"replicas": 2, "selector": {"matchLabels": {"app": "web"}}}
            }),
        ),
        (
            "statefulsets",
            json!({
                "apiVersion": "apps/v1", "kind": "StatefulSet",
                "metadata": {"name": "db", "namespace": "prod"},
                "spec": {
                    "replicas": 3, "serviceName": "db",
                    "selector": {"matchLabels": {"app": "db"}},
                    "template": {"metadata": {"labels": {"app": "db"}}}
                }
            }),
        ),
        (
            "jobs",
            json!({
                "apiVersion": "batch/v1", "kind": "Job",
                "metadata": {"name": "migrate", "namespace": "prod"},
                "spec": {"parallelism": 1, "template": {"metadata": {"labels": {"job": "migrate"}}}},
                "status": {"succeeded": 1}
            }),
        ),
        (
            "cronjobs",
            json!({
                "apiVersion": "batch/v1", "kind": "CronJob",
                "metadata": {"name": "backup", "namespace": "prod"},
                "spec": {"schedule": "0 3 * * *", "jobTemplate": {"spec": {"template": {}}}}
            }),
        ),
        (
            "ingresses",
            json!({
                "apiVersion": "networking.k8s.io/v1", "kind": "Ingress",
                "metadata": {"name": "web", "namespace": "prod"},
                "spec": {"rules": [{"host": "example.com"}]}
            }),
        ),
        (
            "storageclasses",
            json!({
                "apiVersion": "storage.k8s.io/v1", "kind": "StorageClass",
                "metadata": {"name": "fast"},
                "provisioner": "kubernetes.io/no-provisioner",
                "reclaimPolicy": "Delete",
                "allowVolumeExpansion": true
            }),
        ),
        (
            "customresourcedefinitions",
            json!({
                "apiVersion": "apiextensions.k8s.io/v1", "kind": "CustomResourceDefinition",
                "metadata": {"name": "widgets.example.com"},
                "spec": {
                    "group": "example.com", "scope": "Namespaced",
                    "names": {"plural": "widgets", "kind": "Widget"},
                    "versions": [{"name": "v1", "served": true, "storage": true}]
                }
            }),
        ),
    ]
}

#[test]
fn decode_of_encode_is_identity_for_builtin_objects() {
    for (resource, obj) in builtin_fixtures() {
        let bytes = serde_json::to_vec(&obj).unwrap();
        let decoded = sbserver::decode::decode(Some(resource), &bytes).unwrap();
        assert_eq!(decoded.value, obj, "{resource}");
        assert_eq!(decoded.gvk.kind.as_str(), obj["kind"].as_str().unwrap(), "{resource}");
    }
}

#[test]
fn decode_of_encode_is_identity_for_builtin_lists() {
    for (resource, obj) in builtin_fixtures() {
        let kind = obj["kind"].as_str().unwrap();
        let api_version = obj["apiVersion"].as_str().unwrap();
        let envelope =
            objects::list_envelope(&format!("{kind}List"), api_version, vec![obj.clone()]);

        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded = sbserver::decode::decode(Some(resource), &bytes).unwrap();
        assert_eq!(decoded.value, envelope, "{resource}");
        assert_eq!(decoded.gvk.kind.as_str(), format!("{kind}List"), "{resource}");
    }
}

fn unstructured_round_trip<T>(obj: T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let value = objects::to_unstructured(&obj).unwrap();
    let back: T = objects::from_unstructured(value).unwrap();
    assert_eq!(back, obj);
}

/// The typed conversion law across kinds with string, number, bool, map,
/// and list fields, not just bare metadata.
#[test]
fn typed_unstructured_round_trip_across_kinds() {
    unstructured_round_trip(Pod {
        metadata: ObjectMeta {
            name: Some("web-0".to_string()),
            namespace: Some("prod".to_string()),
            labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                image: Some("web:1".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        }),
    });

    unstructured_round_trip(Deployment {
        metadata: ObjectMeta {
            name: Some("web".to_string()),
            namespace: Some("prod".to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(2),
            selector: MetaLabelSelector {
                match_labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
                ..Default::default()
            },
            template: PodTemplateSpec::default(),
            ..Default::default()
        }),
        status: None,
    });

    unstructured_round_trip(Service {
        metadata: ObjectMeta {
            name: Some("web".to_string()),
            namespace: Some("prod".to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            cluster_ip: Some("10.0.0.1".to_string()),
            ports: Some(vec![ServicePort {
                port: 80,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(8080)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    });

    unstructured_round_trip(ConfigMap {
        metadata: ObjectMeta {
            name: Some("cfg".to_string()),
            namespace: Some("prod".to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([("key".to_string(), "value".to_string())])),
        immutable: Some(true),
        ..Default::default()
    });

    unstructured_round_trip(Job {
        metadata: ObjectMeta {
            name: Some("migrate".to_string()),
            namespace: Some("prod".to_string()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            parallelism: Some(1),
            template: PodTemplateSpec::default(),
            ..Default::default()
        }),
        status: Some(JobStatus {
            succeeded: Some(1),
            ..Default::default()
        }),
    });

    unstructured_round_trip(StorageClass {
        metadata: ObjectMeta {
            name: Some("fast".to_string()),
            ..Default::default()
        },
        provisioner: "kubernetes.io/no-provisioner".to_string(),
        reclaim_policy: Some("Delete".to_string()),
        allow_volume_expansion: Some(true),
        ..Default::default()
    });
}
