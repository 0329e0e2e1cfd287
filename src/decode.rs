//! Decoding of captured resource files
//!
//! Bundle files are irregular: JSON or YAML, single objects or lists, with
//! or without their `kind`/`apiVersion` envelope, captured at varying
//! apiserver versions. `decode` turns any of those shapes into a uniform
//! unstructured value tagged with its GroupVersionKind.
//!
//! The fallback cascade runs a fixed list of strategies sharing one
//! contract; rejection reasons from every failed strategy are accumulated
//! so a completely undecodable file can be logged with the full story.

use kube::core::GroupVersionKind;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::catalog::{self, ResourceDescriptor};
use crate::objects;

/// A decoded payload: either a single object or a list envelope, plus the
/// GVK it carries.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub value: Value,
    pub gvk: GroupVersionKind,
}

impl Decoded {
    pub fn is_list(&self) -> bool {
        self.value.get("items").is_some_and(Value::is_array)
    }

    /// The payload's items: the list items for a list, the object itself
    /// otherwise.
    pub fn into_items(self) -> Vec<Value> {
        match self.value {
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    map.insert("items".to_string(), other);
                    vec![Value::Object(map)]
                }
                None => vec![Value::Object(map)],
            },
            other => vec![other],
        }
    }
}

/// Why a file could not be decoded. Carries the rejection reason from every
/// strategy in the cascade.
#[derive(Debug, thiserror::Error)]
#[error("no decode strategy accepted the payload: {}", rejections.join("; "))]
pub struct DecodeError {
    pub rejections: Vec<String>,
}

type Strategy = fn(&[u8], Option<&str>) -> Result<Decoded, String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("typed", decode_typed),
    ("list-wrapped", decode_list_wrapped),
    ("unstructured object", decode_untyped_object),
    ("unstructured array", decode_untyped_array),
];

/// Decode a captured file into an unstructured payload.
///
/// `resource_hint` is the canonical resource name the file was resolved
/// under (e.g. `pods`); it drives the list-wrapping fallback for payloads
/// captured as bare arrays.
pub fn decode(resource_hint: Option<&str>, bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let mut rejections = Vec::with_capacity(STRATEGIES.len());
    for (strategy, run) in STRATEGIES {
        match run(bytes, resource_hint) {
            Ok(decoded) => {
                tracing::trace!(strategy, kind = %decoded.gvk.kind, "decoded payload");
                return Ok(decoded);
            }
            Err(reason) => rejections.push(format!("{strategy}: {reason}")),
        }
    }
    Err(DecodeError { rejections })
}

/// Parse raw bytes as JSON, falling back to YAML.
fn parse_value(bytes: &[u8]) -> Result<Value, String> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_slice(bytes)
            .map_err(|yaml_err| format!("not JSON ({json_err}) nor YAML ({yaml_err})")),
    }
}

/// Strict typed decoding: the payload must carry an envelope recognized by
/// the built-in registry, and built-in kinds must deserialize into their
/// `k8s-openapi` type. List items are stamped with the singular GVK the
/// envelope implies.
fn decode_typed(bytes: &[u8], _hint: Option<&str>) -> Result<Decoded, String> {
    let value = parse_value(bytes)?;
    decode_typed_value(value)
}

fn decode_typed_value(mut value: Value) -> Result<Decoded, String> {
    let gvk = objects::gvk_of(&value).ok_or("missing kind or apiVersion")?;
    let api_version = objects::api_version(&gvk);

    let Some(desc) = catalog::by_kind(&gvk.kind, &api_version) else {
        return Err(format!(
            "{api_version}/{kind} is not a registered built-in kind",
            kind = gvk.kind
        ));
    };
    validate_builtin(desc, gvk.kind.ends_with("List"), &value)?;

    if let Some(Value::Array(items)) = value.get_mut("items") {
        for item in items {
            objects::stamp_gvk(item, desc.kind, &api_version);
        }
    }
    Ok(Decoded { value, gvk })
}

/// Wrap a bare payload in a synthesized list envelope for a known resource
/// and retry strict decoding.
fn decode_list_wrapped(bytes: &[u8], hint: Option<&str>) -> Result<Decoded, String> {
    let resource = hint.ok_or("no resource hint available")?;
    let desc =
        catalog::by_name(resource).ok_or_else(|| format!("don't know how to wrap {resource}"))?;
    let payload = parse_value(bytes)?;
    let wrapped = json!({
        "kind": desc.list_kind(),
        "apiVersion": desc.api_version(),
        "metadata": { "resourceVersion": "1" },
        "items": payload,
    });
    decode_typed_value(wrapped)
}

/// Any object with a non-empty kind is served as-is.
fn decode_untyped_object(bytes: &[u8], _hint: Option<&str>) -> Result<Decoded, String> {
    let value = parse_value(bytes)?;
    if !value.is_object() {
        return Err("payload is not an object".to_string());
    }
    let gvk = objects::gvk_of(&value).ok_or("object has no kind")?;
    Ok(Decoded { value, gvk })
}

/// A bare array becomes an untyped list envelope carrying the first
/// element's GVK.
fn decode_untyped_array(bytes: &[u8], _hint: Option<&str>) -> Result<Decoded, String> {
    let value = parse_value(bytes)?;
    let Value::Array(items) = value else {
        return Err("payload is not an array".to_string());
    };
    if items.is_empty() {
        return Err("array is empty".to_string());
    }
    let item_gvk = objects::gvk_of(&items[0]).unwrap_or_else(|| GroupVersionKind::gvk("", "", ""));
    let list_kind = format!("{}List", item_gvk.kind);
    let gvk = GroupVersionKind::gvk(&item_gvk.group, &item_gvk.version, &list_kind);
    let value = objects::list_envelope(&list_kind, &objects::api_version(&item_gvk), items);
    Ok(Decoded { value, gvk })
}

/// Validate a payload against the `k8s-openapi` type the registry maps its
/// kind to. One table drives both the singular and the list shape.
fn validate_builtin(desc: &ResourceDescriptor, list: bool, value: &Value) -> Result<(), String> {
    use k8s_openapi::api::{apps, batch, core, networking, storage};
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1 as apiext;

    macro_rules! check {
        ($ty:ty) => {
            if list {
                <k8s_openapi::List<$ty>>::deserialize(value)
                    .map(drop)
                    .map_err(|e| e.to_string())
            } else {
                <$ty>::deserialize(value).map(drop).map_err(|e| e.to_string())
            }
        };
    }

    match desc.kind {
        "Pod" => check!(core::v1::Pod),
        "Event" => check!(core::v1::Event),
        "LimitRange" => check!(core::v1::LimitRange),
        "Service" => check!(core::v1::Service),
        "ConfigMap" => check!(core::v1::ConfigMap),
        "Namespace" => check!(core::v1::Namespace),
        "Node" => check!(core::v1::Node),
        "PersistentVolume" => check!(core::v1::PersistentVolume),
        "PersistentVolumeClaim" => check!(core::v1::PersistentVolumeClaim),
        "Job" => check!(batch::v1::Job),
        "CronJob" => check!(batch::v1::CronJob),
        "Deployment" => check!(apps::v1::Deployment),
        "ReplicaSet" => check!(apps::v1::ReplicaSet),
        "StatefulSet" => check!(apps::v1::StatefulSet),
        "Ingress" => check!(networking::v1::Ingress),
        "StorageClass" => check!(storage::v1::StorageClass),
        "CustomResourceDefinition" => check!(apiext::CustomResourceDefinition),
        other => Err(format!("no typed validation for kind {other}")),
    }
}
