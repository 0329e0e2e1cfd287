//! Helpers for working with untyped (unstructured) Kubernetes objects
//!
//! The serving pipeline carries objects as `serde_json::Value` so that
//! arbitrary custom resources survive round-trips unchanged. These helpers
//! centralize metadata access, GVK stamping, and the list ordering used by
//! every list response.

use k8s_openapi::chrono::{DateTime, Utc};
use kube::core::GroupVersionKind;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};

/// Format a GVK's `apiVersion` (`v1` for the core group, `group/version`
/// otherwise).
pub fn api_version(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

/// Split an `apiVersion` string back into (group, version).
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Build a GVK from an object's `apiVersion` and `kind` fields.
pub fn gvk_of(obj: &Value) -> Option<GroupVersionKind> {
    let kind = obj.get("kind")?.as_str().filter(|k| !k.is_empty())?;
    let api_version = obj.get("apiVersion").and_then(Value::as_str).unwrap_or("");
    let (group, version) = split_api_version(api_version);
    Some(GroupVersionKind::gvk(group, version, kind))
}

pub fn name(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/name").and_then(Value::as_str)
}

pub fn namespace(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/namespace").and_then(Value::as_str)
}

pub fn labels(obj: &Value) -> Option<&Map<String, Value>> {
    obj.pointer("/metadata/labels").and_then(Value::as_object)
}

/// Look up a dotted field path (`status.phase`) in an object.
pub fn field(obj: &Value, path: &str) -> Option<Value> {
    let mut current = obj;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}

pub fn creation_timestamp(obj: &Value) -> Option<DateTime<Utc>> {
    let raw = obj
        .pointer("/metadata/creationTimestamp")
        .and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Sort list items by creation timestamp ascending. The sort is stable;
/// items without a timestamp order as the zero time, and ties break by
/// `(namespace, name)` so responses do not depend on directory enumeration
/// order.
pub fn sort_by_creation_timestamp(items: &mut [Value]) {
    items.sort_by_cached_key(|item| {
        (
            creation_timestamp(item),
            namespace(item).unwrap_or_default().to_string(),
            name(item).unwrap_or_default().to_string(),
        )
    });
}

/// Stamp `kind`/`apiVersion` on a list item where the captured file omitted
/// them. Existing non-empty values are left alone, which makes stamping
/// idempotent.
pub fn stamp_gvk(item: &mut Value, kind: &str, api_version: &str) {
    let Some(map) = item.as_object_mut() else {
        return;
    };
    let missing = |v: Option<&Value>| v.and_then(Value::as_str).is_none_or(str::is_empty);
    if missing(map.get("kind")) {
        map.insert("kind".to_string(), Value::String(kind.to_string()));
    }
    if missing(map.get("apiVersion")) {
        map.insert("apiVersion".to_string(), Value::String(api_version.to_string()));
    }
}

/// Build the standard list envelope around a set of items.
pub fn list_envelope(list_kind: &str, api_version: &str, items: Vec<Value>) -> Value {
    json!({
        "kind": list_kind,
        "apiVersion": api_version,
        "metadata": { "resourceVersion": "1" },
        "items": items,
    })
}

/// Convert a typed `k8s-openapi` object into its unstructured form.
pub fn to_unstructured<T: Serialize>(obj: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(obj)
}

/// Convert an unstructured value back into a typed object.
pub fn from_unstructured<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(ns: &str, name: &str, ts: Option<&str>) -> Value {
        let mut obj = json!({
            "metadata": { "name": name, "namespace": ns }
        });
        if let Some(ts) = ts {
            obj["metadata"]["creationTimestamp"] = json!(ts);
        }
        obj
    }

    #[test]
    fn sort_orders_by_timestamp_then_namespace_and_name() {
        let mut items = vec![
            pod("b", "late", Some("2023-05-01T10:00:00Z")),
            pod("a", "early", Some("2023-01-01T10:00:00Z")),
            pod("a", "untimed", None),
            pod("a", "tied", Some("2023-05-01T10:00:00Z")),
        ];
        sort_by_creation_timestamp(&mut items);
        let names: Vec<_> = items.iter().map(|i| name(i).unwrap()).collect();
        assert_eq!(names, ["untimed", "early", "tied", "late"]);
    }

    #[test]
    fn stamp_fills_missing_fields_only() {
        let mut item = json!({ "metadata": { "name": "web" } });
        stamp_gvk(&mut item, "Pod", "v1");
        assert_eq!(item["kind"], "Pod");
        assert_eq!(item["apiVersion"], "v1");

        let mut custom = json!({ "kind": "Widget", "apiVersion": "example.com/v1" });
        stamp_gvk(&mut custom, "Pod", "v1");
        assert_eq!(custom["kind"], "Widget");
        assert_eq!(custom["apiVersion"], "example.com/v1");
    }

    #[test]
    fn stamp_is_idempotent() {
        let mut item = json!({ "metadata": { "name": "web" } });
        stamp_gvk(&mut item, "Pod", "v1");
        let once = item.clone();
        stamp_gvk(&mut item, "Pod", "v1");
        assert_eq!(item, once);
    }

    #[test]
    fn api_version_formats_core_and_grouped() {
        assert_eq!(api_version(&GroupVersionKind::gvk("", "v1", "Pod")), "v1");
        assert_eq!(
            api_version(&GroupVersionKind::gvk("apps", "v1", "Deployment")),
            "apps/v1"
        );
        assert_eq!(split_api_version("batch/v1"), ("batch", "v1"));
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }

    #[test]
    fn field_lookup_follows_dotted_paths() {
        let obj = json!({ "status": { "phase": "Running" } });
        assert_eq!(field(&obj, "status.phase"), Some(json!("Running")));
        assert_eq!(field(&obj, "status.missing"), None);
    }

    #[test]
    fn unstructured_round_trip_is_identity() {
        use k8s_openapi::api::core::v1::Namespace;
        let ns = Namespace {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("prod".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let value = to_unstructured(&ns).unwrap();
        let back: Namespace = from_unstructured(value).unwrap();
        assert_eq!(back, ns);
    }
}
