//! CustomResourceDefinition registry
//!
//! CRDs form a small closed set per bundle. They are loaded once during
//! startup, indexed by `(group, version, plural)`, and handed out as shared
//! read-only references for the server lifetime; the backing filesystem is
//! immutable so no invalidation is needed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use serde_json::Value;

use crate::bundle::ClusterData;
use crate::catalog;
use crate::decode;

/// One served version of one CRD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdResource {
    pub group: String,
    pub version: String,
    pub plural: String,
    pub kind: String,
    pub namespaced: bool,
}

impl CrdResource {
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    pub fn list_kind(&self) -> String {
        format!("{}List", self.kind)
    }
}

#[derive(Debug, Default)]
pub struct CrdRegistry {
    by_gvr: BTreeMap<(String, String, String), CrdResource>,
}

impl CrdRegistry {
    /// Load every CRD definition in the bundle. Files that fail to decode
    /// are logged and skipped; the registry degrades rather than denies.
    pub fn load(cluster: &ClusterData) -> Self {
        let mut registry = Self::default();
        for path in catalog::crd_definition_files(cluster) {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "could not read CRD file");
                    continue;
                }
            };
            match decode::decode(Some("customresourcedefinitions"), &bytes) {
                Ok(decoded) => {
                    for item in decoded.into_items() {
                        registry.insert_definition(&item);
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "could not decode CRD file");
                }
            }
        }
        tracing::debug!(resources = registry.by_gvr.len(), "CRD registry loaded");
        registry
    }

    /// Index every served version of one CRD definition.
    fn insert_definition(&mut self, crd: &Value) {
        let Some(group) = crd.pointer("/spec/group").and_then(Value::as_str) else {
            return;
        };
        let Some(plural) = crd.pointer("/spec/names/plural").and_then(Value::as_str) else {
            return;
        };
        let kind = crd
            .pointer("/spec/names/kind")
            .and_then(Value::as_str)
            .unwrap_or(plural);
        let namespaced = crd
            .pointer("/spec/scope")
            .and_then(Value::as_str)
            .is_none_or(|scope| scope == "Namespaced");

        let versions: Vec<&str> = match crd.pointer("/spec/versions").and_then(Value::as_array) {
            Some(versions) => versions
                .iter()
                .filter(|v| v.get("served").and_then(Value::as_bool).unwrap_or(true))
                .filter_map(|v| v.get("name").and_then(Value::as_str))
                .collect(),
            // Pre-v1 definitions carried a single spec.version.
            None => crd
                .pointer("/spec/version")
                .and_then(Value::as_str)
                .into_iter()
                .collect(),
        };

        for version in versions {
            let resource = CrdResource {
                group: group.to_string(),
                version: version.to_string(),
                plural: plural.to_string(),
                kind: kind.to_string(),
                namespaced,
            };
            self.by_gvr.insert(
                (group.to_string(), version.to_string(), plural.to_string()),
                resource,
            );
        }
    }

    pub fn get(&self, group: &str, version: &str, resource: &str) -> Option<&CrdResource> {
        self.by_gvr
            .get(&(group.to_string(), version.to_string(), resource.to_string()))
    }

    /// All groups in the registry with their versions, sorted.
    pub fn groups(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for resource in self.by_gvr.values() {
            groups
                .entry(resource.group.clone())
                .or_default()
                .insert(resource.version.clone());
        }
        groups
    }

    /// The resources served under one group/version.
    pub fn resources_in(&self, group: &str, version: &str) -> Vec<&CrdResource> {
        self.by_gvr
            .values()
            .filter(|r| r.group == group && r.version == version)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_gvr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gvr.is_empty()
    }
}
