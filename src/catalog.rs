//! The path catalog: which resources exist and where their captured state
//! lives inside the bundle
//!
//! The on-disk layout is irregular across resource categories; every one of
//! those irregularities is encoded here so the rest of the server can ask
//! "which files back this resource?" and nothing else:
//!
//! - cluster-scoped built-ins: `cluster-resources/<plural>.json`
//! - namespaced built-ins: `cluster-resources/<plural>/<namespace>.json`
//! - CRDs: `cluster-resources/custom-resource-definitions/...`
//! - custom resource instances: `cluster-resources/custom-resources/<group>/<namespace|cluster>.json`
//! - pod logs: `cluster-resources/pods/logs/<ns>/<pod>/<container>.log`
//!   (older captures: `<bundle>/logs/...`)

use std::fs;
use std::path::{Path, PathBuf};

use crate::bundle::ClusterData;
use crate::crds::CrdResource;

/// File extensions captured files may use, in resolution order.
const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Directory of CRD definitions, relative to cluster-resources.
const CRD_DIR: &str = "custom-resource-definitions";

/// Directory of custom resource instances, relative to cluster-resources.
const CR_DIR: &str = "custom-resources";

/// One entry of the static resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Canonical resource name (plural, lowercase).
    pub name: &'static str,
    pub kind: &'static str,
    pub group: &'static str,
    pub version: &'static str,
    pub namespaced: bool,
}

impl ResourceDescriptor {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn list_kind(&self) -> String {
        format!("{}List", self.kind)
    }
}

macro_rules! resource {
    ($name:literal, $kind:literal, $group:literal, $version:literal, $namespaced:expr) => {
        ResourceDescriptor {
            name: $name,
            kind: $kind,
            group: $group,
            version: $version,
            namespaced: $namespaced,
        }
    };
}

/// Built-in resources the bundle format captures.
pub const BUILTIN: &[ResourceDescriptor] = &[
    resource!("pods", "Pod", "", "v1", true),
    resource!("events", "Event", "", "v1", true),
    resource!("limitranges", "LimitRange", "", "v1", true),
    resource!("services", "Service", "", "v1", true),
    resource!("configmaps", "ConfigMap", "", "v1", true),
    resource!("persistentvolumeclaims", "PersistentVolumeClaim", "", "v1", true),
    resource!("namespaces", "Namespace", "", "v1", false),
    resource!("nodes", "Node", "", "v1", false),
    resource!("persistentvolumes", "PersistentVolume", "", "v1", false),
    resource!("deployments", "Deployment", "apps", "v1", true),
    resource!("replicasets", "ReplicaSet", "apps", "v1", true),
    resource!("statefulsets", "StatefulSet", "apps", "v1", true),
    resource!("jobs", "Job", "batch", "v1", true),
    resource!("cronjobs", "CronJob", "batch", "v1", true),
    resource!("ingresses", "Ingress", "networking.k8s.io", "v1", true),
    resource!("storageclasses", "StorageClass", "storage.k8s.io", "v1", false),
    resource!(
        "customresourcedefinitions",
        "CustomResourceDefinition",
        "apiextensions.k8s.io",
        "v1",
        false
    ),
];

/// Alternate spellings seen in captured bundles.
fn canonical_name(resource: &str) -> &str {
    match resource {
        "pvcs" => "persistentvolumeclaims",
        "ingress" => "ingresses",
        other => other,
    }
}

/// Look up a built-in by canonical resource name (aliases accepted).
pub fn by_name(resource: &str) -> Option<&'static ResourceDescriptor> {
    let resource = canonical_name(resource);
    BUILTIN.iter().find(|desc| desc.name == resource)
}

/// Look up a built-in by the (group, version, resource) of a request path.
pub fn by_group_version_resource(
    group: &str,
    version: &str,
    resource: &str,
) -> Option<&'static ResourceDescriptor> {
    let resource = canonical_name(resource);
    BUILTIN
        .iter()
        .find(|desc| desc.name == resource && desc.group == group && desc.version == version)
}

/// Look up a built-in by a decoded envelope's kind (singular or `<X>List`)
/// and apiVersion.
pub fn by_kind(kind: &str, api_version: &str) -> Option<&'static ResourceDescriptor> {
    BUILTIN.iter().find(|desc| {
        desc.api_version() == api_version
            && (desc.kind == kind || kind == format!("{}List", desc.kind))
    })
}

pub(crate) fn first_existing(dir: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

/// The files backing a built-in resource list. For a namespaced resource
/// without a namespace in the request, one file per known namespace;
/// missing files are skipped and contribute zero items.
pub fn builtin_files(
    cluster: &ClusterData,
    desc: &ResourceDescriptor,
    namespace: Option<&str>,
) -> Vec<PathBuf> {
    let root = cluster.cluster_resources_dir();
    if !desc.namespaced {
        return first_existing(root, desc.name).into_iter().collect();
    }
    let dir = root.join(desc.name);
    match namespace {
        Some(ns) => first_existing(&dir, ns).into_iter().collect(),
        None => cluster
            .namespaces()
            .iter()
            .filter_map(|ns| first_existing(&dir, ns))
            .collect(),
    }
}

/// The files backing a custom resource list.
pub fn custom_resource_files(
    cluster: &ClusterData,
    crd: &CrdResource,
    namespace: Option<&str>,
) -> Vec<PathBuf> {
    let dir = cluster.cluster_resources_dir().join(CR_DIR).join(&crd.group);
    if !crd.namespaced {
        return first_existing(&dir, "cluster").into_iter().collect();
    }
    match namespace {
        Some(ns) => first_existing(&dir, ns).into_iter().collect(),
        None => {
            let mut files = files_under(&dir);
            files.retain(|path| path.file_stem().is_none_or(|stem| stem != "cluster"));
            files
        }
    }
}

/// Every CRD definition file in the bundle. Captures store either a single
/// `custom-resource-definitions.json` list or one file per CRD under a
/// directory of the same name.
pub fn crd_definition_files(cluster: &ClusterData) -> Vec<PathBuf> {
    let root = cluster.cluster_resources_dir();
    let mut files: Vec<PathBuf> = first_existing(root, CRD_DIR).into_iter().collect();
    files.extend(files_under(&root.join(CRD_DIR)));
    files
}

/// A captured OpenAPI schema document (`openapi-v2` or `openapi-v3`), if
/// this bundle recorded one under cluster-resources or at the bundle root.
pub fn openapi_file(cluster: &ClusterData, stem: &str) -> Option<PathBuf> {
    first_existing(cluster.cluster_resources_dir(), stem)
        .or_else(|| first_existing(cluster.bundle_root(), stem))
}

/// The log file for one container of one pod.
pub fn pod_log_file(
    cluster: &ClusterData,
    namespace: &str,
    pod: &str,
    container: &str,
    previous: bool,
) -> Option<PathBuf> {
    let suffix = if previous { "-previous.log" } else { ".log" };
    let path = pod_log_dir(cluster, namespace, pod)?.join(format!("{container}{suffix}"));
    path.is_file().then_some(path)
}

/// The directory holding a pod's per-container log files, wherever this
/// bundle put it.
pub fn pod_log_dir(cluster: &ClusterData, namespace: &str, pod: &str) -> Option<PathBuf> {
    let roots = [
        cluster.cluster_resources_dir().join("pods").join("logs"),
        cluster.bundle_root().join("logs"),
    ];
    roots
        .iter()
        .map(|root| root.join(namespace).join(pod))
        .find(|dir| dir.is_dir())
}

/// Container names that have a current log file in the given pod log
/// directory.
pub fn containers_with_logs(log_dir: &Path) -> Vec<String> {
    let mut containers: Vec<String> = files_under(log_dir)
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let stem = name.strip_suffix(".log")?;
            if stem.ends_with("-previous") {
                return None;
            }
            Some(stem.to_string())
        })
        .collect();
    containers.sort();
    containers
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(files_under(&path));
        } else {
            files.push(path);
        }
    }
    files.sort();
    files
}
