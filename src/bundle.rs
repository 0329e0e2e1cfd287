//! Bundle location and cluster metadata
//!
//! A support bundle is a directory tree captured from a live cluster. The
//! locator finds the `cluster-resources/` root inside it, enumerates the
//! namespaces the capture knew about, and exposes the apiserver version the
//! bundle recorded. The resulting [`ClusterData`] is built once at startup
//! and shared read-only with every request handler.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::catalog;
use crate::decode;
use crate::error::{Error, Result};
use crate::objects;

const CLUSTER_RESOURCES: &str = "cluster-resources";
const CLUSTER_INFO: &str = "cluster-info";

/// How deep below the given path the locator searches for a bundle root.
const MAX_SEARCH_DEPTH: usize = 3;

/// Immutable descriptor of a located bundle.
#[derive(Debug, Clone)]
pub struct ClusterData {
    bundle_root: PathBuf,
    cluster_resources_dir: PathBuf,
    cluster_info_dir: Option<PathBuf>,
    namespaces: Vec<String>,
}

impl ClusterData {
    /// Locate the bundle root at or around `path`: the path itself and its
    /// ancestors are checked first, then its subdirectories a few levels
    /// deep (archives usually extract into a single nested directory).
    pub fn find(path: &Path) -> Result<Self> {
        let root = locate_bundle_root(path).ok_or_else(|| Error::BundleNotFound(path.to_path_buf()))?;
        let cluster_resources_dir = root.join(CLUSTER_RESOURCES);
        let cluster_info_dir = Some(root.join(CLUSTER_INFO)).filter(|dir| dir.is_dir());
        let namespaces = discover_namespaces(&cluster_resources_dir);
        tracing::info!(
            bundle = %root.display(),
            namespaces = namespaces.len(),
            "located cluster data"
        );
        Ok(Self {
            bundle_root: root,
            cluster_resources_dir,
            cluster_info_dir,
            namespaces,
        })
    }

    pub fn bundle_root(&self) -> &Path {
        &self.bundle_root
    }

    pub fn cluster_resources_dir(&self) -> &Path {
        &self.cluster_resources_dir
    }

    pub fn cluster_info_dir(&self) -> Option<&Path> {
        self.cluster_info_dir.as_deref()
    }

    /// Namespaces known to this bundle, sorted.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// The apiserver version document recorded in the bundle, or a
    /// placeholder when `cluster-info/cluster_version.json` is absent or
    /// unreadable.
    pub fn server_version(&self) -> Value {
        let recorded = self
            .cluster_info_dir
            .as_deref()
            .map(|dir| dir.join("cluster_version.json"))
            .and_then(|path| fs::read(path).ok())
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
            .and_then(|doc| {
                if doc.get("info").is_some_and(Value::is_object) {
                    Some(doc["info"].clone())
                } else if doc.get("gitVersion").is_some() {
                    Some(doc)
                } else {
                    None
                }
            });
        recorded.unwrap_or_else(|| {
            json!({
                "major": "1",
                "minor": "26",
                "gitVersion": "v1.26.0",
                "platform": "linux/amd64",
            })
        })
    }
}

fn locate_bundle_root(path: &Path) -> Option<PathBuf> {
    for ancestor in path.ancestors() {
        if ancestor.join(CLUSTER_RESOURCES).is_dir() {
            return Some(ancestor.to_path_buf());
        }
    }
    search_below(path, MAX_SEARCH_DEPTH)
}

fn search_below(dir: &Path, depth: usize) -> Option<PathBuf> {
    if depth == 0 {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    for subdir in &subdirs {
        if subdir.join(CLUSTER_RESOURCES).is_dir() {
            return Some(subdir.clone());
        }
    }
    subdirs.iter().find_map(|subdir| search_below(subdir, depth - 1))
}

/// Seed the namespace list. Newer captures keep a `namespaces/` directory;
/// older ones a single `namespaces.json` list. Either way, the per-namespace
/// files present under the namespaced resource directories are unioned in so
/// partial bundles still enumerate fully.
fn discover_namespaces(cluster_resources: &Path) -> Vec<String> {
    let mut namespaces = BTreeSet::new();

    let ns_dir = cluster_resources.join("namespaces");
    if ns_dir.is_dir() {
        namespaces.extend(file_stems(&ns_dir));
    } else if let Some(path) = catalog::first_existing(cluster_resources, "namespaces") {
        match fs::read(&path) {
            Ok(bytes) => match decode::decode(Some("namespaces"), &bytes) {
                Ok(decoded) => {
                    for item in decoded.into_items() {
                        if let Some(name) = objects::name(&item) {
                            namespaces.insert(name.to_string());
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "could not decode namespace list")
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not read namespace list")
            }
        }
    }

    for desc in catalog::BUILTIN.iter().filter(|desc| desc.namespaced) {
        namespaces.extend(file_stems(&cluster_resources.join(desc.name)));
    }

    namespaces.into_iter().collect()
}

fn file_stems(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| Some(path.file_stem()?.to_str()?.to_string()))
        .collect()
}
