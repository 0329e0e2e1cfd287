//! Discovery documents: `/api`, `/apis`, and per-group resource lists
//!
//! kubectl resolves every request through discovery first, so these
//! responses decide what the emulated cluster appears to contain: the
//! static built-in table merged with whatever CRDs the bundle captured.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    APIGroup, APIGroupList, APIResource, APIResourceList, APIVersions, GroupVersionForDiscovery,
};

use crate::catalog;
use crate::crds::CrdRegistry;

/// The verbs every resource here supports; the bundle is immutable.
const READ_VERBS: &[&str] = &["get", "list"];

fn read_verbs() -> Vec<String> {
    READ_VERBS.iter().map(|v| v.to_string()).collect()
}

/// `/api`: the legacy core group only serves v1.
pub fn api_versions() -> APIVersions {
    APIVersions {
        versions: vec!["v1".to_string()],
        server_address_by_client_cidrs: Vec::new(),
    }
}

/// `/apis`: built-in groups merged with the groups the CRD registry holds.
pub fn api_groups(crds: &CrdRegistry) -> APIGroupList {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for desc in catalog::BUILTIN.iter().filter(|desc| !desc.group.is_empty()) {
        let versions = groups.entry(desc.group.to_string()).or_default();
        if !versions.contains(&desc.version.to_string()) {
            versions.push(desc.version.to_string());
        }
    }
    for (group, versions) in crds.groups() {
        let known = groups.entry(group).or_default();
        for version in versions {
            if !known.contains(&version) {
                known.push(version);
            }
        }
    }

    let groups = groups
        .into_iter()
        .map(|(name, versions)| {
            let versions: Vec<GroupVersionForDiscovery> = versions
                .into_iter()
                .map(|version| GroupVersionForDiscovery {
                    group_version: format!("{name}/{version}"),
                    version,
                })
                .collect();
            APIGroup {
                name,
                preferred_version: versions.first().cloned(),
                versions,
                server_address_by_client_cidrs: None,
            }
        })
        .collect();
    APIGroupList { groups }
}

/// `/api/v1` or `/apis/<group>/<version>`: the resources served under one
/// group version. `None` when the group/version is unknown to both the
/// built-in table and the CRD registry.
pub fn api_resources(group: &str, version: &str, crds: &CrdRegistry) -> Option<APIResourceList> {
    let mut resources: Vec<APIResource> = catalog::BUILTIN
        .iter()
        .filter(|desc| desc.group == group && desc.version == version)
        .map(|desc| APIResource {
            name: desc.name.to_string(),
            singular_name: String::new(),
            kind: desc.kind.to_string(),
            namespaced: desc.namespaced,
            verbs: read_verbs(),
            ..Default::default()
        })
        .collect();
    for crd in crds.resources_in(group, version) {
        resources.push(APIResource {
            name: crd.plural.clone(),
            singular_name: String::new(),
            kind: crd.kind.clone(),
            namespaced: crd.namespaced,
            verbs: read_verbs(),
            ..Default::default()
        });
    }
    if resources.is_empty() {
        return None;
    }
    resources.sort_by(|a, b| a.name.cmp(&b.name));

    let group_version = if group.is_empty() {
        version.to_string()
    } else {
        format!("{group}/{version}")
    };
    Some(APIResourceList {
        group_version,
        resources,
    })
}
