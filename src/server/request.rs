//! Kubernetes REST path and query parsing

use axum::extract::Query;
use axum::http::Uri;
use serde::Deserialize;

/// A parsed resource route: which resource is being addressed, in which
/// namespace, and whether a single object or a subresource is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub group: String,
    pub version: String,
    pub namespace: Option<String>,
    pub resource: String,
    pub name: Option<String>,
    pub subresource: Option<String>,
}

/// Parse the resource path forms:
///
/// - `/api/v1/<resource>[/<name>[/<subresource>]]`
/// - `/api/v1/namespaces/<ns>/<resource>[/<name>[/<subresource>]]`
/// - `/apis/<group>/<version>/<resource>...`
/// - `/apis/<group>/<version>/namespaces/<ns>/<resource>...`
///
/// Discovery endpoints (`/api`, `/apis`, group/version roots) are routed
/// separately and never reach this parser.
pub fn parse_path(path: &str) -> Option<ResourceRequest> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (group, version, rest) = match segments.as_slice() {
        ["api", "v1", rest @ ..] => ("", "v1", rest),
        ["apis", group, version, rest @ ..] => (*group, *version, rest),
        _ => return None,
    };

    let (namespace, rest) = match rest {
        // `/namespaces/<name>` addresses the Namespace object itself;
        // only a longer tail makes it a scope.
        ["namespaces", ns, rest @ ..] if !rest.is_empty() => (Some(*ns), rest),
        rest => (None, rest),
    };

    let request = match rest {
        [resource] => ResourceRequest {
            resource: resource.to_string(),
            name: None,
            subresource: None,
            ..blank(group, version, namespace)
        },
        [resource, name] => ResourceRequest {
            resource: resource.to_string(),
            name: Some(name.to_string()),
            subresource: None,
            ..blank(group, version, namespace)
        },
        [resource, name, subresource] => ResourceRequest {
            resource: resource.to_string(),
            name: Some(name.to_string()),
            subresource: Some(subresource.to_string()),
            ..blank(group, version, namespace)
        },
        _ => return None,
    };
    Some(request)
}

fn blank(group: &str, version: &str, namespace: Option<&str>) -> ResourceRequest {
    ResourceRequest {
        group: group.to_string(),
        version: version.to_string(),
        namespace: namespace.map(str::to_string),
        resource: String::new(),
        name: None,
        subresource: None,
    }
}

/// Query parameters the emulator honors. `limit` and `continue` are parsed
/// but ignored uniformly; pagination over an immutable snapshot would only
/// complicate clients.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiQuery {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    watch: Option<String>,
    pub container: Option<String>,
    previous: Option<String>,
    pub tail_lines: Option<u64>,
    #[allow(dead_code)]
    pub limit: Option<u64>,
    #[allow(dead_code)]
    #[serde(rename = "continue")]
    pub continue_token: Option<String>,
}

impl ApiQuery {
    pub fn from_uri(uri: &Uri) -> Option<Self> {
        Query::<ApiQuery>::try_from_uri(uri).map(|q| q.0).ok()
    }

    pub fn is_watch(&self) -> bool {
        flag(self.watch.as_deref())
    }

    pub fn is_previous(&self) -> bool {
        flag(self.previous.as_deref())
    }
}

fn flag(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1"))
}
