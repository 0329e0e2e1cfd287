//! Request handlers: discovery, list/get, pod logs, and write rejection

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use k8s_openapi::chrono::Utc;
use serde_json::{json, Value};

use crate::bundle::ClusterData;
use crate::catalog::{self, ResourceDescriptor};
use crate::crds::{CrdRegistry, CrdResource};
use crate::decode;
use crate::discovery;
use crate::objects;
use crate::selector::{FieldSelector, LabelSelector};
use crate::table;

use super::request::{self, ApiQuery, ResourceRequest};

/// Shared state handed to every request handler. Everything here is built
/// before the listener starts accepting and is read-only afterwards.
pub struct AppState {
    pub cluster: Arc<ClusterData>,
    pub crds: Arc<CrdRegistry>,
    pub debug: bool,
}

/// An error rendered to the client as a Kubernetes `Status` object.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    MethodNotAllowed(String),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    fn code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::MethodNotAllowed(_) => "MethodNotAllowed",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Internal(_) => "InternalError",
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = Status {
            status: Some("Failure".to_string()),
            message: Some(self.message().to_string()),
            reason: Some(self.reason().to_string()),
            code: Some(code.as_u16() as i32),
            ..Default::default()
        };
        (code, Json(status)).into_response()
    }
}

/// `/api`
pub async fn get_api() -> impl IntoResponse {
    Json(discovery::api_versions())
}

/// `/apis`
pub async fn get_apis(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(discovery::api_groups(&state.crds))
}

/// `/api/v1`
pub async fn get_core_resources(State(state): State<Arc<AppState>>) -> Response {
    match discovery::api_resources("", "v1", &state.crds) {
        Some(list) => Json(list).into_response(),
        None => unknown_resource_error().into_response(),
    }
}

/// `/apis/{group}/{version}`
pub async fn get_group_resources(
    Path((group, version)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match discovery::api_resources(&group, &version, &state.crds) {
        Some(list) => Json(list).into_response(),
        None => unknown_resource_error().into_response(),
    }
}

/// `/version`
pub async fn get_version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.cluster.server_version())
}

/// `/openapi/v2`: the captured schema document when the bundle has one,
/// an empty but well-formed one otherwise.
pub async fn get_openapi_v2(State(state): State<Arc<AppState>>) -> Response {
    let fallback = json!({
        "swagger": "2.0",
        "info": { "title": "Kubernetes", "version": "v1.26.0" },
        "paths": {},
        "definitions": {},
    });
    serve_openapi(&state, "openapi-v2", fallback).await
}

/// `/openapi/v3`
pub async fn get_openapi_v3(State(state): State<Arc<AppState>>) -> Response {
    serve_openapi(&state, "openapi-v3", json!({ "paths": {} })).await
}

async fn serve_openapi(state: &AppState, stem: &str, fallback: Value) -> Response {
    if let Some(path) = catalog::openapi_file(&state.cluster, stem) {
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let parsed = serde_json::from_slice::<Value>(&bytes)
                    .or_else(|_| serde_yaml::from_slice::<Value>(&bytes));
                match parsed {
                    Ok(doc) => return Json(doc).into_response(),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "could not parse captured OpenAPI document")
                    }
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not read captured OpenAPI document")
            }
        }
    }
    Json(fallback).into_response()
}

pub async fn healthz() -> &'static str {
    "ok"
}

fn unknown_resource_error() -> ApiError {
    ApiError::NotFound("the server could not find the requested resource".to_string())
}

/// Fallback handler: everything that is not a fixed discovery endpoint is
/// a resource request. Dispatch order: pod-log subresource, then get, then
/// list; write verbs are rejected with MethodNotAllowed.
pub async fn dispatch(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    match dispatch_inner(&state, req.method(), req.uri(), req.headers().get(header::ACCEPT)).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn dispatch_inner(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    accept: Option<&header::HeaderValue>,
) -> Result<Response, ApiError> {
    let Some(resource_req) = request::parse_path(uri.path()) else {
        return Err(unknown_resource_error());
    };
    if *method != Method::GET {
        return Err(ApiError::MethodNotAllowed(format!(
            "the server does not allow this method on the requested resource: {method}"
        )));
    }
    let query = ApiQuery::from_uri(uri)
        .ok_or_else(|| ApiError::BadRequest("malformed query parameters".to_string()))?;

    match resource_req.subresource.as_deref() {
        Some("log") if resource_req.resource == "pods" => {
            let name = resource_req.name.as_deref().unwrap_or_default();
            return pod_logs(state, resource_req.namespace.as_deref(), name, &query).await;
        }
        Some(_) => return Err(unknown_resource_error()),
        None => {}
    }

    let resolved = resolve(state, &resource_req)?;
    let accept = accept.and_then(|v| v.to_str().ok()).unwrap_or_default();
    let mut items = collect_items(state, &resolved, resource_req.namespace.as_deref()).await?;
    filter_items(&mut items, &query)?;
    objects::sort_by_creation_timestamp(&mut items);

    if let Some(name) = resource_req.name.as_deref() {
        let item = items
            .into_iter()
            .find(|item| objects::name(item) == Some(name))
            .ok_or_else(|| {
                ApiError::NotFound(format!("{} \"{name}\" not found", resource_req.resource))
            })?;
        if table::wants_table(accept) {
            return Ok(Json(table::render(resolved.kind(), &[item], Utc::now())).into_response());
        }
        return Ok(Json(item).into_response());
    }

    if query.is_watch() {
        return watch_response(items);
    }
    if table::wants_table(accept) {
        return Ok(Json(table::render(resolved.kind(), &items, Utc::now())).into_response());
    }
    let envelope = objects::list_envelope(&resolved.list_kind(), &resolved.api_version(), items);
    Ok(Json(envelope).into_response())
}

/// A resource resolves against the built-in table first, then the CRD
/// registry.
enum Resolved {
    Builtin(&'static ResourceDescriptor),
    Custom(CrdResource),
}

impl Resolved {
    fn kind(&self) -> &str {
        match self {
            Resolved::Builtin(desc) => desc.kind,
            Resolved::Custom(crd) => &crd.kind,
        }
    }

    fn list_kind(&self) -> String {
        match self {
            Resolved::Builtin(desc) => desc.list_kind(),
            Resolved::Custom(crd) => crd.list_kind(),
        }
    }

    fn api_version(&self) -> String {
        match self {
            Resolved::Builtin(desc) => desc.api_version(),
            Resolved::Custom(crd) => crd.api_version(),
        }
    }

    /// The decoder hint: the canonical resource name for built-ins, the
    /// CRD plural otherwise (unknown to the wrap table, which is fine —
    /// CR files always carry their envelope or decode untyped).
    fn hint(&self) -> &str {
        match self {
            Resolved::Builtin(desc) => desc.name,
            Resolved::Custom(crd) => &crd.plural,
        }
    }

    fn files(&self, cluster: &ClusterData, namespace: Option<&str>) -> Vec<PathBuf> {
        match self {
            Resolved::Builtin(desc) => catalog::builtin_files(cluster, desc, namespace),
            Resolved::Custom(crd) => catalog::custom_resource_files(cluster, crd, namespace),
        }
    }
}

fn resolve(state: &AppState, req: &ResourceRequest) -> Result<Resolved, ApiError> {
    if let Some(desc) = catalog::by_group_version_resource(&req.group, &req.version, &req.resource)
    {
        return Ok(Resolved::Builtin(desc));
    }
    if let Some(crd) = state.crds.get(&req.group, &req.version, &req.resource) {
        return Ok(Resolved::Custom(crd.clone()));
    }
    Err(unknown_resource_error())
}

/// Read and decode every file backing the resource, flatten the items, and
/// stamp the GVK the descriptor implies. Unreadable or undecodable files
/// degrade to zero items; partial bundles are the norm.
async fn collect_items(
    state: &AppState,
    resolved: &Resolved,
    namespace: Option<&str>,
) -> Result<Vec<Value>, ApiError> {
    let api_version = resolved.api_version();
    let mut items = Vec::new();
    for path in resolved.files(&state.cluster, namespace) {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not read resource file");
                continue;
            }
        };
        match decode::decode(Some(resolved.hint()), &bytes) {
            Ok(decoded) => {
                for mut item in decoded.into_items() {
                    objects::stamp_gvk(&mut item, resolved.kind(), &api_version);
                    items.push(item);
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not decode resource file");
            }
        }
    }
    Ok(items)
}

fn filter_items(items: &mut Vec<Value>, query: &ApiQuery) -> Result<(), ApiError> {
    if let Some(raw) = query.label_selector.as_deref() {
        let selector = LabelSelector::parse(raw)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        items.retain(|item| selector.matches(item));
    }
    if let Some(raw) = query.field_selector.as_deref() {
        let selector = FieldSelector::parse(raw)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        items.retain(|item| selector.matches(item));
    }
    Ok(())
}

/// A watch over an immutable snapshot: one synthetic ADDED event per item,
/// then the stream ends.
fn watch_response(items: Vec<Value>) -> Result<Response, ApiError> {
    let mut body = String::new();
    for item in items {
        let event = json!({ "type": "ADDED", "object": item });
        let line = serde_json::to_string(&event)
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        body.push_str(&line);
        body.push('\n');
    }
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|err| ApiError::Internal(err.to_string()))
}

async fn pod_logs(
    state: &AppState,
    namespace: Option<&str>,
    pod: &str,
    query: &ApiQuery,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(format!("logs for pod \"{pod}\" not found"));

    // A log request without a namespace in the path searches the known
    // namespaces for the pod's log directory.
    let log_dir = match namespace {
        Some(ns) => catalog::pod_log_dir(&state.cluster, ns, pod),
        None => state
            .cluster
            .namespaces()
            .iter()
            .find_map(|ns| catalog::pod_log_dir(&state.cluster, ns, pod)),
    }
    .ok_or_else(not_found)?;

    let container = match query.container.as_deref() {
        Some(container) => container.to_string(),
        None => {
            let mut containers = catalog::containers_with_logs(&log_dir);
            match containers.len() {
                0 => return Err(not_found()),
                1 => containers.remove(0),
                _ => {
                    return Err(ApiError::BadRequest(format!(
                        "a container name must be specified for pod {pod}, choose one of: [{}]",
                        containers.join(" ")
                    )))
                }
            }
        }
    };

    let suffix = if query.is_previous() { "-previous.log" } else { ".log" };
    let path = log_dir.join(format!("{container}{suffix}"));
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(err) => {
            tracing::error!(path = %path.display(), %err, "could not read log file");
            return Err(ApiError::Internal("failed to read log file".to_string()));
        }
    };

    let body = match query.tail_lines {
        Some(n) => tail_lines(&contents, n as usize),
        None => contents,
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body))
        .map_err(|err| ApiError::Internal(err.to_string()))
}

/// The last `n` lines of the log, preserving the trailing newline.
fn tail_lines(contents: &str, n: usize) -> String {
    let lines: Vec<&str> = contents.lines().collect();
    if lines.len() <= n {
        return contents.to_string();
    }
    let mut out = lines[lines.len() - n..].join("\n");
    if contents.ends_with('\n') {
        out.push('\n');
    }
    out
}
