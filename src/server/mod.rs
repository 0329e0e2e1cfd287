//! The API server loop
//!
//! Binds a loopback port, serves the emulated apiserver, and writes a
//! kubeconfig pointing at it. All shared state is built before the
//! listener starts accepting; shutdown is driven by the caller's
//! cancellation token and drains in-flight requests.

pub mod handlers;
pub mod request;
mod trace;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bundle::ClusterData;
use crate::crds::CrdRegistry;
use crate::error::{Error, Result};
use crate::kubeconfig;

pub use handlers::AppState;

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Log response bodies with each request trace.
    pub debug: bool,
}

/// A running API server. Dropping the handle does not stop the server;
/// cancel the token passed to [`start`] instead.
pub struct ApiServerHandle {
    addr: SocketAddr,
    kubeconfig_path: PathBuf,
    task: JoinHandle<std::io::Result<()>>,
}

impl ApiServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Path of the materialized kubeconfig. Deleting it when the session
    /// ends is the caller's responsibility.
    pub fn kubeconfig_path(&self) -> &Path {
        &self.kubeconfig_path
    }

    /// Wait for the server to finish serving (after cancellation).
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result.map_err(Error::Io),
            Err(err) => Err(Error::Startup(format!("server task failed: {err}"))),
        }
    }
}

/// Assemble the full router for the given state. Exposed so tests can
/// drive the HTTP surface without binding a socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api", get(handlers::get_api))
        .route("/apis", get(handlers::get_apis))
        .route("/api/v1", get(handlers::get_core_resources))
        .route("/apis/{group}/{version}", get(handlers::get_group_resources))
        .route("/version", get(handlers::get_version))
        .route("/openapi/v2", get(handlers::get_openapi_v2))
        .route("/openapi/v3", get(handlers::get_openapi_v3))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::healthz))
        .fallback(handlers::dispatch)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_requests,
        ))
        .with_state(state)
}

/// Start the API server on an ephemeral loopback port and write a
/// kubeconfig pointing at it.
pub async fn start(
    cluster: Arc<ClusterData>,
    options: ServerOptions,
    shutdown: CancellationToken,
) -> Result<ApiServerHandle> {
    // Eager so the first kubectl invocation pays no discovery penalty and
    // the registry is immutable before any request can observe it.
    let crds = Arc::new(CrdRegistry::load(&cluster));
    if !crds.is_empty() {
        tracing::info!(crds = crds.len(), "discovered custom resource definitions");
    }

    let state = Arc::new(AppState {
        cluster,
        crds,
        debug: options.debug,
    });
    let app = build_router(state);

    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|err| Error::Startup(format!("could not bind loopback listener: {err}")))?;
    let addr = listener
        .local_addr()
        .map_err(|err| Error::Startup(format!("could not read local address: {err}")))?;

    let kubeconfig_path = kubeconfig::write(&format!("http://{addr}"))?;
    tracing::info!(%addr, kubeconfig = %kubeconfig_path.display(), "API server listening");

    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    });

    Ok(ApiServerHandle {
        addr,
        kubeconfig_path,
        task,
    })
}
