//! sbserver: serve a Kubernetes support bundle as a read-only apiserver
//!
//! A support bundle is a directory tree of YAML/JSON snapshots captured
//! from a live cluster. This crate exposes that capture through an HTTP
//! endpoint speaking enough of the Kubernetes REST protocol that kubectl
//! can browse the cluster state as if it were live: discovery, typed and
//! custom resource lists, single-object gets, table rendering, selector
//! filtering, and pod logs.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> sbserver::Result<()> {
//! let cluster = Arc::new(sbserver::ClusterData::find(Path::new("./bundle"))?);
//! let shutdown = CancellationToken::new();
//! let handle = sbserver::server::start(cluster, Default::default(), shutdown.clone()).await?;
//! println!("export KUBECONFIG={}", handle.kubeconfig_path().display());
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod catalog;
pub mod crds;
pub mod decode;
pub mod discovery;
pub mod error;
pub mod kubeconfig;
pub mod objects;
pub mod selector;
pub mod server;
pub mod table;

pub use bundle::ClusterData;
pub use crds::CrdRegistry;
pub use error::{Error, Result};
pub use server::{start, ApiServerHandle, ServerOptions};
