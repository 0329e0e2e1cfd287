//! Error types for the bundle API server

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no cluster-resources directory found under {0}")]
    BundleNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("server startup failed: {0}")]
    Startup(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
