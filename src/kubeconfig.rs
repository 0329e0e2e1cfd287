//! Kubeconfig materialization
//!
//! The server loop hands kubectl a throwaway kubeconfig pointing at the
//! loopback listener: one cluster, one context, one placeholder user. The
//! file is kept on disk after creation; deleting it when the session ends
//! is the caller's responsibility.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    #[serde(rename = "current-context")]
    current_context: &'static str,
    clusters: Vec<NamedCluster>,
    contexts: Vec<NamedContext>,
    users: Vec<NamedUser>,
}

#[derive(Debug, Serialize)]
struct NamedCluster {
    name: &'static str,
    cluster: Cluster,
}

#[derive(Debug, Serialize)]
struct Cluster {
    server: String,
}

#[derive(Debug, Serialize)]
struct NamedContext {
    name: &'static str,
    context: Context,
}

#[derive(Debug, Serialize)]
struct Context {
    cluster: &'static str,
    user: &'static str,
}

#[derive(Debug, Serialize)]
struct NamedUser {
    name: &'static str,
    user: User,
}

#[derive(Debug, Serialize)]
struct User {
    token: &'static str,
}

const CLUSTER_NAME: &str = "support-bundle";
const USER_NAME: &str = "support-bundle";

fn config_for(server_url: &str) -> Kubeconfig {
    Kubeconfig {
        api_version: "v1",
        kind: "Config",
        current_context: CLUSTER_NAME,
        clusters: vec![NamedCluster {
            name: CLUSTER_NAME,
            cluster: Cluster {
                server: server_url.to_string(),
            },
        }],
        contexts: vec![NamedContext {
            name: CLUSTER_NAME,
            context: Context {
                cluster: CLUSTER_NAME,
                user: USER_NAME,
            },
        }],
        users: vec![NamedUser {
            name: USER_NAME,
            user: User { token: "unused" },
        }],
    }
}

/// Render a kubeconfig for the given server URL as YAML.
pub fn render(server_url: &str) -> Result<String> {
    Ok(serde_yaml::to_string(&config_for(server_url))?)
}

/// Write a kubeconfig for the given server URL to a kept temp file and
/// return its path.
pub fn write(server_url: &str) -> Result<PathBuf> {
    let contents = render(server_url)?;
    let file = tempfile::Builder::new()
        .prefix("sbserver-kubeconfig-")
        .suffix(".yaml")
        .tempfile()
        .map_err(|err| Error::Startup(format!("could not create kubeconfig: {err}")))?;
    std::fs::write(file.path(), contents)?;
    let (_, path) = file
        .keep()
        .map_err(|err| Error::Startup(format!("could not keep kubeconfig: {err}")))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_single_cluster_config() {
        let yaml = render("http://127.0.0.1:4321").unwrap();
        assert!(yaml.contains("apiVersion: v1"));
        assert!(yaml.contains("kind: Config"));
        assert!(yaml.contains("server: http://127.0.0.1:4321"));
        assert!(yaml.contains("current-context: support-bundle"));
        assert!(yaml.contains("token: unused"));
    }

    #[test]
    fn written_file_round_trips_as_yaml() {
        let path = write("http://127.0.0.1:9999").unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(parsed["clusters"][0]["cluster"]["server"], "http://127.0.0.1:9999");
        std::fs::remove_file(path).unwrap();
    }
}
