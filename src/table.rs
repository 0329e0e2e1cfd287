//! Table responses for kubectl's human-readable output
//!
//! When a client asks for `application/json;as=Table;g=meta.k8s.io;v=v1`,
//! list items are rendered into rows. Pods, Deployments, Services, Nodes,
//! and Namespaces get the status columns kubectl users expect; every other
//! kind falls back to NAME and AGE.

use k8s_openapi::chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::objects;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub kind: &'static str,
    pub api_version: &'static str,
    pub metadata: Value,
    pub column_definitions: Vec<TableColumnDefinition>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub data_type: &'static str,
    pub format: &'static str,
    pub description: &'static str,
    pub priority: i32,
}

#[derive(Debug, Serialize)]
pub struct TableRow {
    pub cells: Vec<Value>,
    pub object: Value,
}

/// Does this Accept header ask for a Table rendering?
pub fn wants_table(accept: &str) -> bool {
    accept.split(',').any(|clause| clause.contains("as=Table"))
}

/// Render items of the given kind into a Table.
pub fn render(kind: &str, items: &[Value], now: DateTime<Utc>) -> Table {
    let columns = columns_for(kind);
    let rows = items
        .iter()
        .map(|item| TableRow {
            cells: cells_for(kind, item, now),
            object: json!({
                "kind": "PartialObjectMetadata",
                "apiVersion": "meta.k8s.io/v1",
                "metadata": item.get("metadata").cloned().unwrap_or_else(|| json!({})),
            }),
        })
        .collect();
    Table {
        kind: "Table",
        api_version: "meta.k8s.io/v1",
        metadata: json!({ "resourceVersion": "1" }),
        column_definitions: columns,
        rows,
    }
}

fn column(name: &'static str, data_type: &'static str, description: &'static str) -> TableColumnDefinition {
    TableColumnDefinition {
        name,
        data_type,
        format: if name == "Name" { "name" } else { "" },
        description,
        priority: 0,
    }
}

fn columns_for(kind: &str) -> Vec<TableColumnDefinition> {
    let mut columns = vec![column("Name", "string", "Name of the resource")];
    match kind {
        "Pod" => {
            columns.push(column("Ready", "string", "Ready containers"));
            columns.push(column("Status", "string", "Pod phase"));
            columns.push(column("Restarts", "integer", "Container restarts"));
        }
        "Deployment" => {
            columns.push(column("Ready", "string", "Ready replicas"));
            columns.push(column("Up-to-date", "integer", "Updated replicas"));
            columns.push(column("Available", "integer", "Available replicas"));
        }
        "Service" => {
            columns.push(column("Type", "string", "Service type"));
            columns.push(column("Cluster-IP", "string", "Cluster IP address"));
            columns.push(column("Port(s)", "string", "Exposed ports"));
        }
        "Node" => {
            columns.push(column("Status", "string", "Node readiness"));
            columns.push(column("Version", "string", "Kubelet version"));
        }
        "Namespace" => {
            columns.push(column("Status", "string", "Namespace phase"));
        }
        _ => {}
    }
    columns.push(column("Age", "string", "Time since creation"));
    columns
}

fn cells_for(kind: &str, item: &Value, now: DateTime<Utc>) -> Vec<Value> {
    let mut cells = vec![json!(objects::name(item).unwrap_or_default())];
    match kind {
        "Pod" => {
            let statuses = item
                .pointer("/status/containerStatuses")
                .and_then(Value::as_array);
            let total = statuses.map_or_else(
                || {
                    item.pointer("/spec/containers")
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len)
                },
                Vec::len,
            );
            let ready = statuses.map_or(0, |s| {
                s.iter()
                    .filter(|c| c.get("ready").and_then(Value::as_bool).unwrap_or(false))
                    .count()
            });
            let restarts: i64 = statuses.map_or(0, |s| {
                s.iter()
                    .filter_map(|c| c.get("restartCount").and_then(Value::as_i64))
                    .sum()
            });
            let phase = item
                .pointer("/status/phase")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            cells.push(json!(format!("{ready}/{total}")));
            cells.push(json!(phase));
            cells.push(json!(restarts));
        }
        "Deployment" => {
            let ready = item
                .pointer("/status/readyReplicas")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let desired = item
                .pointer("/spec/replicas")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let updated = item
                .pointer("/status/updatedReplicas")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let available = item
                .pointer("/status/availableReplicas")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            cells.push(json!(format!("{ready}/{desired}")));
            cells.push(json!(updated));
            cells.push(json!(available));
        }
        "Service" => {
            let service_type = item
                .pointer("/spec/type")
                .and_then(Value::as_str)
                .unwrap_or("ClusterIP");
            let cluster_ip = item
                .pointer("/spec/clusterIP")
                .and_then(Value::as_str)
                .unwrap_or("<none>");
            let ports = item
                .pointer("/spec/ports")
                .and_then(Value::as_array)
                .map(|ports| {
                    ports
                        .iter()
                        .filter_map(|p| {
                            let port = p.get("port").and_then(Value::as_i64)?;
                            let protocol =
                                p.get("protocol").and_then(Value::as_str).unwrap_or("TCP");
                            Some(format!("{port}/{protocol}"))
                        })
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "<none>".to_string());
            cells.push(json!(service_type));
            cells.push(json!(cluster_ip));
            cells.push(json!(ports));
        }
        "Node" => {
            let ready = item
                .pointer("/status/conditions")
                .and_then(Value::as_array)
                .and_then(|conditions| {
                    conditions
                        .iter()
                        .find(|c| c.get("type").and_then(Value::as_str) == Some("Ready"))
                })
                .and_then(|c| c.get("status").and_then(Value::as_str));
            cells.push(json!(match ready {
                Some("True") => "Ready",
                Some(_) => "NotReady",
                None => "Unknown",
            }));
            cells.push(json!(item
                .pointer("/status/nodeInfo/kubeletVersion")
                .and_then(Value::as_str)
                .unwrap_or("")));
        }
        "Namespace" => {
            cells.push(json!(item
                .pointer("/status/phase")
                .and_then(Value::as_str)
                .unwrap_or("Active")));
        }
        _ => {}
    }
    cells.push(json!(format_age(objects::creation_timestamp(item), now)));
    cells
}

/// Compact age rendering in the style of kubectl (`42s`, `5m`, `3h`, `7d`).
fn format_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "<unknown>".to_string();
    };
    let seconds = (now - created).num_seconds();
    if seconds < 0 {
        return "0s".to_string();
    }
    match seconds {
        s if s < 120 => format!("{s}s"),
        s if s < 60 * 60 => format!("{}m", s / 60),
        s if s < 24 * 60 * 60 => format!("{}h", s / 3600),
        s if s < 365 * 24 * 60 * 60 => format!("{}d", s / 86400),
        s => format!("{}y", s / (365 * 24 * 60 * 60)),
    }
}
