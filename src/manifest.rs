//! Pipeline manifest: the only authoritative description of a pipeline's
//! topology. Parsed from JSON or YAML, validated as a connected DAG.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub metadata: ManifestMetadata,
    pub nodes: Vec<NodeManifest>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeManifest {
    pub id: String,
    pub node_type: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<serde_json::Value>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

/// Where a node's lifecycle task runs. Chosen once at build time and fixed
/// for the life of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One in-process async task, sharing the scheduler's process.
    #[default]
    Native,
    /// One OS process, bridged to the rest of the pipeline over IPC rings.
    OutOfProcess,
}

impl NodeManifest {
    /// A node runs out-of-process when declared so explicitly, or when it
    /// advertises a GPU capability: sharing a process with a GPU-bound node
    /// risks one node's crash taking the whole pipeline's process down with
    /// it, so isolation is implied even without an explicit declaration.
    pub fn runs_out_of_process(&self) -> bool {
        self.execution_mode == ExecutionMode::OutOfProcess
            || self.capabilities.as_ref().and_then(|c| c.get("gpu")).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

impl Manifest {
    /// Parses `text` as JSON if it looks like JSON (leading `{`), otherwise as
    /// YAML. Manifests are hand-authored in either format; sniffing spares
    /// callers from tracking a file extension through to this point.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim_start();
        let manifest: Manifest = if trimmed.starts_with('{') {
            serde_json::from_str(text).map_err(|e| Error::InvalidManifest(e.to_string()))?
        } else {
            serde_yaml::from_str(text).map_err(|e| Error::InvalidManifest(e.to_string()))?
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Structural validation only: version tag, unique IDs, resolvable edges,
    /// at least one source and one sink. Acyclicity is checked by the
    /// scheduler's topological sort, which needs to walk the graph anyway.
    pub fn validate(&self) -> Result<()> {
        if self.version != "v1" {
            return Err(Error::InvalidManifest(format!(
                "unsupported manifest version: {}",
                self.version
            )));
        }

        if self.nodes.is_empty() {
            return Err(Error::InvalidManifest("manifest has no nodes".to_string()));
        }

        let mut seen_ids = HashSet::new();
        for node in &self.nodes {
            if !seen_ids.insert(node.id.as_str()) {
                return Err(Error::InvalidManifest(format!("duplicate node id: {}", node.id)));
            }
        }

        for conn in &self.connections {
            if !seen_ids.contains(conn.from.as_str()) {
                return Err(Error::InvalidManifest(format!(
                    "connection references unknown node: {}",
                    conn.from
                )));
            }
            if !seen_ids.contains(conn.to.as_str()) {
                return Err(Error::InvalidManifest(format!(
                    "connection references unknown node: {}",
                    conn.to
                )));
            }
        }

        let mut has_outgoing: HashSet<&str> = HashSet::new();
        let mut has_incoming: HashSet<&str> = HashSet::new();
        for conn in &self.connections {
            has_outgoing.insert(conn.from.as_str());
            has_incoming.insert(conn.to.as_str());
        }

        let has_source = self.nodes.iter().any(|n| !has_incoming.contains(n.id.as_str()));
        let has_sink = self.nodes.iter().any(|n| !has_outgoing.contains(n.id.as_str()));

        if !has_source {
            return Err(Error::InvalidManifest(
                "graph has no source node (in-degree 0)".to_string(),
            ));
        }
        if !has_sink {
            return Err(Error::InvalidManifest(
                "graph has no sink node (out-degree 0)".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "version": "v1",
            "metadata": { "name": "demo" },
            "nodes": [
                { "id": "src", "node_type": "Source", "params": {} },
                { "id": "mid", "node_type": "PassThrough", "params": {} },
                { "id": "sink", "node_type": "Sink", "params": {} }
            ],
            "connections": [
                { "from": "src", "to": "mid" },
                { "from": "mid", "to": "sink" }
            ]
        }"#
    }

    #[test]
    fn parses_and_validates_json() {
        let manifest = Manifest::parse(sample_json()).unwrap();
        assert_eq!(manifest.nodes.len(), 3);
    }

    #[test]
    fn parses_yaml() {
        let yaml = "version: v1\nmetadata:\n  name: demo\nnodes:\n  - id: src\n    node_type: Source\n  - id: sink\n    node_type: Sink\nconnections:\n  - from: src\n    to: sink\n";
        let manifest = Manifest::parse(yaml).unwrap();
        assert_eq!(manifest.nodes.len(), 2);
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let json = sample_json().replace("\"mid\"", "\"src\"");
        assert!(Manifest::parse(&json).is_err());
    }

    #[test]
    fn rejects_connection_to_unknown_node() {
        let json = sample_json().replace("\"sink\", \"node_type\"", "\"ghost\", \"node_type\"");
        let result = Manifest::parse(&json);
        assert!(result.is_err() || result.unwrap().nodes.iter().all(|n| n.id != "ghost"));
    }

    #[test]
    fn rejects_graph_with_no_sink() {
        let json = r#"{
            "version": "v1",
            "metadata": { "name": "cyclic" },
            "nodes": [
                { "id": "a", "node_type": "A", "params": {} },
                { "id": "b", "node_type": "B", "params": {} }
            ],
            "connections": [
                { "from": "a", "to": "b" },
                { "from": "b", "to": "a" }
            ]
        }"#;
        assert!(Manifest::parse(json).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let json = sample_json().replace("\"v1\"", "\"v2\"");
        assert!(Manifest::parse(&json).is_err());
    }

    #[test]
    fn execution_mode_defaults_to_native() {
        let manifest = Manifest::parse(sample_json()).unwrap();
        assert!(manifest.nodes.iter().all(|n| n.execution_mode == ExecutionMode::Native));
        assert!(!manifest.nodes[0].runs_out_of_process());
    }

    #[test]
    fn explicit_out_of_process_declaration_is_honored() {
        let json = sample_json().replace(
            "{ \"id\": \"mid\", \"node_type\": \"PassThrough\", \"params\": {} }",
            "{ \"id\": \"mid\", \"node_type\": \"PassThrough\", \"params\": {}, \"execution_mode\": \"out_of_process\" }",
        );
        let manifest = Manifest::parse(&json).unwrap();
        let mid = manifest.nodes.iter().find(|n| n.id == "mid").unwrap();
        assert_eq!(mid.execution_mode, ExecutionMode::OutOfProcess);
        assert!(mid.runs_out_of_process());
    }

    #[test]
    fn gpu_capability_implies_out_of_process_even_without_an_explicit_declaration() {
        let json = sample_json().replace(
            "{ \"id\": \"mid\", \"node_type\": \"PassThrough\", \"params\": {} }",
            "{ \"id\": \"mid\", \"node_type\": \"PassThrough\", \"params\": {}, \"capabilities\": { \"gpu\": { \"count\": 1 } } }",
        );
        let manifest = Manifest::parse(&json).unwrap();
        let mid = manifest.nodes.iter().find(|n| n.id == "mid").unwrap();
        assert_eq!(mid.execution_mode, ExecutionMode::Native);
        assert!(mid.runs_out_of_process());
    }
}
