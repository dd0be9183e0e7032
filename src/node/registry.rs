//! Resolves `node_type` strings from a manifest to node constructors.

use super::Node;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;

/// A zero-argument constructor producing a fresh, uninitialized node instance.
pub type NodeFactory = Arc<dyn Fn() -> Box<dyn Node> + Send + Sync>;

/// Process-local singleton mapping `node_type` to its constructor. Read-mostly
/// after startup registration; safe to share across the scheduler and any
/// concurrent manifest builds.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: Arc<DashMap<String, NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, node_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Node> + Send + Sync + 'static,
    {
        self.factories.insert(node_type.into(), Arc::new(factory));
    }

    pub fn create(&self, node_type: &str) -> Result<Box<dyn Node>> {
        self.factories
            .get(node_type)
            .map(|factory| factory())
            .ok_or_else(|| Error::InvalidManifest(format!("unknown node_type: {node_type}")))
    }

    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    pub fn node_types(&self) -> Vec<String> {
        self.factories.iter().map(|entry| entry.key().clone()).collect()
    }
}
