//! The node contract: the seam between the runtime and node authors.

pub mod host;
pub mod registry;

pub use host::{NodeHost, NodeStats};
pub use registry::{NodeFactory, NodeRegistry};

use crate::data::{ControlMessage, RuntimeData};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// What a single `process()` invocation produces.
pub enum ProcessOutput {
    /// A filter or sink that produced nothing for this input.
    None,
    /// Exactly one output item.
    One(RuntimeData),
    /// A node that produced a bounded sequence of items for this input
    /// (e.g. a chunker splitting one item into several).
    Many(Vec<RuntimeData>),
}

impl From<Option<RuntimeData>> for ProcessOutput {
    fn from(value: Option<RuntimeData>) -> Self {
        match value {
            Some(item) => ProcessOutput::One(item),
            None => ProcessOutput::None,
        }
    }
}

/// Read-only per-invocation context, scoped to one session.
///
/// Replaces ambient mutable fields on the node itself: state lives in the
/// host's `StateManager`, the node only ever sees a handle scoped to the
/// session of the item it is currently processing.
pub struct NodeContext<'a> {
    pub node_id: &'a str,
    pub session_id: &'a str,
    pub state: crate::state::SessionHandle,
}

/// Static, construction-time metadata a node advertises to the scheduler.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub is_streaming: bool,
    pub is_source: bool,
    pub is_sink: bool,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_streaming: false,
            is_source: false,
            is_sink: false,
        }
    }
}

/// The contract every node body implements.
///
/// `initialize`/`cleanup` run exactly once. `process` runs once per input
/// item (source nodes are driven by `generate` instead). Control messages
/// bypass `process` entirely and are routed to `process_control_message`.
#[async_trait]
pub trait Node: Send + Sync {
    fn info(&self) -> NodeInfo;

    async fn initialize(&mut self, params: &HashMap<String, serde_json::Value>) -> Result<()>;

    async fn process(&mut self, ctx: &NodeContext<'_>, item: RuntimeData) -> Result<ProcessOutput>;

    /// Source-node generator. Only called when `info().is_source`. Default:
    /// a source node that didn't override this produces nothing.
    async fn generate(&mut self, _ctx: &NodeContext<'_>) -> Result<ProcessOutput> {
        Ok(ProcessOutput::None)
    }

    /// Default control-message handling: ignore it. Nodes needing custom
    /// scoping (e.g. an ASR that must drop in-flight work on cancellation)
    /// override this.
    async fn process_control_message(
        &mut self,
        _ctx: &NodeContext<'_>,
        _msg: &ControlMessage,
    ) -> Result<ProcessOutput> {
        Ok(ProcessOutput::None)
    }

    /// Called on end-of-stream and on an explicit `FlushBuffer`. Default: no
    /// buffered state to drain.
    async fn flush(&mut self, _ctx: &NodeContext<'_>) -> Result<ProcessOutput> {
        Ok(ProcessOutput::None)
    }

    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}
