//! RemoteMedia pipeline runtime: a transport-agnostic engine for wiring
//! typed, streaming media/AI nodes into a DAG and driving them to
//! completion.
//!
//! # Architecture
//!
//! - [`manifest`] parses and validates a pipeline's topology.
//! - [`scheduler`] turns a validated manifest into a running pipeline:
//!   resolves node types via [`node::NodeRegistry`], wires edges, starts
//!   every node's lifecycle task and reports a [`error::TerminalStatus`].
//! - [`node`] defines the node contract ([`node::Node`]) and the per-node
//!   lifecycle host ([`node::host::NodeHost`]) that drives it.
//! - [`data`] is the wire format every edge carries (`RuntimeData`).
//! - [`transport`] wires an edge either as an in-process bounded channel or,
//!   behind the `multiprocess` feature, a shared-memory iceoryx2 ring.
//! - [`worker`] is the child-process side of an out-of-process node, spawned
//!   and supervised by [`scheduler::Pipeline`] when a node's manifest entry
//!   declares or implies out-of-process execution.
//! - [`model_registry`] deduplicates and evicts loaded inference models
//!   across node instances that share a process.
//! - [`state`] gives each node a bounded, TTL'd, per-session key/value store,
//!   with a self-owned periodic sweep task.
//! - [`vad_gate`] implements speculative forwarding for low-latency audio
//!   pipelines, with retroactive cancellation.

#![warn(clippy::all)]
#![allow(clippy::arc_with_non_send_sync)] // iceoryx2 types are intentionally !Send

pub mod data;
pub mod error;
pub mod manifest;
pub mod model_registry;
pub mod node;
pub mod scheduler;
pub mod state;
pub mod transport;
pub mod vad_gate;
#[cfg(feature = "multiprocess")]
pub mod worker;

pub use error::{Error, PipelineStatus, Result, TerminalStatus};
pub use manifest::Manifest;
pub use node::{Node, NodeContext, NodeInfo, ProcessOutput};
pub use scheduler::{Pipeline, RunningPipeline, SchedulerConfig};

/// Initializes a `tracing` subscriber reading `RUST_LOG` (falling back to
/// `info`), with JSON output when `LOG_FORMAT=json` is set. Intended for
/// binaries embedding this runtime; library consumers that already manage
/// their own subscriber should not call this.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
