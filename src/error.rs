//! Error taxonomy for the pipeline runtime.
//!
//! One variant per structural failure kind in the error-handling design; per-item
//! failures (`NodeProcessError`) are recovered locally by the host unless the node
//! marks them critical, everything else is pipeline-fatal.

use thiserror::Error;

/// Result type alias for runtime-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Schema violation, cycle, or missing node type. Fatal at build time.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// A node's `initialize()` raised.
    #[error("node '{node}' failed to initialize: {cause}")]
    InitializationFailed { node: String, cause: String },

    /// No `READY` observed from an out-of-process worker within the timeout.
    #[error("node '{node}' did not become ready within the startup timeout")]
    WorkerStartupTimeout { node: String },

    /// A worker process exited or its IPC rings became unresponsive.
    #[error("node '{node}' worker was lost: {cause}")]
    WorkerLost { node: String, cause: String },

    /// `process()` raised. Recovered locally unless the host marks it critical.
    /// `item_id`, when known, identifies the offending item for diagnostics only —
    /// it is not part of the rendered message.
    #[error("node '{node}' failed to process item: {cause}")]
    NodeProcessError {
        node: String,
        item_id: Option<String>,
        cause: String,
    },

    /// A RuntimeData envelope failed self-consistency validation.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A send blocked past a configured bound (opt-in; off by default).
    #[error("backpressure timeout on edge '{0}'")]
    BackpressureTimeout(String),

    /// Advisory: a State Manager capacity limit was hit. Not normally surfaced.
    #[error("state capacity exceeded: {0}")]
    StateCapacityExceeded(String),

    /// The whole pipeline was torn down following a structural failure.
    #[error("pipeline failed in node '{failing_node}': {cause}")]
    PipelineFailed { failing_node: String, cause: String },

    /// Session lookup failed.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Generic execution error not covered by a more specific variant.
    #[error("execution error: {0}")]
    Execution(String),

    /// A source node's `generate()` signals it has no more data. Not a
    /// failure: the host treats it exactly like an upstream edge closing,
    /// cascading a sentinel downstream.
    #[error("source exhausted")]
    SourceExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Item types that should escalate to `PipelineFailed` instead of an incremented
    /// `messages_failed` counter. A node can still unilaterally mark its own error
    /// critical by returning one of the structural variants.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvalidManifest(_)
                | Error::InitializationFailed { .. }
                | Error::WorkerStartupTimeout { .. }
                | Error::WorkerLost { .. }
                | Error::PipelineFailed { .. }
        )
    }
}

/// Terminal result record returned by the executor (§7): streaming callers see the
/// output iterator end and may query this for the reason.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TerminalStatus {
    pub status: PipelineStatus,
    pub cause: Option<String>,
    pub per_node_stats: std::collections::HashMap<String, crate::node::host::NodeStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Success,
    PipelineFailed,
    Interrupted,
}
