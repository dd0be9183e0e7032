//! Out-of-process worker entry point: the child-process counterpart to
//! [`crate::scheduler::Pipeline`]'s out-of-process execution mode. An
//! embedding binary that wants to support out-of-process nodes checks
//! [`requested`] at startup and, if it returns true, awaits [`run`] instead
//! of the binary's normal entry point.

use crate::error::{Error, Result};
use crate::node::host::{NodeHost, NodeStats};
use crate::node::registry::NodeRegistry;
use crate::state::{StateManager, StateManagerConfig};
use crate::transport::ipc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Env vars the scheduler sets before spawning a worker process; read back
/// here on the child side.
pub const NODE_TYPE_ENV: &str = "REMOTEMEDIA_WORKER_NODE_TYPE";
pub const NODE_ID_ENV: &str = "REMOTEMEDIA_WORKER_NODE_ID";
pub const SESSION_ID_ENV: &str = "REMOTEMEDIA_WORKER_SESSION_ID";
pub const PARAMS_ENV: &str = "REMOTEMEDIA_WORKER_PARAMS";

/// True when the current process was spawned as a node worker.
pub fn requested() -> bool {
    std::env::var(NODE_TYPE_ENV).is_ok()
}

/// Runs this process as a single node's worker until the node's lifecycle
/// ends or it's signalled to stop, then returns the runner-process exit
/// code: 0 success, 1 node error, 2 invalid invocation, 3 worker startup
/// timeout.
pub async fn run(registry: &NodeRegistry) -> i32 {
    match run_inner(registry).await {
        Ok(_stats) => 0,
        Err(Error::InvalidManifest(_)) => 2,
        Err(Error::WorkerStartupTimeout { .. }) => 3,
        Err(e) => {
            tracing::error!(error = %e, "worker process exiting with error");
            1
        }
    }
}

async fn run_inner(registry: &NodeRegistry) -> Result<NodeStats> {
    let node_type = read_env(NODE_TYPE_ENV)?;
    let node_id = read_env(NODE_ID_ENV)?;
    let session_id = read_env(SESSION_ID_ENV)?;
    let params: HashMap<String, serde_json::Value> = match std::env::var(PARAMS_ENV) {
        Ok(raw) if !raw.is_empty() => {
            serde_json::from_str(&raw).map_err(|e| Error::InvalidManifest(e.to_string()))?
        }
        _ => HashMap::new(),
    };

    let node = registry.create(&node_type)?;
    let state_manager = Arc::new(StateManager::new(StateManagerConfig::from_env()));

    let (stop_tx, stop_rx) = watch::channel(false);
    state_manager.spawn_sweep_task(stop_rx.clone());
    tokio::spawn(signal_listener(stop_tx));

    let host = NodeHost::new(node_id.clone(), node, state_manager);
    let (worker_in_tx, worker_out_rx) = ipc::worker_attach(&session_id, &node_id).await?;

    let (ready_tx, _ready_rx) = oneshot::channel();
    host.run(params, worker_out_rx, vec![worker_in_tx], ready_tx, stop_rx).await
}

fn read_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::InvalidManifest(format!("missing required worker env var: {key}")))
}

/// Watches for SIGTERM (the host's graceful-stop signal) and translates it
/// into the node host's own stop channel, so a worker shuts down by
/// draining rather than being killed mid-`process()`.
#[cfg(unix)]
async fn signal_listener(stop_tx: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    term.recv().await;
    let _ = stop_tx.send(true);
}

#[cfg(not(unix))]
async fn signal_listener(stop_tx: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = stop_tx.send(true);
    }
}
