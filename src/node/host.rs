//! Per-node lifecycle host: `initialize → process-loop → cleanup`, with
//! queue-during-init, control-message dispatch, and status reporting.

use super::{Node, NodeContext, ProcessOutput};
use crate::data::{ControlMessage, ControlMessageType, RuntimeData};
use crate::error::{Error, Result};
use crate::state::StateManager;
use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

/// What travels along an edge: ordinary data (which may itself carry a
/// `ControlMessage` payload) or the terminal sentinel.
#[derive(Debug, Clone)]
pub enum EdgeMessage {
    Data(RuntimeData),
    Sentinel,
}

/// Node lifecycle states per the runtime's state machine. `Ready` is the
/// transient bookkeeping state between items; `Processing` is held only
/// while one `process()` invocation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Idle,
    Initializing,
    Ready,
    Processing,
    Stopping,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStats {
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub processing_time_total_us: u64,
}

impl NodeStats {
    fn record_success(&mut self, elapsed: Duration) {
        self.messages_processed += 1;
        self.processing_time_total_us += elapsed.as_micros() as u64;
    }

    fn record_failure(&mut self, elapsed: Duration) {
        self.messages_failed += 1;
        self.processing_time_total_us += elapsed.as_micros() as u64;
    }
}

/// Owns one node instance and drives its lifecycle in its own task.
pub struct NodeHost {
    node_id: String,
    node: Box<dyn Node>,
    state: Arc<SyncMutex<NodeState>>,
    stats: Arc<SyncMutex<NodeStats>>,
    state_manager: Arc<StateManager>,
}

impl NodeHost {
    pub fn new(node_id: impl Into<String>, node: Box<dyn Node>, state_manager: Arc<StateManager>) -> Self {
        Self {
            node_id: node_id.into(),
            node,
            state: Arc::new(SyncMutex::new(NodeState::Idle)),
            stats: Arc::new(SyncMutex::new(NodeStats::default())),
            state_manager,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state.lock().clone()
    }

    pub fn stats(&self) -> NodeStats {
        self.stats.lock().clone()
    }

    fn set_state(&self, state: NodeState) {
        *self.state.lock() = state;
    }

    /// Drives the node through its full lifecycle. `ready_tx` is fired once
    /// the queuing task is in place and the input edge is attached — the
    /// scheduler must not observe `READY` before that, or items published in
    /// the gap before `initialize()` returns would be lost.
    pub async fn run(
        mut self,
        params: HashMap<String, serde_json::Value>,
        mut input: mpsc::Receiver<EdgeMessage>,
        outputs: Vec<mpsc::Sender<EdgeMessage>>,
        ready_tx: oneshot::Sender<()>,
        mut stop_rx: tokio::sync::watch::Receiver<bool>,
    ) -> Result<NodeStats> {
        self.set_state(NodeState::Initializing);

        let queue: Arc<AsyncMutex<VecDeque<EdgeMessage>>> = Arc::new(AsyncMutex::new(VecDeque::new()));
        let queue_for_task = Arc::clone(&queue);
        let (stop_queue_tx, mut stop_queue_rx) = oneshot::channel::<()>();

        let queuing_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_queue_rx => break,
                    maybe_item = input.recv() => {
                        match maybe_item {
                            Some(item) => queue_for_task.lock().await.push_back(item),
                            None => break,
                        }
                    }
                }
            }
            input
        });

        // The queuing task is running and the input edge is attached: safe
        // to let the scheduler start sending.
        let _ = ready_tx.send(());

        let init_result = self.node.initialize(&params).await;

        let _ = stop_queue_tx.send(());
        let mut input = queuing_task
            .await
            .map_err(|e| Error::InitializationFailed {
                node: self.node_id.clone(),
                cause: format!("queuing task panicked: {e}"),
            })?;

        if let Err(e) = init_result {
            self.set_state(NodeState::Error);
            return Err(Error::InitializationFailed {
                node: self.node_id.clone(),
                cause: e.to_string(),
            });
        }

        self.set_state(NodeState::Ready);

        // Drain items that arrived during initialize(), in arrival order,
        // before touching the live channel at all.
        let mut queued = queue.lock().await;
        while let Some(msg) = queued.pop_front() {
            drop(queued);
            if self.dispatch(&outputs, msg).await? {
                self.cleanup_and_finish(&outputs).await?;
                return Ok(self.stats());
            }
            queued = queue.lock().await;
        }
        drop(queued);

        // Source nodes have no upstream edge feeding them; they're driven by
        // repeatedly calling `generate()` instead. Both branches borrow
        // `&mut self`, but `if` guards disable one entirely depending on
        // `is_source`, so only one is ever polled.
        let is_source = self.node.info().is_source;

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_ok() && *stop_rx.borrow() {
                        break;
                    }
                }
                maybe_item = input.recv(), if !is_source => {
                    match maybe_item {
                        Some(msg) => {
                            if self.dispatch(&outputs, msg).await? {
                                self.cleanup_and_finish(&outputs).await?;
                                return Ok(self.stats());
                            }
                        }
                        None => break,
                    }
                }
                result = self.generate_and_forward(&outputs), if is_source => {
                    if result? {
                        self.cleanup_and_finish(&outputs).await?;
                        return Ok(self.stats());
                    }
                }
            }
        }

        self.cleanup_and_finish(&outputs).await?;
        Ok(self.stats())
    }

    /// Drives one `generate()` call for a source node. Returns `Ok(true)`
    /// when the source signalled `SourceExhausted` (caller must stop and
    /// cascade a sentinel downstream); a critical error instead escalates to
    /// `PipelineFailed`, same as `handle_data`; other errors are logged and
    /// treated as a skipped tick.
    async fn generate_and_forward(&mut self, outputs: &[mpsc::Sender<EdgeMessage>]) -> Result<bool> {
        self.set_state(NodeState::Processing);
        let state = self.state_manager.get_or_create("");
        let ctx = NodeContext {
            node_id: &self.node_id,
            session_id: "",
            state,
        };
        let started = Instant::now();
        let result = self.node.generate(&ctx).await;
        self.set_state(NodeState::Ready);

        match result {
            Ok(produced) => {
                self.stats.lock().record_success(started.elapsed());
                self.forward(outputs, produced).await?;
                Ok(false)
            }
            Err(Error::SourceExhausted) => Ok(true),
            Err(e) => {
                self.stats.lock().record_failure(started.elapsed());
                if e.is_critical() {
                    tracing::error!(node = %self.node_id, error = %e, "source generate() failed critically, stopping");
                    return Err(Error::PipelineFailed {
                        failing_node: self.node_id.clone(),
                        cause: e.to_string(),
                    });
                }
                tracing::warn!(node = %self.node_id, error = %e, "generate() failed, continuing");
                Ok(false)
            }
        }
    }

    /// Handles one edge message. Returns `Ok(true)` if it was the sentinel
    /// (caller must stop the loop).
    async fn dispatch(&mut self, outputs: &[mpsc::Sender<EdgeMessage>], msg: EdgeMessage) -> Result<bool> {
        match msg {
            EdgeMessage::Sentinel => Ok(true),
            EdgeMessage::Data(item) => {
                if let Some(control) = item.as_control_message().cloned() {
                    self.handle_control(outputs, &item, &control).await?;
                } else {
                    self.handle_data(outputs, item).await?;
                }
                Ok(false)
            }
        }
    }

    async fn handle_data(&mut self, outputs: &[mpsc::Sender<EdgeMessage>], item: RuntimeData) -> Result<()> {
        self.set_state(NodeState::Processing);
        let session_id = item.session_id.clone();
        let state = self.state_manager.get_or_create(&session_id);
        let ctx = NodeContext {
            node_id: &self.node_id,
            session_id: &session_id,
            state,
        };
        let started = Instant::now();
        let result = self.node.process(&ctx, item).await;
        self.set_state(NodeState::Ready);

        match result {
            Ok(produced) => {
                self.stats.lock().record_success(started.elapsed());
                self.forward(outputs, produced).await
            }
            Err(e) => {
                self.stats.lock().record_failure(started.elapsed());
                if e.is_critical() {
                    tracing::error!(node = %self.node_id, error = %e, "critical error, escalating");
                    return Err(Error::PipelineFailed {
                        failing_node: self.node_id.clone(),
                        cause: e.to_string(),
                    });
                }
                tracing::warn!(node = %self.node_id, error = %e, "process() failed, continuing");
                Ok(())
            }
        }
    }

    /// `CancelSpeculation`/`BatchHint`/`DeadlineWarning` are advisory and
    /// node-specific: delegate to the node's override. `FlushBuffer` always
    /// drains the node's buffered output itself, since the host — not the
    /// node — is responsible for deciding when buffers must be flushed.
    async fn handle_control(
        &mut self,
        outputs: &[mpsc::Sender<EdgeMessage>],
        envelope: &RuntimeData,
        control: &ControlMessage,
    ) -> Result<()> {
        let state = self.state_manager.get_or_create(&envelope.session_id);
        let ctx = NodeContext {
            node_id: &self.node_id,
            session_id: &envelope.session_id,
            state,
        };
        let produced = if matches!(control.message_type, ControlMessageType::FlushBuffer) {
            // Flushed output doesn't necessarily pass through `process()`, so
            // it may not carry a session_id of its own; stamp it with the
            // triggering message's session, the host's call rather than the
            // node's.
            let mut produced = self.node.flush(&ctx).await?;
            stamp_session_id(&mut produced, &envelope.session_id);
            produced
        } else {
            self.node.process_control_message(&ctx, control).await?
        };
        self.forward(outputs, produced).await
    }

    async fn cleanup_and_finish(&mut self, outputs: &[mpsc::Sender<EdgeMessage>]) -> Result<()> {
        self.set_state(NodeState::Stopping);

        // No envelope to scope a context to at teardown; flush/cleanup act
        // on whatever state the node accumulated, not on a specific session.
        let ctx = NodeContext {
            node_id: &self.node_id,
            session_id: "",
            state: self.state_manager.get_or_create(""),
        };
        let flushed = self.node.flush(&ctx).await?;
        self.forward(outputs, flushed).await?;

        self.node.cleanup().await?;
        for out in outputs {
            let _ = out.send(EdgeMessage::Sentinel).await;
        }
        self.set_state(NodeState::Stopped);
        Ok(())
    }

    async fn forward(&self, outputs: &[mpsc::Sender<EdgeMessage>], produced: ProcessOutput) -> Result<()> {
        let items: Vec<RuntimeData> = match produced {
            ProcessOutput::None => Vec::new(),
            ProcessOutput::One(item) => vec![item],
            ProcessOutput::Many(items) => items,
        };
        for item in items {
            for out in outputs {
                let _ = out.send(EdgeMessage::Data(item.clone())).await;
            }
        }
        Ok(())
    }
}

fn stamp_session_id(produced: &mut ProcessOutput, session_id: &str) {
    match produced {
        ProcessOutput::None => {}
        ProcessOutput::One(item) => {
            if item.session_id.is_empty() {
                item.session_id = session_id.to_string();
            }
        }
        ProcessOutput::Many(items) => {
            for item in items {
                if item.session_id.is_empty() {
                    item.session_id = session_id.to_string();
                }
            }
        }
    }
}
