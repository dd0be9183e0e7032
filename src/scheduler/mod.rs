//! Builds a [`crate::manifest::Manifest`] into a running pipeline: resolves
//! node types, wires edges, starts every node's lifecycle task, and collects
//! the terminal result once the pipeline finishes or is stopped.

use crate::error::{Error, PipelineStatus, Result, TerminalStatus};
use crate::manifest::Manifest;
use crate::node::host::{EdgeMessage, NodeHost, NodeStats};
use crate::node::registry::NodeRegistry;
use crate::state::{StateManager, StateManagerConfig};
use crate::transport;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// One node's place in the execution graph, derived structurally from the
/// manifest's connections (independent of what a node's own `NodeInfo`
/// claims about itself).
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub node_type: String,
    pub params: HashMap<String, serde_json::Value>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// Whether this node's lifecycle task runs as its own OS process
    /// (`crate::manifest::NodeManifest::runs_out_of_process`).
    pub out_of_process: bool,
}

/// The manifest's topology resolved into adjacency lists plus a valid
/// execution order. Build order doesn't gate correctness here (every edge is
/// an independently running channel), but a pipeline that can't be
/// topologically sorted contains a cycle and is rejected before anything
/// is spawned.
#[derive(Debug)]
pub struct PipelineGraph {
    pub nodes: HashMap<String, GraphNode>,
    pub execution_order: Vec<String>,
    pub sources: Vec<String>,
    pub sinks: Vec<String>,
}

impl PipelineGraph {
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let mut nodes = HashMap::new();

        for node_manifest in &manifest.nodes {
            nodes.insert(
                node_manifest.id.clone(),
                GraphNode {
                    id: node_manifest.id.clone(),
                    node_type: node_manifest.node_type.clone(),
                    params: node_manifest.params.clone(),
                    inputs: Vec::new(),
                    outputs: Vec::new(),
                    out_of_process: node_manifest.runs_out_of_process(),
                },
            );
        }

        for conn in &manifest.connections {
            let from_id = conn.from.clone();
            let to_id = conn.to.clone();
            nodes
                .get_mut(&conn.from)
                .ok_or_else(|| Error::InvalidManifest(format!("unknown source node: {}", conn.from)))?
                .outputs
                .push(to_id);
            nodes
                .get_mut(&conn.to)
                .ok_or_else(|| Error::InvalidManifest(format!("unknown target node: {}", conn.to)))?
                .inputs
                .push(from_id);
        }

        let mut sources = Vec::new();
        let mut sinks = Vec::new();
        for (id, node) in &nodes {
            if node.inputs.is_empty() {
                sources.push(id.clone());
            }
            if node.outputs.is_empty() {
                sinks.push(id.clone());
            }
        }
        sources.sort();
        sinks.sort();

        let execution_order = Self::topological_sort(&nodes)?;

        Ok(Self {
            nodes,
            execution_order,
            sources,
            sinks,
        })
    }

    /// Kahn's algorithm. A result shorter than `nodes` means a cycle exists.
    fn topological_sort(nodes: &HashMap<String, GraphNode>) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for node in nodes.values() {
            for output_id in &node.outputs {
                *in_degree.get_mut(output_id.as_str()).unwrap() += 1;
            }
        }

        let mut queue: std::collections::VecDeque<String> = in_degree
            .iter()
            .filter(|(_, °ree)| degree == 0)
            .map(|(id, _)| id.to_string())
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            if let Some(node) = nodes.get(&id) {
                for output_id in &node.outputs {
                    let degree = in_degree.get_mut(output_id.as_str()).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(output_id.clone());
                    }
                }
            }
        }

        if order.len() != nodes.len() {
            return Err(Error::InvalidManifest("pipeline graph contains a cycle".to_string()));
        }

        Ok(order)
    }

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How long to wait for every node's `READY` signal before declaring the
    /// pipeline startup failed.
    pub worker_ready_timeout: Duration,
    /// How long a stop request waits for nodes to drain and finish cleanly
    /// before the pipeline is reported interrupted rather than successful.
    pub stop_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_ready_timeout: Duration::from_secs(60),
            stop_grace: Duration::from_secs(10),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(ms) = std::env::var("PIPELINE_WORKER_READY_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                config.worker_ready_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(ms) = std::env::var("PIPELINE_STOP_GRACE_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                config.stop_grace = Duration::from_millis(ms);
            }
        }
        config
    }
}

/// A pipeline built from a manifest but not yet started: every node instance
/// is constructed and every edge wired, but no task is running yet.
pub struct Pipeline {
    graph: PipelineGraph,
    hosts: HashMap<String, NodeHost>,
    state_managers: HashMap<String, Arc<StateManager>>,
    inputs: HashMap<String, mpsc::Receiver<EdgeMessage>>,
    input_senders: HashMap<String, mpsc::Sender<EdgeMessage>>,
    outputs: HashMap<String, Vec<mpsc::Sender<EdgeMessage>>>,
    sink_taps: HashMap<String, mpsc::Receiver<EdgeMessage>>,
    /// Identifies this pipeline run's IPC rings; out-of-process nodes, if
    /// any, are namespaced under it so two concurrent pipelines on the same
    /// host never collide on service names.
    session_id: String,
    config: SchedulerConfig,
}

impl Pipeline {
    /// Resolves every native node's type through `registry`, gives each its
    /// own `StateManager`, and wires an in-process bounded channel per edge
    /// — including edges into and out of an out-of-process node, whose
    /// worker is not spawned until [`Pipeline::start`]. Every sink
    /// additionally gets an extra output tap exposed to the caller via
    /// [`RunningPipeline::take_sink`], since a manifest sink has no
    /// downstream node to hand its output to.
    pub fn build(
        manifest: &Manifest,
        registry: &NodeRegistry,
        state_config: StateManagerConfig,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let graph = PipelineGraph::from_manifest(manifest)?;
        let session_id = format!("{}-{}", manifest.metadata.name, uuid::Uuid::new_v4());

        let mut hosts = HashMap::new();
        let mut state_managers = HashMap::new();
        let mut inputs = HashMap::new();
        let mut input_senders = HashMap::new();

        for node_manifest in &manifest.nodes {
            if node_manifest.runs_out_of_process() {
                if !cfg!(feature = "multiprocess") {
                    return Err(Error::InvalidManifest(format!(
                        "node '{}' declares out-of-process execution but the multiprocess feature is disabled",
                        node_manifest.id
                    )));
                }
            } else {
                let state_manager = Arc::new(StateManager::new(state_config.clone()));
                state_managers.insert(node_manifest.id.clone(), Arc::clone(&state_manager));
                let node = registry.create(&node_manifest.node_type)?;
                let host = NodeHost::new(node_manifest.id.clone(), node, state_manager);
                hosts.insert(node_manifest.id.clone(), host);
            }

            let (tx, rx) = transport::in_process_edge(transport::DEFAULT_EDGE_CAPACITY);
            input_senders.insert(node_manifest.id.clone(), tx);
            inputs.insert(node_manifest.id.clone(), rx);
        }

        let mut outputs: HashMap<String, Vec<mpsc::Sender<EdgeMessage>>> =
            graph.nodes.keys().map(|id| (id.clone(), Vec::new())).collect();

        for conn in &manifest.connections {
            let sender = input_senders
                .get(&conn.to)
                .ok_or_else(|| Error::InvalidManifest(format!("unknown target node: {}", conn.to)))?
                .clone();
            outputs
                .get_mut(&conn.from)
                .ok_or_else(|| Error::InvalidManifest(format!("unknown source node: {}", conn.from)))?
                .push(sender);
        }

        let mut sink_taps = HashMap::new();
        for sink_id in &graph.sinks {
            let (tx, rx) = transport::in_process_edge(transport::DEFAULT_EDGE_CAPACITY);
            outputs.get_mut(sink_id).unwrap().push(tx);
            sink_taps.insert(sink_id.clone(), rx);
        }

        Ok(Self {
            graph,
            hosts,
            state_managers,
            inputs,
            input_senders,
            outputs,
            sink_taps,
            session_id,
            config,
        })
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Spawns every node's lifecycle task — an in-process task for a native
    /// node, a supervised worker process for an out-of-process one — and
    /// waits for all of them to report `READY`. If any fails to become
    /// ready within `config.worker_ready_timeout`, every already-spawned
    /// task is stopped and the startup failure is returned. Every native
    /// node's `StateManager` also gets its own periodic-sweep task here,
    /// tied to the same stop signal as the node's lifecycle task.
    pub async fn start(mut self) -> Result<RunningPipeline> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut join_handles = HashMap::new();
        let mut ready_rxs = Vec::with_capacity(self.graph.node_count());

        for node_id in self.graph.execution_order.clone() {
            let input = self.inputs.remove(&node_id).expect("every graph node has an input edge");
            let outputs = self.outputs.remove(&node_id).unwrap_or_default();
            let graph_node = self.graph.get_node(&node_id).expect("graph node exists");
            let params = graph_node.params.clone();
            let out_of_process = graph_node.out_of_process;
            let node_type = graph_node.node_type.clone();
            let (ready_tx, ready_rx) = oneshot::channel();
            let node_stop_rx = stop_rx.clone();

            if let Some(state_manager) = self.state_managers.remove(&node_id) {
                state_manager.spawn_sweep_task(stop_rx.clone());
            }

            let handle: JoinHandle<Result<NodeStats>> = if out_of_process {
                let session_id = self.session_id.clone();
                let worker_ready_timeout = self.config.worker_ready_timeout;
                let node_id_for_task = node_id.clone();
                tokio::spawn(async move {
                    run_out_of_process_node(
                        node_id_for_task,
                        node_type,
                        session_id,
                        params,
                        input,
                        outputs,
                        ready_tx,
                        node_stop_rx,
                        worker_ready_timeout,
                    )
                    .await
                })
            } else {
                let host = self.hosts.remove(&node_id).expect("native node has a host");
                tokio::spawn(async move { host.run(params, input, outputs, ready_tx, node_stop_rx).await })
            };

            join_handles.insert(node_id.clone(), handle);
            ready_rxs.push((node_id, ready_rx));
        }

        for (node_id, ready_rx) in ready_rxs {
            tokio::time::timeout(self.config.worker_ready_timeout, ready_rx)
                .await
                .map_err(|_| Error::WorkerStartupTimeout { node: node_id.clone() })?
                .map_err(|_| Error::WorkerStartupTimeout { node: node_id })?;
        }

        Ok(RunningPipeline {
            join_handles,
            stop_tx,
            input_senders: self.input_senders,
            sink_taps: self.sink_taps,
            stop_grace: self.config.stop_grace,
        })
    }
}

/// Spawns `node_id` as its own OS process (a re-invocation of the current
/// executable, identified to the child via env vars — see `crate::worker`)
/// and bridges its edges over IPC rings. Detects an unexpected child exit
/// and escalates it to `PipelineFailed`, mirroring the in-process critical-
/// error path in `NodeHost::run`.
#[cfg(feature = "multiprocess")]
async fn run_out_of_process_node(
    node_id: String,
    node_type: String,
    session_id: String,
    params: HashMap<String, serde_json::Value>,
    mut input: mpsc::Receiver<EdgeMessage>,
    outputs: Vec<mpsc::Sender<EdgeMessage>>,
    ready_tx: oneshot::Sender<()>,
    mut stop_rx: watch::Receiver<bool>,
    ready_timeout: Duration,
) -> Result<NodeStats> {
    let params_json = serde_json::to_string(&params).map_err(|e| Error::InvalidManifest(e.to_string()))?;

    let mut command = tokio::process::Command::new(
        std::env::current_exe().map_err(|e| Error::Execution(format!("failed to resolve current executable: {e}")))?,
    );
    command
        .env(crate::worker::NODE_TYPE_ENV, &node_type)
        .env(crate::worker::NODE_ID_ENV, &node_id)
        .env(crate::worker::SESSION_ID_ENV, &session_id)
        .env(crate::worker::PARAMS_ENV, &params_json)
        .kill_on_drop(true);
    let mut child = command.spawn().map_err(|e| Error::InitializationFailed {
        node: node_id.clone(),
        cause: format!("failed to spawn worker process: {e}"),
    })?;

    let (host_in_tx, mut host_out_rx) = match transport::ipc::host_attach(&session_id, &node_id, ready_timeout).await {
        Ok(pair) => pair,
        Err(e) => {
            let _ = child.kill().await;
            return Err(e);
        }
    };

    let _ = ready_tx.send(());
    let mut stats = NodeStats::default();
    let mut input_closed = false;

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_ok() && *stop_rx.borrow() {
                    let _ = child.kill().await;
                    return Ok(stats);
                }
            }
            exit = child.wait() => {
                let cause = match exit {
                    Ok(status) if status.success() => "worker process exited before the pipeline stopped".to_string(),
                    Ok(status) => format!("worker process exited with {status}"),
                    Err(e) => format!("failed to wait on worker process: {e}"),
                };
                let lost = Error::WorkerLost { node: node_id.clone(), cause };
                tracing::error!(node = %node_id, error = %lost, "worker process exited unexpectedly");
                return Err(Error::PipelineFailed {
                    failing_node: node_id.clone(),
                    cause: lost.to_string(),
                });
            }
            maybe_item = input.recv(), if !input_closed => {
                match maybe_item {
                    Some(msg) => {
                        if host_in_tx.send(msg).await.is_err() {
                            let _ = child.kill().await;
                            return Err(Error::PipelineFailed {
                                failing_node: node_id.clone(),
                                cause: Error::WorkerLost {
                                    node: node_id.clone(),
                                    cause: "worker input bridge closed unexpectedly".to_string(),
                                }.to_string(),
                            });
                        }
                    }
                    None => {
                        input_closed = true;
                        let _ = host_in_tx.send(EdgeMessage::Sentinel).await;
                    }
                }
            }
            maybe_out = host_out_rx.recv() => {
                match maybe_out {
                    Some(EdgeMessage::Sentinel) => {
                        for out in &outputs {
                            let _ = out.send(EdgeMessage::Sentinel).await;
                        }
                        let _ = child.wait().await;
                        return Ok(stats);
                    }
                    Some(msg @ EdgeMessage::Data(_)) => {
                        stats.messages_processed += 1;
                        for out in &outputs {
                            let _ = out.send(msg.clone()).await;
                        }
                    }
                    None => {
                        let _ = child.kill().await;
                        return Err(Error::PipelineFailed {
                            failing_node: node_id.clone(),
                            cause: Error::WorkerLost {
                                node: node_id.clone(),
                                cause: "worker output bridge closed unexpectedly".to_string(),
                            }.to_string(),
                        });
                    }
                }
            }
        }
    }
}

#[cfg(not(feature = "multiprocess"))]
async fn run_out_of_process_node(
    node_id: String,
    _node_type: String,
    _session_id: String,
    _params: HashMap<String, serde_json::Value>,
    _input: mpsc::Receiver<EdgeMessage>,
    _outputs: Vec<mpsc::Sender<EdgeMessage>>,
    _ready_tx: oneshot::Sender<()>,
    _stop_rx: watch::Receiver<bool>,
    _ready_timeout: Duration,
) -> Result<NodeStats> {
    // Unreachable in practice: `Pipeline::build` rejects out-of-process
    // nodes before a pipeline without this feature ever reaches `start()`.
    Err(Error::InvalidManifest(format!(
        "node '{node_id}' requires the multiprocess feature, which is disabled"
    )))
}

/// A pipeline whose node tasks are all running. Feed external sources via
/// [`RunningPipeline::sender`], read sink output via
/// [`RunningPipeline::take_sink`], and collect the terminal result with
/// [`RunningPipeline::join`].
pub struct RunningPipeline {
    join_handles: HashMap<String, JoinHandle<Result<NodeStats>>>,
    stop_tx: watch::Sender<bool>,
    input_senders: HashMap<String, mpsc::Sender<EdgeMessage>>,
    sink_taps: HashMap<String, mpsc::Receiver<EdgeMessage>>,
    stop_grace: Duration,
}

impl RunningPipeline {
    /// The sender feeding `node_id`'s input edge. Useful for pushing
    /// externally-produced data (or control messages) into any node,
    /// including ones whose own `generate()` is not externally driven.
    pub fn sender(&self, node_id: &str) -> Option<mpsc::Sender<EdgeMessage>> {
        self.input_senders.get(node_id).cloned()
    }

    /// Takes ownership of a sink's output tap. Can only be taken once per
    /// sink; a second call returns `None`.
    pub fn take_sink(&mut self, node_id: &str) -> Option<mpsc::Receiver<EdgeMessage>> {
        self.sink_taps.remove(node_id)
    }

    /// Requests a clean stop: every node observes the signal at its next
    /// select iteration and tears itself down via `cleanup()`, cascading a
    /// sentinel to its downstream edges.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Waits for every node task to finish (naturally, via sentinel
    /// cascade, or because `request_stop` was called) and assembles the
    /// terminal status. Tasks are awaited concurrently, not in sequence: a
    /// node blocked on an upstream that already failed must not delay
    /// noticing the failure and calling `request_stop` on the rest of the
    /// pipeline. If a node's task ends in `PipelineFailed` (or any other
    /// `Error`), every remaining task is asked to stop and the failure is
    /// reported as the terminal cause.
    pub async fn join(mut self) -> Result<TerminalStatus> {
        use futures::stream::{FuturesUnordered, StreamExt};

        let mut per_node_stats = HashMap::new();
        let mut failure: Option<(String, String)> = None;

        let mut pending: FuturesUnordered<_> = self
            .join_handles
            .drain()
            .map(|(node_id, handle)| async move { (node_id, handle.await) })
            .collect();

        while let Some((node_id, outcome)) = pending.next().await {
            match outcome {
                Ok(Ok(stats)) => {
                    per_node_stats.insert(node_id, stats);
                }
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some((node_id.clone(), e.to_string()));
                        self.request_stop();
                    }
                    per_node_stats.insert(node_id, NodeStats::default());
                }
                Err(join_err) => {
                    if failure.is_none() {
                        failure = Some((node_id.clone(), format!("node task panicked: {join_err}")));
                        self.request_stop();
                    }
                    per_node_stats.insert(node_id, NodeStats::default());
                }
            }
        }

        match failure {
            Some((failing_node, cause)) => Ok(TerminalStatus {
                status: PipelineStatus::PipelineFailed,
                cause: Some(format!("{failing_node}: {cause}")),
                per_node_stats,
            }),
            None => Ok(TerminalStatus {
                status: PipelineStatus::Success,
                cause: None,
                per_node_stats,
            }),
        }
    }

    /// Stops the pipeline and waits up to `stop_grace` for it to drain
    /// before giving up and reporting `Interrupted`.
    pub async fn stop_and_join(self) -> Result<TerminalStatus> {
        self.request_stop();
        let grace = self.stop_grace;
        match tokio::time::timeout(grace, self.join()).await {
            Ok(result) => result,
            Err(_) => Ok(TerminalStatus {
                status: PipelineStatus::Interrupted,
                cause: Some("pipeline did not drain within the stop grace period".to_string()),
                per_node_stats: HashMap::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn manifest_json() -> &'static str {
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
    fn topological_sort_orders_linear_chain() {
        let manifest = Manifest::parse(manifest_json()).unwrap();
        let graph = PipelineGraph::from_manifest(&manifest).unwrap();
        assert_eq!(graph.execution_order, vec!["src", "mid", "sink"]);
        assert_eq!(graph.sources, vec!["src".to_string()]);
        assert_eq!(graph.sinks, vec!["sink".to_string()]);
    }

    #[test]
    fn topological_sort_rejects_a_cycle() {
        let mut nodes = HashMap::new();
        nodes.insert(
            "a".to_string(),
            GraphNode {
                id: "a".to_string(),
                node_type: "A".to_string(),
                params: HashMap::new(),
                inputs: vec!["b".to_string()],
                outputs: vec!["b".to_string()],
                out_of_process: false,
            },
        );
        nodes.insert(
            "b".to_string(),
            GraphNode {
                id: "b".to_string(),
                node_type: "B".to_string(),
                params: HashMap::new(),
                inputs: vec!["a".to_string()],
                outputs: vec!["a".to_string()],
                out_of_process: false,
            },
        );
        let err = PipelineGraph::topological_sort(&nodes).unwrap_err();
        assert!(matches!(err, Error::InvalidManifest(_)));
    }

    #[test]
    fn fan_out_and_fan_in_both_appear_in_the_graph() {
        let json = r#"{
            "version": "v1",
            "metadata": { "name": "fanout" },
            "nodes": [
                { "id": "src", "node_type": "Source", "params": {} },
                { "id": "a", "node_type": "A", "params": {} },
                { "id": "b", "node_type": "B", "params": {} },
                { "id": "join", "node_type": "Join", "params": {} }
            ],
            "connections": [
                { "from": "src", "to": "a" },
                { "from": "src", "to": "b" },
                { "from": "a", "to": "join" },
                { "from": "b", "to": "join" }
            ]
        }"#;
        let manifest = Manifest::parse(json).unwrap();
        let graph = PipelineGraph::from_manifest(&manifest).unwrap();
        assert_eq!(graph.get_node("src").unwrap().outputs.len(), 2);
        assert_eq!(graph.get_node("join").unwrap().inputs.len(), 2);
        assert_eq!(graph.execution_order.len(), 4);
    }

    struct NoOpNode;

    #[async_trait::async_trait]
    impl crate::node::Node for NoOpNode {
        fn info(&self) -> crate::node::NodeInfo {
            crate::node::NodeInfo::default()
        }

        async fn initialize(&mut self, _params: &HashMap<String, serde_json::Value>) -> Result<()> {
            Ok(())
        }

        async fn process(
            &mut self,
            _ctx: &crate::node::NodeContext<'_>,
            item: crate::data::RuntimeData,
        ) -> Result<crate::node::ProcessOutput> {
            Ok(crate::node::ProcessOutput::One(item))
        }
    }

    #[cfg(feature = "multiprocess")]
    #[test]
    fn build_skips_host_and_state_manager_for_out_of_process_nodes() {
        let json = r#"{
            "version": "v1",
            "metadata": { "name": "mixed" },
            "nodes": [
                { "id": "src", "node_type": "NoOp", "params": {} },
                { "id": "mid", "node_type": "NoOp", "params": {}, "execution_mode": "out_of_process" },
                { "id": "sink", "node_type": "NoOp", "params": {} }
            ],
            "connections": [
                { "from": "src", "to": "mid" },
                { "from": "mid", "to": "sink" }
            ]
        }"#;
        let manifest = Manifest::parse(json).unwrap();
        let registry = NodeRegistry::new();
        registry.register("NoOp", || Box::new(NoOpNode));

        let pipeline = Pipeline::build(
            &manifest,
            &registry,
            StateManagerConfig::default(),
            SchedulerConfig::default(),
        )
        .unwrap();

        assert!(pipeline.hosts.contains_key("src"));
        assert!(!pipeline.hosts.contains_key("mid"));
        assert!(pipeline.hosts.contains_key("sink"));
        assert!(!pipeline.state_managers.contains_key("mid"));
        assert!(pipeline.state_managers.contains_key("src"));
        // every node, native or not, still gets a wired input edge
        assert!(pipeline.inputs.contains_key("mid"));
    }
}
