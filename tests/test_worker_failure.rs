//! S6 — Worker failure mid-stream: `source → FlakyWorker → sink`.
//! `FlakyWorker` fails with `Error::WorkerLost` (a critical variant) partway
//! through the stream, simulating an out-of-process worker vanishing. The
//! pipeline must report `PipelineFailed` naming the failing node, and every
//! other node — including the sink, which never sees a sentinel from the
//! failed node directly — must still observe the stop signal and run its own
//! `cleanup()`.

#[path = "support/mod.rs"]
mod support;

use remotemedia_runtime_core::error::PipelineStatus;
use remotemedia_runtime_core::manifest::Manifest;
use remotemedia_runtime_core::node::registry::NodeRegistry;
use remotemedia_runtime_core::scheduler::{Pipeline, SchedulerConfig};
use remotemedia_runtime_core::state::StateManagerConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{FixedSource, FlakyWorker, RecordingSink};

fn manifest() -> &'static str {
    r#"{
        "version": "v1",
        "metadata": { "name": "worker-failure" },
        "nodes": [
            { "id": "source", "node_type": "Source", "params": {} },
            { "id": "flaky", "node_type": "Flaky", "params": {} },
            { "id": "sink", "node_type": "Sink", "params": {} }
        ],
        "connections": [
            { "from": "source", "to": "flaky" },
            { "from": "flaky", "to": "sink" }
        ]
    }"#
}

#[tokio::test]
async fn failing_worker_fails_the_pipeline_and_still_cleans_up_the_sink() {
    let items = Arc::new(Mutex::new(Vec::new()));
    let cleaned_up = Arc::new(Mutex::new(false));
    let items_for_factory = Arc::clone(&items);
    let cleaned_up_for_factory = Arc::clone(&cleaned_up);

    let registry = NodeRegistry::new();
    registry.register("Source", || Box::new(FixedSource::new(vec!["1", "2", "3", "4", "5"], Duration::ZERO)));
    registry.register("Flaky", || Box::new(FlakyWorker::new(2)));
    registry.register("Sink", move || {
        Box::new(RecordingSink::new(Arc::clone(&items_for_factory), Arc::clone(&cleaned_up_for_factory)))
    });

    let manifest = Manifest::parse(manifest()).unwrap();
    let pipeline = Pipeline::build(&manifest, &registry, StateManagerConfig::default(), SchedulerConfig::default()).unwrap();
    let running = pipeline.start().await.unwrap();
    let status = running.join().await.unwrap();

    assert_eq!(status.status, PipelineStatus::PipelineFailed);
    let cause = status.cause.expect("a failure cause must be reported");
    assert!(cause.contains("flaky"), "cause should name the failing node, got: {cause}");

    assert!(*cleaned_up.lock().unwrap(), "sink must still run cleanup() once the global stop signal fires");
}
