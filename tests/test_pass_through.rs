//! S1 — Pass-through correctness: `source → PassThrough → sink`.

#[path = "support/mod.rs"]
mod support;

use remotemedia_runtime_core::error::PipelineStatus;
use remotemedia_runtime_core::manifest::Manifest;
use remotemedia_runtime_core::node::registry::NodeRegistry;
use remotemedia_runtime_core::scheduler::{Pipeline, SchedulerConfig};
use remotemedia_runtime_core::state::StateManagerConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{FixedSource, PassThrough, RecordingSink};

fn manifest() -> &'static str {
    r#"{
        "version": "v1",
        "metadata": { "name": "pass-through" },
        "nodes": [
            { "id": "source", "node_type": "Source", "params": {} },
            { "id": "pass", "node_type": "PassThrough", "params": {} },
            { "id": "sink", "node_type": "Sink", "params": {} }
        ],
        "connections": [
            { "from": "source", "to": "pass" },
            { "from": "pass", "to": "sink" }
        ]
    }"#
}

#[tokio::test]
async fn sink_observes_items_in_order_with_clean_stats() {
    let items = Arc::new(Mutex::new(Vec::new()));
    let cleaned_up = Arc::new(Mutex::new(false));
    let items_for_factory = Arc::clone(&items);
    let cleaned_up_for_factory = Arc::clone(&cleaned_up);

    let registry = NodeRegistry::new();
    registry.register("Source", || Box::new(FixedSource::new(vec!["1", "2", "3", "4", "5"], Duration::ZERO)));
    registry.register("PassThrough", || Box::new(PassThrough));
    registry.register("Sink", move || {
        Box::new(RecordingSink::new(Arc::clone(&items_for_factory), Arc::clone(&cleaned_up_for_factory)))
    });

    let manifest = Manifest::parse(manifest()).unwrap();
    let pipeline = Pipeline::build(&manifest, &registry, StateManagerConfig::default(), SchedulerConfig::default()).unwrap();
    let running = pipeline.start().await.unwrap();

    let status = running.join().await.unwrap();
    assert_eq!(status.status, PipelineStatus::Success);

    let observed: Vec<String> = items
        .lock()
        .unwrap()
        .iter()
        .map(|item| item.as_text().unwrap().to_string())
        .collect();
    assert_eq!(observed, vec!["1", "2", "3", "4", "5"]);
    assert!(*cleaned_up.lock().unwrap());

    for node_id in ["source", "pass", "sink"] {
        let stats = &status.per_node_stats[node_id];
        assert_eq!(stats.messages_processed, 5, "{node_id} should have processed 5 items");
        assert_eq!(stats.messages_failed, 0, "{node_id} should have no failures");
    }
}
