//! Deterministic mock nodes shared across the scenario tests in this
//! directory: a fixed-sequence source, a few simple transforms, and a sink
//! that just records what it saw.

#![allow(dead_code)]

use async_trait::async_trait;
use remotemedia_runtime_core::data::RuntimeData;
use remotemedia_runtime_core::error::{Error, Result};
use remotemedia_runtime_core::{Node, NodeContext, NodeInfo, ProcessOutput};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Emits a fixed sequence of text items, optionally pacing them with a delay
/// between each, then signals `SourceExhausted`.
pub struct FixedSource {
    items: std::vec::IntoIter<String>,
    delay: Duration,
    timestamp: u64,
}

impl FixedSource {
    pub fn new(items: Vec<&str>, delay: Duration) -> Self {
        Self {
            items: items.into_iter().map(str::to_string).collect::<Vec<_>>().into_iter(),
            delay,
            timestamp: 0,
        }
    }
}

#[async_trait]
impl Node for FixedSource {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "fixed_source".to_string(),
            is_source: true,
            ..Default::default()
        }
    }

    async fn initialize(&mut self, _params: &HashMap<String, serde_json::Value>) -> Result<()> {
        Ok(())
    }

    async fn process(&mut self, _ctx: &NodeContext<'_>, _item: RuntimeData) -> Result<ProcessOutput> {
        Ok(ProcessOutput::None)
    }

    async fn generate(&mut self, _ctx: &NodeContext<'_>) -> Result<ProcessOutput> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.items.next() {
            Some(text) => {
                self.timestamp += 1;
                Ok(ProcessOutput::One(RuntimeData::text("scenario", self.timestamp, text)))
            }
            None => Err(Error::SourceExhausted),
        }
    }
}

/// Forwards every item unchanged.
pub struct PassThrough;

#[async_trait]
impl Node for PassThrough {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "pass_through".to_string(),
            ..Default::default()
        }
    }

    async fn initialize(&mut self, _params: &HashMap<String, serde_json::Value>) -> Result<()> {
        Ok(())
    }

    async fn process(&mut self, _ctx: &NodeContext<'_>, item: RuntimeData) -> Result<ProcessOutput> {
        Ok(ProcessOutput::One(item))
    }
}

/// Parses the incoming text as an `f64` and multiplies it by `factor`
/// (read from manifest params at `initialize()` time), re-emitting the
/// product as text.
pub struct Multiply {
    factor: f64,
}

impl Multiply {
    pub fn new() -> Self {
        Self { factor: 1.0 }
    }
}

#[async_trait]
impl Node for Multiply {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "multiply".to_string(),
            ..Default::default()
        }
    }

    async fn initialize(&mut self, params: &HashMap<String, serde_json::Value>) -> Result<()> {
        if let Some(factor) = params.get("factor").and_then(|v| v.as_f64()) {
            self.factor = factor;
        }
        Ok(())
    }

    async fn process(&mut self, _ctx: &NodeContext<'_>, item: RuntimeData) -> Result<ProcessOutput> {
        let text = item.as_text().ok_or_else(|| Error::InvalidData("Multiply expects text payload".to_string()))?;
        let value: f64 = text
            .parse()
            .map_err(|_| Error::InvalidData(format!("not a number: {text}")))?;
        let product = value * self.factor;
        Ok(ProcessOutput::One(RuntimeData::text(
            item.session_id.clone(),
            item.timestamp,
            format!("{product}"),
        )))
    }
}

/// `initialize()` sleeps for `init_ms` (from params) before returning, to
/// exercise queue-during-init.
pub struct SlowInit {
    init_ms: u64,
    pub process_timestamps: Arc<Mutex<Vec<std::time::Instant>>>,
}

impl SlowInit {
    pub fn new(process_timestamps: Arc<Mutex<Vec<std::time::Instant>>>) -> Self {
        Self { init_ms: 0, process_timestamps }
    }
}

#[async_trait]
impl Node for SlowInit {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "slow_init".to_string(),
            ..Default::default()
        }
    }

    async fn initialize(&mut self, params: &HashMap<String, serde_json::Value>) -> Result<()> {
        if let Some(ms) = params.get("init_ms").and_then(|v| v.as_u64()) {
            self.init_ms = ms;
        }
        tokio::time::sleep(Duration::from_millis(self.init_ms)).await;
        Ok(())
    }

    async fn process(&mut self, _ctx: &NodeContext<'_>, item: RuntimeData) -> Result<ProcessOutput> {
        self.process_timestamps.lock().unwrap().push(std::time::Instant::now());
        Ok(ProcessOutput::One(item))
    }
}

/// Records every item it sees, in arrival order, plus a cleanup flag.
pub struct RecordingSink {
    pub items: Arc<Mutex<Vec<RuntimeData>>>,
    pub cleaned_up: Arc<Mutex<bool>>,
}

impl RecordingSink {
    pub fn new(items: Arc<Mutex<Vec<RuntimeData>>>, cleaned_up: Arc<Mutex<bool>>) -> Self {
        Self { items, cleaned_up }
    }
}

#[async_trait]
impl Node for RecordingSink {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "recording_sink".to_string(),
            is_sink: true,
            ..Default::default()
        }
    }

    async fn initialize(&mut self, _params: &HashMap<String, serde_json::Value>) -> Result<()> {
        Ok(())
    }

    async fn process(&mut self, _ctx: &NodeContext<'_>, item: RuntimeData) -> Result<ProcessOutput> {
        self.items.lock().unwrap().push(item);
        Ok(ProcessOutput::None)
    }

    async fn cleanup(&mut self) -> Result<()> {
        *self.cleaned_up.lock().unwrap() = true;
        Ok(())
    }
}

/// Fails every `process()` call after the first `fail_after` items with a
/// `WorkerLost` error, simulating an out-of-process worker vanishing.
/// A real worker failure is only observable through the IPC bridge under the
/// `multiprocess` feature; this stands in for the scheduler-side half of
/// that contract (escalation to `PipelineFailed`, sentinel cascade to sinks).
pub struct FlakyWorker {
    fail_after: u64,
    seen: u64,
}

impl FlakyWorker {
    pub fn new(fail_after: u64) -> Self {
        Self { fail_after, seen: 0 }
    }
}

#[async_trait]
impl Node for FlakyWorker {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "flaky_worker".to_string(),
            ..Default::default()
        }
    }

    async fn initialize(&mut self, _params: &HashMap<String, serde_json::Value>) -> Result<()> {
        Ok(())
    }

    async fn process(&mut self, _ctx: &NodeContext<'_>, item: RuntimeData) -> Result<ProcessOutput> {
        self.seen += 1;
        if self.seen > self.fail_after {
            return Err(Error::WorkerLost {
                node: "flaky_worker".to_string(),
                cause: "simulated worker process exit".to_string(),
            });
        }
        Ok(ProcessOutput::One(item))
    }
}
