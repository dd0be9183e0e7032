//! Shared-memory transport backed by iceoryx2, used when the scheduler plans
//! a node onto its own OS process. Bridges an IPC publish/subscribe ring to
//! the same `EdgeMessage` channel the in-process forwarder uses, so
//! `NodeHost` never needs to know which transport kind it's wired to.

use super::{decode_edge_message, encode_edge_message, ServiceNames};
use crate::error::{Error, Result};
use crate::node::host::EdgeMessage;
use iceoryx2::prelude::*;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

/// Initial publisher slot size (1 KiB), grown with a power-of-two strategy on
/// demand to fit larger payloads (e.g. audio chunks).
const INITIAL_SLICE_LEN: usize = 1024;
/// Subscriber history depth per edge ring.
const RING_HISTORY: usize = 100;

static IPC_NODE: OnceLock<Node<ipc::Service>> = OnceLock::new();

fn ipc_node() -> Result<&'static Node<ipc::Service>> {
    Ok(IPC_NODE.get_or_init(|| {
        NodeBuilder::new()
            .create::<ipc::Service>()
            .expect("failed to create iceoryx2 node")
    }))
}

fn open_ring(service_name: &str) -> Result<iceoryx2::service::port_factory::publish_subscribe::PortFactory<ipc::Service, [u8], ()>> {
    let node = ipc_node()?;
    let name = ServiceName::new(service_name).map_err(|e| Error::Execution(format!("invalid service name: {e:?}")))?;
    node.service_builder(&name)
        .publish_subscribe::<[u8]>()
        .max_publishers(1)
        .max_subscribers(1)
        .history_size(RING_HISTORY)
        .subscriber_max_buffer_size(RING_HISTORY)
        .open_or_create()
        .map_err(|e| Error::Execution(format!("failed to open service '{service_name}': {e:?}")))
}

/// Host side of one edge: creates both rings and blocks until the worker's
/// `READY` byte is observed before returning. The host must never publish
/// before that point — pub/sub on shared memory drops samples published
/// before a subscriber attaches.
pub async fn host_attach(
    session_id: &str,
    node_id: &str,
    ready_timeout: Duration,
) -> Result<(mpsc::Sender<EdgeMessage>, mpsc::Receiver<EdgeMessage>)> {
    let names = ServiceNames::for_node(session_id, node_id);

    let input_service = open_ring(&names.input)?;
    let output_service = open_ring(&names.output)?;
    let control_service = open_ring(&names.control)?;

    let input_publisher = input_service
        .publisher_builder()
        .initial_max_slice_len(INITIAL_SLICE_LEN)
        .allocation_strategy(AllocationStrategy::PowerOfTwo)
        .create()
        .map_err(|e| Error::Execution(format!("failed to create input publisher: {e:?}")))?;
    let output_subscriber = output_service
        .subscriber_builder()
        .buffer_size(RING_HISTORY)
        .create()
        .map_err(|e| Error::Execution(format!("failed to create output subscriber: {e:?}")))?;
    let control_subscriber = control_service
        .subscriber_builder()
        .buffer_size(1)
        .create()
        .map_err(|e| Error::Execution(format!("failed to create control subscriber: {e:?}")))?;

    timeout(ready_timeout, async {
        loop {
            match control_subscriber.receive() {
                Ok(Some(_sample)) => return Ok(()),
                Ok(None) => sleep(Duration::from_millis(5)).await,
                Err(e) => return Err(Error::Execution(format!("control ring error: {e:?}"))),
            }
        }
    })
    .await
    .map_err(|_| Error::WorkerStartupTimeout { node: node_id.to_string() })??;

    let (host_out_tx, host_out_rx) = mpsc::channel::<EdgeMessage>(super::DEFAULT_EDGE_CAPACITY);
    let (host_in_tx, mut host_in_rx) = mpsc::channel::<EdgeMessage>(super::DEFAULT_EDGE_CAPACITY);

    // bridges host -> worker: pull from host_in_rx, publish onto the input ring
    tokio::task::spawn_blocking(move || {
        while let Some(msg) = host_in_rx.blocking_recv() {
            let bytes = match encode_edge_message(&msg) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode outbound edge message");
                    continue;
                }
            };
            if let Err(e) = publish(&input_publisher, &bytes) {
                tracing::warn!(error = %e, "failed to publish to input ring, worker likely gone");
                break;
            }
        }
    });

    // bridges worker -> host: poll the output ring, push into host_out_tx
    tokio::spawn(async move {
        loop {
            match output_subscriber.receive() {
                Ok(Some(sample)) => {
                    match decode_edge_message(sample.payload()) {
                        Ok(msg) => {
                            if host_out_tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to decode inbound edge message"),
                    }
                }
                Ok(None) => sleep(Duration::from_millis(1)).await,
                Err(_) => break,
            }
        }
    });

    Ok((host_in_tx, host_out_rx))
}

/// Worker side: attach publisher/subscriber to both rings, then signal
/// `READY` on the control ring. Must complete both attachments before
/// sending `READY`, or the host could start publishing into a ring with no
/// subscriber yet.
pub async fn worker_attach(
    session_id: &str,
    node_id: &str,
) -> Result<(mpsc::Sender<EdgeMessage>, mpsc::Receiver<EdgeMessage>)> {
    let names = ServiceNames::for_node(session_id, node_id);

    let input_service = open_ring(&names.input)?;
    let output_service = open_ring(&names.output)?;
    let control_service = open_ring(&names.control)?;

    let input_subscriber = input_service
        .subscriber_builder()
        .buffer_size(RING_HISTORY)
        .create()
        .map_err(|e| Error::Execution(format!("failed to create input subscriber: {e:?}")))?;
    let output_publisher = output_service
        .publisher_builder()
        .initial_max_slice_len(INITIAL_SLICE_LEN)
        .allocation_strategy(AllocationStrategy::PowerOfTwo)
        .create()
        .map_err(|e| Error::Execution(format!("failed to create output publisher: {e:?}")))?;
    let control_publisher = control_service
        .publisher_builder()
        .create()
        .map_err(|e| Error::Execution(format!("failed to create control publisher: {e:?}")))?;

    publish(&control_publisher, b"READY")?;

    let (worker_out_tx, worker_out_rx) = mpsc::channel::<EdgeMessage>(super::DEFAULT_EDGE_CAPACITY);
    let (worker_in_tx, mut worker_in_rx) = mpsc::channel::<EdgeMessage>(super::DEFAULT_EDGE_CAPACITY);

    tokio::task::spawn_blocking(move || {
        while let Some(msg) = worker_in_rx.blocking_recv() {
            let bytes = match encode_edge_message(&msg) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode outbound edge message");
                    continue;
                }
            };
            if publish(&output_publisher, &bytes).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match input_subscriber.receive() {
                Ok(Some(sample)) => match decode_edge_message(sample.payload()) {
                    Ok(msg) => {
                        if worker_out_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to decode inbound edge message"),
                },
                Ok(None) => sleep(Duration::from_millis(1)).await,
                Err(_) => break,
            }
        }
    });

    Ok((worker_in_tx, worker_out_rx))
}

fn publish(
    publisher: &iceoryx2::port::publisher::Publisher<ipc::Service, [u8], ()>,
    bytes: &[u8],
) -> Result<()> {
    let sample = publisher
        .loan_slice_uninit(bytes.len())
        .map_err(|e| Error::Execution(format!("failed to loan IPC slot: {e:?}")))?;
    let sample = sample.write_from_slice(bytes);
    sample.send().map_err(|e| Error::Execution(format!("failed to send IPC sample: {e:?}")))?;
    Ok(())
}
