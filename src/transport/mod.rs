//! Delivers framed `RuntimeData` between node hosts: bounded in-process
//! queues when both ends share a process, shared-memory rings via iceoryx2
//! when they don't.

#[cfg(feature = "multiprocess")]
pub mod ipc;

use crate::data::RuntimeData;
use crate::node::host::EdgeMessage;
use crate::error::Result;
use tokio::sync::mpsc;

/// Default bounded capacity for an in-process edge queue.
pub const DEFAULT_EDGE_CAPACITY: usize = 100;

/// Builds the in-process channel pair for one edge. The sender side may be
/// cloned to fan multiple upstream producers into one downstream consumer;
/// fan-out to multiple downstreams is handled by giving a host several
/// senders, one per outgoing edge, not by cloning the receiver.
pub fn in_process_edge(capacity: usize) -> (mpsc::Sender<EdgeMessage>, mpsc::Receiver<EdgeMessage>) {
    mpsc::channel(capacity)
}

/// Service names for an IPC-backed edge, per the naming convention
/// `{session_id}_{node_id}_input` / `{session_id}_{node_id}_output`, plus the
/// dedicated control ring used for the startup `READY` handshake.
pub struct ServiceNames {
    pub input: String,
    pub output: String,
    pub control: String,
}

impl ServiceNames {
    pub fn for_node(session_id: &str, node_id: &str) -> Self {
        Self {
            input: format!("{session_id}_{node_id}_input"),
            output: format!("{session_id}_{node_id}_output"),
            control: format!("control/{session_id}_{node_id}"),
        }
    }
}

/// Encodes one `EdgeMessage` as bytes suitable for an IPC ring slot. The
/// sentinel is encoded as a zero-length payload; `RuntimeData::to_bytes`
/// always produces at least 15 bytes (the fixed framing prefix), so the two
/// can never collide.
pub fn encode_edge_message(msg: &EdgeMessage) -> Result<Vec<u8>> {
    match msg {
        EdgeMessage::Sentinel => Ok(Vec::new()),
        EdgeMessage::Data(item) => item.to_bytes(),
    }
}

pub fn decode_edge_message(bytes: &[u8]) -> Result<EdgeMessage> {
    if bytes.is_empty() {
        Ok(EdgeMessage::Sentinel)
    } else {
        Ok(EdgeMessage::Data(RuntimeData::from_bytes(bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RuntimeData;

    #[test]
    fn sentinel_roundtrips_as_empty_payload() {
        let encoded = encode_edge_message(&EdgeMessage::Sentinel).unwrap();
        assert!(encoded.is_empty());
        assert!(matches!(decode_edge_message(&encoded).unwrap(), EdgeMessage::Sentinel));
    }

    #[test]
    fn data_roundtrips_through_encode_decode() {
        let item = RuntimeData::text("session-1", 1_000, "hello");
        let encoded = encode_edge_message(&EdgeMessage::Data(item.clone())).unwrap();
        assert!(!encoded.is_empty());
        match decode_edge_message(&encoded).unwrap() {
            EdgeMessage::Data(decoded) => assert_eq!(decoded, item),
            EdgeMessage::Sentinel => panic!("expected data"),
        }
    }

    #[test]
    fn service_names_follow_the_documented_convention() {
        let names = ServiceNames::for_node("sess1", "asr");
        assert_eq!(names.input, "sess1_asr_input");
        assert_eq!(names.output, "sess1_asr_output");
        assert_eq!(names.control, "control/sess1_asr");
    }
}
