//! Control message payload carried inside a `RuntimeData::ControlMessage` envelope.
//!
//! The envelope (session_id, timestamp) lives on the surrounding `RuntimeData`;
//! this struct is exactly the closed JSON schema in the control-message wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Standardized message for pipeline control flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlMessage {
    /// Type of control message and its type-specific fields.
    pub message_type: ControlMessageType,

    /// Optional target segment ID (for cancellation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<Uuid>,

    /// Extensible metadata (JSON-compatible).
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub metadata: JsonValue,
}

/// Type of control message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ControlMessageType {
    /// Cancel a speculative segment.
    CancelSpeculation {
        from_timestamp: u64,
        to_timestamp: u64,
    },

    /// Hint to batch more aggressively.
    BatchHint { suggested_batch_size: usize },

    /// Soft deadline approaching.
    DeadlineWarning {
        /// Microseconds from now.
        deadline_us: u64,
    },

    /// Drain internal buffers and emit whatever `flush()` returns, without
    /// terminating the node.
    FlushBuffer,
}

impl ControlMessage {
    pub fn cancel_speculation(
        from_timestamp: u64,
        to_timestamp: u64,
        segment_id: Option<Uuid>,
    ) -> Self {
        Self {
            message_type: ControlMessageType::CancelSpeculation {
                from_timestamp,
                to_timestamp,
            },
            segment_id,
            metadata: JsonValue::Null,
        }
    }

    pub fn batch_hint(suggested_batch_size: usize) -> Self {
        Self {
            message_type: ControlMessageType::BatchHint {
                suggested_batch_size,
            },
            segment_id: None,
            metadata: JsonValue::Null,
        }
    }

    pub fn deadline_warning(deadline_us: u64) -> Self {
        Self {
            message_type: ControlMessageType::DeadlineWarning { deadline_us },
            segment_id: None,
            metadata: JsonValue::Null,
        }
    }

    pub fn flush_buffer() -> Self {
        Self {
            message_type: ControlMessageType::FlushBuffer,
            segment_id: None,
            metadata: JsonValue::Null,
        }
    }

    /// Validate type-specific field constraints. Does not know about staleness —
    /// that's judged against the enclosing envelope's `timestamp`, not here.
    pub fn validate(&self) -> Result<(), String> {
        match &self.message_type {
            ControlMessageType::CancelSpeculation {
                from_timestamp,
                to_timestamp,
            } => {
                if from_timestamp >= to_timestamp {
                    return Err(format!(
                        "CancelSpeculation: from_timestamp ({}) >= to_timestamp ({})",
                        from_timestamp, to_timestamp
                    ));
                }
            }
            ControlMessageType::BatchHint {
                suggested_batch_size,
            } => {
                if *suggested_batch_size == 0 {
                    return Err("BatchHint: suggested_batch_size must be > 0".to_string());
                }
                if *suggested_batch_size > 100 {
                    return Err(format!(
                        "BatchHint: suggested_batch_size ({}) is unusually large (>100)",
                        suggested_batch_size
                    ));
                }
            }
            ControlMessageType::DeadlineWarning { deadline_us } => {
                if *deadline_us == 0 {
                    return Err("DeadlineWarning: deadline_us must be > 0".to_string());
                }
            }
            ControlMessageType::FlushBuffer => {}
        }
        Ok(())
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.message_type, ControlMessageType::CancelSpeculation { .. })
    }

    pub fn is_batch_hint(&self) -> bool {
        matches!(self.message_type, ControlMessageType::BatchHint { .. })
    }

    pub fn is_deadline_warning(&self) -> bool {
        matches!(self.message_type, ControlMessageType::DeadlineWarning { .. })
    }

    pub fn is_flush_buffer(&self) -> bool {
        matches!(self.message_type, ControlMessageType::FlushBuffer)
    }

    /// Does the cancellation window cover `timestamp`, or does `segment_id` match?
    pub fn cancels(&self, segment_id: Option<Uuid>, timestamp: u64) -> bool {
        match &self.message_type {
            ControlMessageType::CancelSpeculation {
                from_timestamp,
                to_timestamp,
            } => {
                (self.segment_id.is_some() && self.segment_id == segment_id)
                    || (*from_timestamp..=*to_timestamp).contains(&timestamp)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_speculation_carries_segment_id_and_window() {
        let segment_id = Uuid::new_v4();
        let msg = ControlMessage::cancel_speculation(1_000_000, 1_020_000, Some(segment_id));

        assert!(msg.is_cancellation());
        assert!(!msg.is_batch_hint());
        assert_eq!(msg.segment_id, Some(segment_id));
    }

    #[test]
    fn batch_hint_roundtrip() {
        let msg = ControlMessage::batch_hint(5);
        assert!(msg.is_batch_hint());
        match msg.message_type {
            ControlMessageType::BatchHint {
                suggested_batch_size,
            } => assert_eq!(suggested_batch_size, 5),
            _ => panic!("expected BatchHint"),
        }
    }

    #[test]
    fn flush_buffer_has_no_payload_fields() {
        let msg = ControlMessage::flush_buffer();
        assert!(msg.is_flush_buffer());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["message_type"]["type"], "FlushBuffer");
    }

    #[test]
    fn cancel_speculation_rejects_inverted_window() {
        let msg = ControlMessage::cancel_speculation(2_000_000, 1_000_000, None);
        let err = msg.validate().unwrap_err();
        assert!(err.contains("from_timestamp"));
    }

    #[test]
    fn batch_hint_rejects_zero_and_oversized() {
        assert!(ControlMessage::batch_hint(0).validate().is_err());
        assert!(ControlMessage::batch_hint(150).validate().is_err());
        assert!(ControlMessage::batch_hint(10).validate().is_ok());
    }

    #[test]
    fn json_roundtrip_preserves_all_fields() {
        let original = ControlMessage::cancel_speculation(1000, 2000, Some(Uuid::new_v4()));
        let json = serde_json::to_string(&original).unwrap();
        let decoded: ControlMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn cancels_matches_by_segment_id_or_window() {
        let segment_id = Uuid::new_v4();
        let msg = ControlMessage::cancel_speculation(1000, 2000, Some(segment_id));

        assert!(msg.cancels(Some(segment_id), 999_999_999));
        assert!(msg.cancels(None, 1500));
        assert!(!msg.cancels(None, 5000));
    }
}
