//! Speculative audio segment bookkeeping.
//!
//! Represents an audio segment forwarded speculatively before the VAD gate's final
//! decision. Used by `SpeculativeVADGate` to track segments that may need
//! retroactive cancellation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an audio segment forwarded before a final VAD decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeculativeSegment {
    /// Unique identifier for this segment.
    pub segment_id: Uuid,

    /// Start timestamp (microseconds, same epoch as `RuntimeData::timestamp`).
    pub start_timestamp: u64,

    /// End timestamp (microseconds).
    pub end_timestamp: u64,

    /// Current status.
    pub status: SegmentStatus,

    /// Reference to audio data in the gate's ring buffer (index range).
    pub buffer_range: (usize, usize),

    /// Session ID this segment belongs to.
    pub session_id: String,
}

/// Status of a speculative segment. Invariant: every segment ends in exactly one
/// of `Confirmed` or `Cancelled`, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SegmentStatus {
    /// Speculatively forwarded, awaiting VAD confirmation.
    Speculative,

    /// VAD confirmed as speech, downstream work may proceed.
    Confirmed,

    /// VAD retroactively cancelled (was noise/silence/too short).
    Cancelled { reason: String },
}

impl SpeculativeSegment {
    pub fn new(
        session_id: String,
        start_timestamp: u64,
        end_timestamp: u64,
        buffer_range: (usize, usize),
    ) -> Self {
        Self {
            segment_id: Uuid::new_v4(),
            start_timestamp,
            end_timestamp,
            status: SegmentStatus::Speculative,
            buffer_range,
            session_id,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start_timestamp >= self.end_timestamp {
            return Err(format!(
                "invalid timestamps: start ({}) >= end ({})",
                self.start_timestamp, self.end_timestamp
            ));
        }
        if self.buffer_range.1 <= self.buffer_range.0 {
            return Err(format!(
                "invalid buffer_range: ({}, {})",
                self.buffer_range.0, self.buffer_range.1
            ));
        }
        Ok(())
    }

    pub fn confirm(&mut self) {
        self.status = SegmentStatus::Confirmed;
    }

    pub fn cancel(&mut self, reason: String) {
        self.status = SegmentStatus::Cancelled { reason };
    }

    pub fn is_speculative(&self) -> bool {
        matches!(self.status, SegmentStatus::Speculative)
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, SegmentStatus::Confirmed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, SegmentStatus::Cancelled { .. })
    }

    pub fn duration_us(&self) -> u64 {
        self.end_timestamp - self.start_timestamp
    }

    /// Does `timestamp` fall within this segment's window?
    pub fn contains_timestamp(&self, timestamp: u64) -> bool {
        (self.start_timestamp..self.end_timestamp).contains(&timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_segment_starts_speculative() {
        let segment = SpeculativeSegment::new("session_123".to_string(), 1_000_000, 1_300_000, (0, 320));

        assert!(segment.is_speculative());
        assert!(!segment.is_confirmed());
        assert!(!segment.is_cancelled());
        assert_eq!(segment.session_id, "session_123");
    }

    #[test]
    fn validate_rejects_inverted_timestamps() {
        let mut segment =
            SpeculativeSegment::new("session_123".to_string(), 1_000_000, 1_300_000, (0, 320));
        segment.start_timestamp = 2_000_000;
        segment.end_timestamp = 1_000_000;

        assert!(segment.validate().is_err());
    }

    #[test]
    fn state_transitions_confirm_and_cancel() {
        let mut segment =
            SpeculativeSegment::new("session_123".to_string(), 1_000_000, 1_300_000, (0, 320));
        segment.confirm();
        assert!(segment.is_confirmed());

        let mut segment2 =
            SpeculativeSegment::new("session_123".to_string(), 2_000_000, 2_200_000, (320, 640));
        segment2.cancel("below minimum speech duration".to_string());
        assert!(segment2.is_cancelled());
    }

    #[test]
    fn duration_and_containment() {
        let segment =
            SpeculativeSegment::new("session_123".to_string(), 1_000_000, 1_300_000, (0, 320));
        assert_eq!(segment.duration_us(), 300_000);
        assert!(segment.contains_timestamp(1_100_000));
        assert!(!segment.contains_timestamp(1_500_000));
    }

    #[test]
    fn buffer_range_must_be_non_empty() {
        let mut segment =
            SpeculativeSegment::new("session_123".to_string(), 1_000_000, 1_300_000, (0, 320));
        assert!(segment.validate().is_ok());

        segment.buffer_range = (320, 320);
        assert!(segment.validate().is_err());
    }
}
