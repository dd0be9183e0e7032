//! Speculative VAD gate: forwards audio downstream before a voice-activity
//! detector has finalized a segment boundary, then retroactively cancels if
//! the decision turns out to be "no speech".

use crate::data::{ControlMessage, RuntimeData, SegmentStatus, SpeculativeSegment};
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Speculating,
}

#[derive(Debug, Clone)]
pub struct VadGateConfig {
    /// Minimum contiguous speech duration before speculation is confirmed.
    pub min_speech_us: u64,
    /// Trailing silence duration confirming end-of-speech.
    pub trailing_silence_us: u64,
    /// Maximum silence gap permitted inside one utterance before it's
    /// considered ended rather than a brief pause.
    pub max_silence_gap_us: u64,
    /// Pre-speech audio retained and forwarded retroactively once
    /// speculation begins, so the consumer isn't missing the attack.
    pub pre_speech_buffer_us: u64,
}

impl Default for VadGateConfig {
    fn default() -> Self {
        Self {
            min_speech_us: 300_000,
            trailing_silence_us: 500_000,
            max_silence_gap_us: 200_000,
            pre_speech_buffer_us: 150_000,
        }
    }
}

/// Per-utterance speculative state machine: `Idle → Speculating → (Confirmed
/// | Cancelled) → Idle`. Each `segment_id` is confirmed or cancelled exactly
/// once, never both.
pub struct SpeculativeVadGate {
    config: VadGateConfig,
    state: GateState,
    current: Option<SpeculativeSegment>,
    speech_started_at: Option<u64>,
    last_speech_at: Option<u64>,
    /// Ring of recently seen audio, used to forward `pre_speech_buffer_us`
    /// retroactively when speculation begins.
    pre_speech: VecDeque<RuntimeData>,
}

pub enum GateOutput {
    /// Nothing to forward yet (still accumulating pre-speech buffer, or gate
    /// is idle on silence).
    Nothing,
    /// Forward this audio downstream (speculatively or post-confirmation).
    Forward(Vec<RuntimeData>),
    /// Speculation was retroactively cancelled; emit this control message.
    Cancel(ControlMessage),
}

impl SpeculativeVadGate {
    pub fn new(config: VadGateConfig) -> Self {
        Self {
            config,
            state: GateState::Idle,
            current: None,
            speech_started_at: None,
            last_speech_at: None,
            pre_speech: VecDeque::new(),
        }
    }

    /// Feed one audio frame with the VAD's per-frame speech/silence verdict.
    /// `timestamp`/`is_speech` come from upstream VAD frame analysis; this
    /// gate only tracks segment boundaries and emits speculative forwarding
    /// or cancellation decisions, it does not itself classify audio.
    pub fn on_frame(&mut self, frame: RuntimeData, timestamp: u64, is_speech: bool) -> GateOutput {
        match self.state {
            GateState::Idle => self.on_frame_idle(frame, timestamp, is_speech),
            GateState::Speculating => self.on_frame_speculating(frame, timestamp, is_speech),
        }
    }

    fn on_frame_idle(&mut self, frame: RuntimeData, timestamp: u64, is_speech: bool) -> GateOutput {
        if !is_speech {
            self.push_pre_speech(frame);
            return GateOutput::Nothing;
        }

        self.state = GateState::Speculating;
        self.speech_started_at = Some(timestamp);
        self.last_speech_at = Some(timestamp);
        let segment = SpeculativeSegment::new(
            frame.session_id.clone(),
            timestamp,
            timestamp,
            (0, self.pre_speech.len()),
        );
        self.current = Some(segment);

        let mut forwarded: Vec<RuntimeData> = self.pre_speech.drain(..).collect();
        forwarded.push(frame);
        GateOutput::Forward(forwarded)
    }

    fn on_frame_speculating(&mut self, frame: RuntimeData, timestamp: u64, is_speech: bool) -> GateOutput {
        let Some(segment) = self.current.as_mut() else {
            self.state = GateState::Idle;
            return self.on_frame_idle(frame, timestamp, is_speech);
        };

        if is_speech {
            self.last_speech_at = Some(timestamp);
            segment.end_timestamp = timestamp;
            return GateOutput::Forward(vec![frame]);
        }

        let last_speech = self.last_speech_at.unwrap_or(timestamp);
        let silence_gap = timestamp.saturating_sub(last_speech);

        if silence_gap < self.config.max_silence_gap_us {
            // Still inside one utterance's permitted pause; keep speculating.
            return GateOutput::Forward(vec![frame]);
        }

        // Utterance ended. Decide confirm vs cancel based on accumulated
        // speech duration.
        let speech_duration = last_speech.saturating_sub(self.speech_started_at.unwrap_or(last_speech));
        let segment_id = segment.segment_id;
        let from_timestamp = segment.start_timestamp;
        let to_timestamp = segment.end_timestamp;

        let output = if speech_duration >= self.config.min_speech_us {
            segment.confirm();
            GateOutput::Forward(vec![frame])
        } else {
            segment.cancel("below minimum speech duration".to_string());
            GateOutput::Cancel(ControlMessage::cancel_speculation(
                from_timestamp,
                to_timestamp,
                Some(segment_id),
            ))
        };

        self.state = GateState::Idle;
        self.current = None;
        self.speech_started_at = None;
        self.last_speech_at = None;
        self.push_pre_speech(frame);
        output
    }

    fn push_pre_speech(&mut self, frame: RuntimeData) {
        self.pre_speech.push_back(frame);
        let cap = self.estimated_pre_speech_capacity();
        while self.pre_speech.len() > cap {
            self.pre_speech.pop_front();
        }
    }

    fn estimated_pre_speech_capacity(&self) -> usize {
        // Assume ~20ms frames; a duration-based ring would need per-frame
        // durations, which the caller controls via frame size upstream.
        let frame_us = 20_000u64;
        (self.config.pre_speech_buffer_us / frame_us).max(1) as usize
    }

    pub fn current_segment(&self) -> Option<&SpeculativeSegment> {
        self.current.as_ref()
    }

    pub fn is_speculating(&self) -> bool {
        self.state == GateState::Speculating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(session: &str, ts: u64) -> RuntimeData {
        RuntimeData::audio(session, ts, vec![0u8; 16], 16_000, 1, crate::data::SampleFormat::I16).unwrap()
    }

    #[test]
    fn idle_on_silence_buffers_pre_speech() {
        let mut gate = SpeculativeVadGate::new(VadGateConfig::default());
        let out = gate.on_frame(frame("s1", 0), 0, false);
        assert!(matches!(out, GateOutput::Nothing));
        assert!(!gate.is_speculating());
    }

    #[test]
    fn short_speech_burst_is_cancelled() {
        let mut gate = SpeculativeVadGate::new(VadGateConfig::default());

        // 500ms silence
        for i in 0..25 {
            gate.on_frame(frame("s1", i * 20_000), i * 20_000, false);
        }

        // 200ms of speech (below 300ms min_speech threshold)
        let speech_start = 500_000u64;
        for i in 0..10 {
            let ts = speech_start + i * 20_000;
            let out = gate.on_frame(frame("s1", ts), ts, true);
            assert!(matches!(out, GateOutput::Forward(_)));
        }

        // silence beyond max_silence_gap_us triggers the confirm/cancel decision
        let after_speech = speech_start + 200_000;
        let mut cancelled = false;
        for i in 0..20 {
            let ts = after_speech + i * 20_000;
            match gate.on_frame(frame("s1", ts), ts, false) {
                GateOutput::Cancel(msg) => {
                    assert!(msg.is_cancellation());
                    cancelled = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(cancelled, "expected a CancelSpeculation once silence gap elapsed");
    }

    #[test]
    fn sustained_speech_confirms_without_cancellation() {
        let mut gate = SpeculativeVadGate::new(VadGateConfig::default());

        let mut ts = 0u64;
        for _ in 0..30 {
            gate.on_frame(frame("s1", ts), ts, true);
            ts += 20_000;
        }

        for i in 0..20 {
            let frame_ts = ts + i * 20_000;
            match gate.on_frame(frame("s1", frame_ts), frame_ts, false) {
                GateOutput::Cancel(_) => panic!("should not cancel a confirmed segment"),
                _ => {}
            }
        }
    }
}
