//! `RuntimeData` — the only payload type that crosses an edge.
//!
//! A tagged envelope (`session_id`, `timestamp`, `payload`) plus the wire framing
//! that lets both in-process forwarders and the IPC transport move it as opaque
//! bytes: `type (1) | session_len (2) | session bytes | timestamp (8) | payload_len
//! (4) | payload bytes`, all little-endian.

pub mod control_message;
pub mod speculative_segment;

pub use control_message::{ControlMessage, ControlMessageType};
pub use speculative_segment::{SegmentStatus, SpeculativeSegment};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Discriminant for the wire type byte and for `RuntimeData::data_type()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    Audio = 0,
    Video = 1,
    Text = 2,
    Tensor = 3,
    Control = 4,
    File = 5,
}

impl DataType {
    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => DataType::Audio,
            1 => DataType::Video,
            2 => DataType::Text,
            3 => DataType::Tensor,
            4 => DataType::Control,
            5 => DataType::File,
            other => return Err(Error::InvalidData(format!("unknown RuntimeData type byte {other}"))),
        })
    }
}

/// Audio sample storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    F32,
    I16,
    I24,
    I32,
    U8,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::F32 => 4,
            SampleFormat::I16 => 2,
            SampleFormat::I24 => 3,
            SampleFormat::I32 => 4,
            SampleFormat::U8 => 1,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            SampleFormat::F32 => 0,
            SampleFormat::I16 => 1,
            SampleFormat::I24 => 2,
            SampleFormat::I32 => 3,
            SampleFormat::U8 => 4,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => SampleFormat::F32,
            1 => SampleFormat::I16,
            2 => SampleFormat::I24,
            3 => SampleFormat::I32,
            4 => SampleFormat::U8,
            other => return Err(Error::InvalidData(format!("unknown sample format byte {other}"))),
        })
    }
}

/// Video pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb,
    Rgba,
    Yuv420,
    Yuv422,
    Yuv444,
    Bgr,
}

impl PixelFormat {
    fn to_byte(self) -> u8 {
        match self {
            PixelFormat::Rgb => 0,
            PixelFormat::Rgba => 1,
            PixelFormat::Yuv420 => 2,
            PixelFormat::Yuv422 => 3,
            PixelFormat::Yuv444 => 4,
            PixelFormat::Bgr => 5,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => PixelFormat::Rgb,
            1 => PixelFormat::Rgba,
            2 => PixelFormat::Yuv420,
            3 => PixelFormat::Yuv422,
            4 => PixelFormat::Yuv444,
            5 => PixelFormat::Bgr,
            other => return Err(Error::InvalidData(format!("unknown pixel format byte {other}"))),
        })
    }
}

/// Tensor element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorDType {
    F32,
    F64,
    I32,
    I64,
    U8,
    U16,
}

impl TensorDType {
    pub fn element_size(&self) -> usize {
        match self {
            TensorDType::F32 | TensorDType::I32 => 4,
            TensorDType::F64 | TensorDType::I64 => 8,
            TensorDType::U8 => 1,
            TensorDType::U16 => 2,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            TensorDType::F32 => 0,
            TensorDType::F64 => 1,
            TensorDType::I32 => 2,
            TensorDType::I64 => 3,
            TensorDType::U8 => 4,
            TensorDType::U16 => 5,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => TensorDType::F32,
            1 => TensorDType::F64,
            2 => TensorDType::I32,
            3 => TensorDType::I64,
            4 => TensorDType::U8,
            5 => TensorDType::U16,
            other => return Err(Error::InvalidData(format!("unknown tensor dtype byte {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioData {
    pub samples: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u8,
    pub format: SampleFormat,
}

impl AudioData {
    pub fn samples_per_channel(&self) -> usize {
        let frame_size = self.channels as usize * self.format.bytes_per_sample();
        if frame_size == 0 {
            0
        } else {
            self.samples.len() / frame_size
        }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            (self.samples_per_channel() as f64 / self.sample_rate as f64) * 1000.0
        }
    }

    fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.channels > 2 {
            return Err(Error::InvalidData(format!(
                "audio channel count must be 1 or 2, got {}",
                self.channels
            )));
        }
        let frame_size = self.channels as usize * self.format.bytes_per_sample();
        if self.samples.len() % frame_size != 0 {
            return Err(Error::InvalidData(format!(
                "audio buffer length {} is not a multiple of frame size {} (channels={} x bytes_per_sample={})",
                self.samples.len(),
                frame_size,
                self.channels,
                self.format.bytes_per_sample()
            )));
        }
        Ok(())
    }

    /// Convert sample format by standard scaling (f32 in [-1.0, 1.0] <-> signed PCM).
    pub fn converted_to(&self, target: SampleFormat) -> AudioData {
        if target == self.format {
            return self.clone();
        }
        let float_samples = self.to_f32_samples();
        let samples = encode_f32_samples(&float_samples, target);
        AudioData {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: target,
        }
    }

    /// Downmix stereo to mono by averaging channel pairs, or return unchanged if already mono.
    pub fn to_mono(&self) -> AudioData {
        if self.channels == 1 {
            return self.clone();
        }
        let float_samples = self.to_f32_samples();
        let mono: Vec<f32> = float_samples
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
        AudioData {
            samples: encode_f32_samples(&mono, self.format),
            sample_rate: self.sample_rate,
            channels: 1,
            format: self.format,
        }
    }

    /// Upmix mono to stereo by duplicating the channel, or return unchanged if already stereo.
    pub fn to_stereo(&self) -> AudioData {
        if self.channels == 2 {
            return self.clone();
        }
        let float_samples = self.to_f32_samples();
        let mut stereo = Vec::with_capacity(float_samples.len() * 2);
        for s in &float_samples {
            stereo.push(*s);
            stereo.push(*s);
        }
        AudioData {
            samples: encode_f32_samples(&stereo, self.format),
            sample_rate: self.sample_rate,
            channels: 2,
            format: self.format,
        }
    }

    fn to_f32_samples(&self) -> Vec<f32> {
        match self.format {
            SampleFormat::F32 => self
                .samples
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            SampleFormat::I16 => self
                .samples
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
                .collect(),
            SampleFormat::I32 => self
                .samples
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / i32::MAX as f32)
                .collect(),
            SampleFormat::I24 => self
                .samples
                .chunks_exact(3)
                .map(|b| {
                    let v = i32::from_le_bytes([b[0], b[1], b[2], 0]) << 8 >> 8;
                    v as f32 / 8_388_607.0
                })
                .collect(),
            SampleFormat::U8 => self
                .samples
                .iter()
                .map(|&b| (b as f32 - 128.0) / 128.0)
                .collect(),
        }
    }
}

fn encode_f32_samples(samples: &[f32], target: SampleFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * target.bytes_per_sample());
    for &s in samples {
        match target {
            SampleFormat::F32 => out.extend_from_slice(&s.to_le_bytes()),
            SampleFormat::I16 => {
                out.extend_from_slice(&((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
            }
            SampleFormat::I32 => {
                out.extend_from_slice(&((s.clamp(-1.0, 1.0) * i32::MAX as f32) as i32).to_le_bytes())
            }
            SampleFormat::I24 => {
                let v = (s.clamp(-1.0, 1.0) * 8_388_607.0) as i32;
                out.extend_from_slice(&v.to_le_bytes()[0..3]);
            }
            SampleFormat::U8 => out.push((s.clamp(-1.0, 1.0) * 128.0 + 128.0) as u8),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoData {
    pub frame: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub fps: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
    /// ISO-639-1 language tag, e.g. "en".
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    pub data: Vec<u8>,
    pub shape: Vec<u64>,
    pub dtype: TensorDType,
}

impl TensorData {
    fn validate(&self) -> Result<()> {
        let elements: u64 = self.shape.iter().product();
        let expected = elements as usize * self.dtype.element_size();
        if self.data.len() != expected {
            return Err(Error::InvalidData(format!(
                "tensor buffer length {} does not match shape {:?} x element size {} = {}",
                self.data.len(),
                self.shape,
                self.dtype.element_size(),
                expected
            )));
        }
        Ok(())
    }
}

/// A reference-only view into a `TensorData`, for inspection without copying.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    pub data: &'a [u8],
    pub shape: &'a [u64],
    pub dtype: TensorDType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
    pub range: Option<(u64, u64)>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

/// The tagged payload carried by a `RuntimeData` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Audio(AudioData),
    Video(VideoData),
    Text(TextData),
    Tensor(TensorData),
    Control(ControlMessage),
    File(FileRef),
}

/// The only payload type crossing a pipeline edge.
///
/// Created by the source node, immutable on the wire: consumers may produce new
/// envelopes but must not mutate one they received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeData {
    /// Opaque session identity; empty string means "default session".
    pub session_id: String,
    /// Monotonic microseconds since an arbitrary epoch, used only for ordering
    /// within a session.
    pub timestamp: u64,
    pub payload: Payload,
}

impl RuntimeData {
    pub fn audio(
        session_id: impl Into<String>,
        timestamp: u64,
        samples: Vec<u8>,
        sample_rate: u32,
        channels: u8,
        format: SampleFormat,
    ) -> Result<Self> {
        let audio = AudioData {
            samples,
            sample_rate,
            channels,
            format,
        };
        audio.validate()?;
        Ok(Self {
            session_id: session_id.into(),
            timestamp,
            payload: Payload::Audio(audio),
        })
    }

    pub fn video(
        session_id: impl Into<String>,
        timestamp: u64,
        frame: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        fps: f32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            payload: Payload::Video(VideoData {
                frame,
                width,
                height,
                format,
                fps,
            }),
        }
    }

    pub fn text(session_id: impl Into<String>, timestamp: u64, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            payload: Payload::Text(TextData {
                text: text.into(),
                language: None,
            }),
        }
    }

    pub fn text_with_language(
        session_id: impl Into<String>,
        timestamp: u64,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            payload: Payload::Text(TextData {
                text: text.into(),
                language: Some(language.into()),
            }),
        }
    }

    pub fn tensor(
        session_id: impl Into<String>,
        timestamp: u64,
        data: Vec<u8>,
        shape: Vec<u64>,
        dtype: TensorDType,
    ) -> Result<Self> {
        let tensor = TensorData { data, shape, dtype };
        tensor.validate()?;
        Ok(Self {
            session_id: session_id.into(),
            timestamp,
            payload: Payload::Tensor(tensor),
        })
    }

    pub fn control_message(
        session_id: impl Into<String>,
        timestamp: u64,
        message: ControlMessage,
    ) -> Result<Self> {
        message.validate().map_err(Error::InvalidData)?;
        Ok(Self {
            session_id: session_id.into(),
            timestamp,
            payload: Payload::Control(message),
        })
    }

    pub fn file(
        session_id: impl Into<String>,
        timestamp: u64,
        path: impl Into<String>,
        range: Option<(u64, u64)>,
        mime_type: Option<String>,
        size: Option<u64>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            payload: Payload::File(FileRef {
                path: path.into(),
                range,
                mime_type,
                size,
            }),
        }
    }

    pub fn data_type(&self) -> DataType {
        match &self.payload {
            Payload::Audio(_) => DataType::Audio,
            Payload::Video(_) => DataType::Video,
            Payload::Text(_) => DataType::Text,
            Payload::Tensor(_) => DataType::Tensor,
            Payload::Control(_) => DataType::Control,
            Payload::File(_) => DataType::File,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.payload, Payload::Audio(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self.payload, Payload::Video(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.payload, Payload::Text(_))
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self.payload, Payload::Tensor(_))
    }

    pub fn is_control_message(&self) -> bool {
        matches!(self.payload, Payload::Control(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.payload, Payload::File(_))
    }

    pub fn as_audio(&self) -> Option<&AudioData> {
        match &self.payload {
            Payload::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<TensorView<'_>> {
        match &self.payload {
            Payload::Tensor(t) => Some(TensorView {
                data: &t.data,
                shape: &t.shape,
                dtype: t.dtype,
            }),
            _ => None,
        }
    }

    pub fn as_control_message(&self) -> Option<&ControlMessage> {
        match &self.payload {
            Payload::Control(c) => Some(c),
            _ => None,
        }
    }

    /// Control messages do not count as data for backpressure accounting.
    pub fn counts_for_backpressure(&self) -> bool {
        !self.is_control_message()
    }

    /// Binary wire framing: `type(1) | session_len(2) | session | timestamp(8) |
    /// payload_len(4) | payload`, all little-endian.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.push(self.data_type() as u8);

        let session_bytes = self.session_id.as_bytes();
        if session_bytes.len() > u16::MAX as usize {
            return Err(Error::InvalidData("session_id too long to frame".into()));
        }
        out.extend_from_slice(&(session_bytes.len() as u16).to_le_bytes());
        out.extend_from_slice(session_bytes);
        out.extend_from_slice(&self.timestamp.to_le_bytes());

        let payload = self.encode_payload()?;
        if payload.len() > u32::MAX as usize {
            return Err(Error::InvalidData("payload too large to frame".into()));
        }
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match &self.payload {
            Payload::Audio(a) => {
                buf.extend_from_slice(&a.sample_rate.to_le_bytes());
                buf.push(a.channels);
                buf.push(a.format.to_byte());
                buf.extend_from_slice(&a.samples);
            }
            Payload::Video(v) => {
                buf.extend_from_slice(&v.width.to_le_bytes());
                buf.extend_from_slice(&v.height.to_le_bytes());
                buf.push(v.format.to_byte());
                buf.extend_from_slice(&v.fps.to_le_bytes());
                buf.extend_from_slice(&v.frame);
            }
            Payload::Text(t) => {
                let lang = t.language.as_deref().unwrap_or("");
                if lang.len() > u8::MAX as usize {
                    return Err(Error::InvalidData("language tag too long".into()));
                }
                buf.push(lang.len() as u8);
                buf.extend_from_slice(lang.as_bytes());
                buf.extend_from_slice(t.text.as_bytes());
            }
            Payload::Tensor(t) => {
                buf.push(t.dtype.to_byte());
                if t.shape.len() > u8::MAX as usize {
                    return Err(Error::InvalidData("tensor rank too high to frame".into()));
                }
                buf.push(t.shape.len() as u8);
                for dim in &t.shape {
                    buf.extend_from_slice(&dim.to_le_bytes());
                }
                buf.extend_from_slice(&t.data);
            }
            Payload::Control(c) => {
                let json = serde_json::to_vec(c)?;
                buf.extend_from_slice(&json);
            }
            Payload::File(f) => {
                let path_bytes = f.path.as_bytes();
                buf.extend_from_slice(&(path_bytes.len() as u16).to_le_bytes());
                buf.extend_from_slice(path_bytes);
                match f.range {
                    Some((offset, length)) => {
                        buf.push(1);
                        buf.extend_from_slice(&offset.to_le_bytes());
                        buf.extend_from_slice(&length.to_le_bytes());
                    }
                    None => buf.push(0),
                }
                let mime_bytes = f.mime_type.as_deref().unwrap_or("").as_bytes().to_vec();
                buf.extend_from_slice(&(mime_bytes.len() as u16).to_le_bytes());
                buf.extend_from_slice(&mime_bytes);
                match f.size {
                    Some(size) => {
                        buf.push(1);
                        buf.extend_from_slice(&size.to_le_bytes());
                    }
                    None => buf.push(0),
                }
            }
        }
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 15 {
            return Err(Error::InvalidData("frame too short for RuntimeData header".into()));
        }
        let mut pos = 0usize;

        let data_type = DataType::from_byte(bytes[pos])?;
        pos += 1;

        let session_len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
        pos += 2;
        if pos + session_len > bytes.len() {
            return Err(Error::InvalidData("frame session_id length out of bounds".into()));
        }
        let session_id = String::from_utf8_lossy(&bytes[pos..pos + session_len]).to_string();
        pos += session_len;

        if pos + 8 > bytes.len() {
            return Err(Error::InvalidData("frame truncated before timestamp".into()));
        }
        let timestamp = u64::from_le_bytes(bytes[pos..pos + 8].try_into().unwrap());
        pos += 8;

        if pos + 4 > bytes.len() {
            return Err(Error::InvalidData("frame truncated before payload_len".into()));
        }
        let payload_len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;

        if pos + payload_len > bytes.len() {
            return Err(Error::InvalidData(format!(
                "frame payload truncated: expected {payload_len} bytes, have {}",
                bytes.len() - pos
            )));
        }
        let payload_bytes = &bytes[pos..pos + payload_len];

        let payload = Self::decode_payload(data_type, payload_bytes)?;
        Ok(Self {
            session_id,
            timestamp,
            payload,
        })
    }

    fn decode_payload(data_type: DataType, bytes: &[u8]) -> Result<Payload> {
        match data_type {
            DataType::Audio => {
                if bytes.len() < 6 {
                    return Err(Error::InvalidData("audio payload too short".into()));
                }
                let sample_rate = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
                let channels = bytes[4];
                let format = SampleFormat::from_byte(bytes[5])?;
                let audio = AudioData {
                    samples: bytes[6..].to_vec(),
                    sample_rate,
                    channels,
                    format,
                };
                audio.validate()?;
                Ok(Payload::Audio(audio))
            }
            DataType::Video => {
                if bytes.len() < 13 {
                    return Err(Error::InvalidData("video payload too short".into()));
                }
                let width = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
                let height = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
                let format = PixelFormat::from_byte(bytes[8])?;
                let fps = f32::from_le_bytes(bytes[9..13].try_into().unwrap());
                Ok(Payload::Video(VideoData {
                    frame: bytes[13..].to_vec(),
                    width,
                    height,
                    format,
                    fps,
                }))
            }
            DataType::Text => {
                if bytes.is_empty() {
                    return Err(Error::InvalidData("text payload missing language prefix".into()));
                }
                let lang_len = bytes[0] as usize;
                if 1 + lang_len > bytes.len() {
                    return Err(Error::InvalidData("text payload language tag out of bounds".into()));
                }
                let language = if lang_len == 0 {
                    None
                } else {
                    Some(String::from_utf8_lossy(&bytes[1..1 + lang_len]).to_string())
                };
                let text = String::from_utf8_lossy(&bytes[1 + lang_len..]).to_string();
                Ok(Payload::Text(TextData { text, language }))
            }
            DataType::Tensor => {
                if bytes.len() < 2 {
                    return Err(Error::InvalidData("tensor payload too short".into()));
                }
                let dtype = TensorDType::from_byte(bytes[0])?;
                let rank = bytes[1] as usize;
                let shape_end = 2 + rank * 8;
                if shape_end > bytes.len() {
                    return Err(Error::InvalidData("tensor payload shape out of bounds".into()));
                }
                let mut shape = Vec::with_capacity(rank);
                for i in 0..rank {
                    let off = 2 + i * 8;
                    shape.push(u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap()));
                }
                let tensor = TensorData {
                    data: bytes[shape_end..].to_vec(),
                    shape,
                    dtype,
                };
                tensor.validate()?;
                Ok(Payload::Tensor(tensor))
            }
            DataType::Control => {
                let message: ControlMessage = serde_json::from_slice(bytes)?;
                Ok(Payload::Control(message))
            }
            DataType::File => {
                if bytes.len() < 2 {
                    return Err(Error::InvalidData("file payload too short".into()));
                }
                let path_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
                let mut pos = 2usize;
                if pos + path_len > bytes.len() {
                    return Err(Error::InvalidData("file payload path out of bounds".into()));
                }
                let path = String::from_utf8_lossy(&bytes[pos..pos + path_len]).to_string();
                pos += path_len;

                if pos >= bytes.len() {
                    return Err(Error::InvalidData("file payload missing range flag".into()));
                }
                let has_range = bytes[pos] != 0;
                pos += 1;
                let range = if has_range {
                    if pos + 16 > bytes.len() {
                        return Err(Error::InvalidData("file payload range out of bounds".into()));
                    }
                    let offset = u64::from_le_bytes(bytes[pos..pos + 8].try_into().unwrap());
                    let length = u64::from_le_bytes(bytes[pos + 8..pos + 16].try_into().unwrap());
                    pos += 16;
                    Some((offset, length))
                } else {
                    None
                };

                if pos + 2 > bytes.len() {
                    return Err(Error::InvalidData("file payload missing mime length".into()));
                }
                let mime_len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
                pos += 2;
                if pos + mime_len > bytes.len() {
                    return Err(Error::InvalidData("file payload mime out of bounds".into()));
                }
                let mime_type = if mime_len == 0 {
                    None
                } else {
                    Some(String::from_utf8_lossy(&bytes[pos..pos + mime_len]).to_string())
                };
                pos += mime_len;

                if pos >= bytes.len() {
                    return Err(Error::InvalidData("file payload missing size flag".into()));
                }
                let has_size = bytes[pos] != 0;
                pos += 1;
                let size = if has_size {
                    if pos + 8 > bytes.len() {
                        return Err(Error::InvalidData("file payload size out of bounds".into()));
                    }
                    Some(u64::from_le_bytes(bytes[pos..pos + 8].try_into().unwrap()))
                } else {
                    None
                };

                Ok(Payload::File(FileRef {
                    path,
                    range,
                    mime_type,
                    size,
                }))
            }
        }
    }
}
