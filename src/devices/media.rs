use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const JPEG_MIME_TYPE: &str = "image/jpeg";
pub const AUDIO_MIME_TYPE: &str = "audio/pcm";

/// Which capture device a video mode reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    Camera,
    Screen,
}

impl CaptureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::Camera => "camera",
            CaptureKind::Screen => "screen",
        }
    }
}

/// A single encoded video frame. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    mime_type: String,
    payload: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(mime_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload,
            captured_at: Utc::now(),
        }
    }

    pub fn jpeg(payload: Vec<u8>) -> Self {
        Self::new(JPEG_MIME_TYPE, payload)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// A fixed-size block of 16-bit little-endian PCM. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    payload: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl AudioChunk {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            captured_at: Utc::now(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        AUDIO_MIME_TYPE
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// PCM stream layout (16-bit signed, interleaved)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Frames per microphone read
    pub chunk_frames: usize,
}

impl AudioFormat {
    /// Microphone side: 16kHz mono, 1024-frame chunks
    pub fn input() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_frames: 1024,
        }
    }

    /// Speaker side: the remote service answers at 24kHz mono
    pub fn output() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
            chunk_frames: 1024,
        }
    }

    /// Bytes in one chunk of `chunk_frames` frames
    pub fn chunk_bytes(&self) -> usize {
        self.bytes_for(self.chunk_frames)
    }

    pub fn bytes_for(&self, frames: usize) -> usize {
        frames * self.channels as usize * 2
    }

    /// Wall-clock duration of `bytes` of PCM in this format
    pub fn duration_of(&self, bytes: usize) -> std::time::Duration {
        let bytes_per_sec = self.sample_rate as u64 * self.channels as u64 * 2;
        if bytes_per_sec == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_micros(bytes as u64 * 1_000_000 / bytes_per_sec)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::input()
    }
}
