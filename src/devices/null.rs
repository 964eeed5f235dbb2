// Placeholder audio devices for hosts without an audio driver wired in.
//
// Both devices block for the real-time duration of the audio they handle,
// so the pipeline sees the same pacing a hardware device would impose.

use std::time::Duration;
use tracing::debug;

use super::media::AudioFormat;
use super::{MicDevice, SpeakerDevice};
use crate::error::DeviceError;

/// Microphone that produces silence at the configured sample rate
pub struct SilentMicrophone {
    format: AudioFormat,
}

impl SilentMicrophone {
    pub fn new(format: AudioFormat) -> Self {
        debug!(
            "Silent microphone opened ({}Hz, {} channels)",
            format.sample_rate, format.channels
        );
        Self { format }
    }
}

impl MicDevice for SilentMicrophone {
    fn read_chunk(&mut self, frames: usize) -> Result<Vec<u8>, DeviceError> {
        let bytes = self.format.bytes_for(frames);
        std::thread::sleep(self.format.duration_of(bytes));
        Ok(vec![0u8; bytes])
    }
}

/// Speaker that discards everything written to it
pub struct NullSpeaker {
    format: AudioFormat,
    written: u64,
}

impl NullSpeaker {
    pub fn new(format: AudioFormat) -> Self {
        Self { format, written: 0 }
    }

    /// Total bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl SpeakerDevice for NullSpeaker {
    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        self.written += pcm.len() as u64;
        // Cap the pause so an oversized payload cannot stall shutdown
        std::thread::sleep(self.format.duration_of(pcm.len()).min(Duration::from_millis(500)));
        Ok(())
    }
}
