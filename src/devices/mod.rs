//! Local capture and playback devices
//!
//! This module defines the device contracts consumed by the session workers:
//! - [`CaptureSource`]: grabs one video frame (camera or screen)
//! - [`MicDevice`]: blocking reads of fixed-size PCM chunks
//! - [`SpeakerDevice`]: blocking PCM writes
//!
//! Devices are opened per session through a [`DeviceProvider`], inside the
//! worker thread that uses them. Concrete drivers are injected through the
//! provider; [`DefaultDevices`] ships still-image capture, a silent
//! microphone and a discarding speaker.

mod media;
mod null;
mod still;

pub use media::{AudioChunk, AudioFormat, CaptureKind, Frame, AUDIO_MIME_TYPE, JPEG_MIME_TYPE};
pub use null::{NullSpeaker, SilentMicrophone};
pub use still::StillImageSource;

use crate::error::DeviceError;
use std::path::PathBuf;

/// Grabs single video frames on demand.
pub trait CaptureSource: Send {
    /// Capture exactly one frame. `Ok(None)` means nothing was available this cycle.
    fn capture_once(&mut self) -> Result<Option<Frame>, DeviceError>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Microphone producing raw 16-bit PCM.
pub trait MicDevice: Send {
    /// Block until `frames` frames are available and return them as PCM bytes.
    fn read_chunk(&mut self, frames: usize) -> Result<Vec<u8>, DeviceError>;
}

/// Speaker accepting raw 16-bit PCM.
pub trait SpeakerDevice: Send {
    /// Write `pcm` synchronously, blocking while the device buffer is full.
    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError>;
}

/// Opens devices for a session.
///
/// Each worker opens its own device on its own thread, so implementations
/// may return devices that are not `Sync`.
pub trait DeviceProvider: Send + Sync {
    fn open_capture(&self, kind: CaptureKind) -> Result<Box<dyn CaptureSource>, DeviceError>;

    fn open_microphone(&self, format: &AudioFormat) -> Result<Box<dyn MicDevice>, DeviceError>;

    fn open_speaker(&self, format: &AudioFormat) -> Result<Box<dyn SpeakerDevice>, DeviceError>;
}

/// Device provider used by the service binary
#[derive(Debug, Clone, Default)]
pub struct DefaultDevices {
    /// JPEG served for camera mode
    pub camera_image: Option<PathBuf>,
    /// JPEG served for screen mode
    pub screen_image: Option<PathBuf>,
}

impl DeviceProvider for DefaultDevices {
    fn open_capture(&self, kind: CaptureKind) -> Result<Box<dyn CaptureSource>, DeviceError> {
        let path = match kind {
            CaptureKind::Camera => self.camera_image.as_ref(),
            CaptureKind::Screen => self.screen_image.as_ref(),
        };

        match path {
            Some(path) => Ok(Box::new(StillImageSource::new(kind, path.clone()))),
            None => Err(DeviceError::unavailable(
                kind.as_str(),
                "no capture backend configured",
            )),
        }
    }

    fn open_microphone(&self, format: &AudioFormat) -> Result<Box<dyn MicDevice>, DeviceError> {
        Ok(Box::new(SilentMicrophone::new(*format)))
    }

    fn open_speaker(&self, format: &AudioFormat) -> Result<Box<dyn SpeakerDevice>, DeviceError> {
        Ok(Box::new(NullSpeaker::new(*format)))
    }
}
