use std::path::PathBuf;
use tracing::debug;

use super::media::{CaptureKind, Frame, JPEG_MIME_TYPE};
use super::CaptureSource;
use crate::error::DeviceError;

/// Capture source that serves a JPEG file from disk
///
/// The file is re-read on every capture, so replacing it on disk changes
/// what the remote service sees on the next cycle.
pub struct StillImageSource {
    kind: CaptureKind,
    path: PathBuf,
}

impl StillImageSource {
    pub fn new(kind: CaptureKind, path: PathBuf) -> Self {
        Self { kind, path }
    }
}

impl CaptureSource for StillImageSource {
    fn capture_once(&mut self) -> Result<Option<Frame>, DeviceError> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            DeviceError::read_failed(self.kind.as_str(), format!("{}: {}", self.path.display(), e))
        })?;

        if bytes.is_empty() {
            debug!("Still image {} is empty, skipping frame", self.path.display());
            return Ok(None);
        }

        Ok(Some(Frame::new(JPEG_MIME_TYPE, bytes)))
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}
