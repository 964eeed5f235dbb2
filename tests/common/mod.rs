// Shared fakes for integration tests
//
// `FakeRemote` stands in for the live service and records everything the
// bridge sends. `FakeDevices` produces tagged frames and audio and records
// what reaches the speaker.

#![allow(dead_code)]

use live_session::{
    AudioFormat, BridgeConfig, CaptureKind, CaptureSource, ConnectionAdapter, ConnectionError,
    ConnectionHandle, DeviceError, DeviceProvider, Frame, InboundEvent, MicDevice, Outbound,
    SessionConfig, SessionController, SpeakerDevice,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Timings short enough for tests but with the same shape as the defaults
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        bridge: BridgeConfig {
            call_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(1),
            drain_window: Duration::from_millis(10),
        },
        join_timeout: Duration::from_secs(1),
        capture_interval: Duration::from_millis(20),
        capture_backoff: Duration::from_millis(20),
        video_poll: Duration::from_millis(5),
        audio_input: AudioFormat {
            sample_rate: 16000,
            channels: 1,
            chunk_frames: 16,
        },
        audio_poll: Duration::from_millis(2),
        receive_poll: Duration::from_millis(10),
        playback_poll: Duration::from_millis(2),
        playback_backoff: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

pub fn controller(remote: &Arc<FakeRemote>, devices: &Arc<FakeDevices>) -> SessionController {
    controller_with(fast_config(), remote, devices)
}

pub fn controller_with(
    config: SessionConfig,
    remote: &Arc<FakeRemote>,
    devices: &Arc<FakeDevices>,
) -> SessionController {
    SessionController::new(config, remote.clone(), devices.clone())
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ============================================================================
// Remote service
// ============================================================================

#[derive(Default)]
pub struct FakeRemote {
    pub connects: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub sent: Arc<Mutex<Vec<Outbound>>>,
    pub inbound: Arc<Mutex<VecDeque<InboundEvent>>>,
    pub fail_connect: AtomicBool,
    /// Delay applied inside every connect
    pub connect_delay: Mutex<Duration>,
    /// Delay applied inside every send, read when the send runs
    pub send_delay: Arc<Mutex<Duration>>,
    /// Sends fail with `SendFailed` while set
    pub fail_sends: Arc<AtomicBool>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        let remote = Self::default();
        remote.fail_connect.store(true, Ordering::SeqCst);
        Arc::new(remote)
    }

    pub fn slow_connect(delay: Duration) -> Arc<Self> {
        let remote = Self::default();
        *remote.connect_delay.lock().unwrap() = delay;
        Arc::new(remote)
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = delay;
    }

    pub fn set_failing_sends(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn push_inbound(&self, events: impl IntoIterator<Item = InboundEvent>) {
        self.inbound.lock().unwrap().extend(events);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|payload| match payload {
                Outbound::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|payload| match payload {
                Outbound::Frame(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_audio_chunks(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|payload| matches!(payload, Outbound::Audio(_)))
            .count()
    }
}

#[async_trait::async_trait]
impl ConnectionAdapter for FakeRemote {
    async fn connect(&self) -> Result<Box<dyn ConnectionHandle>, ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectFailed("connection refused".into()));
        }

        Ok(Box::new(FakeConnection {
            session_id: format!("fake-{}", self.connects()),
            sent: Arc::clone(&self.sent),
            inbound: Arc::clone(&self.inbound),
            closes: Arc::clone(&self.closes),
            send_delay: Arc::clone(&self.send_delay),
            fail_sends: Arc::clone(&self.fail_sends),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeConnection {
    session_id: String,
    sent: Arc<Mutex<Vec<Outbound>>>,
    inbound: Arc<Mutex<VecDeque<InboundEvent>>>,
    closes: Arc<AtomicUsize>,
    send_delay: Arc<Mutex<Duration>>,
    fail_sends: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl ConnectionHandle for FakeConnection {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn send(&mut self, payload: Outbound) -> Result<(), ConnectionError> {
        let delay = *self.send_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ConnectionError::SendFailed("broken pipe".into()));
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<InboundEvent, ConnectionError>> {
        let next = self.inbound.lock().unwrap().pop_front();
        match next {
            Some(event) => Some(Ok(event)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Devices
// ============================================================================

pub const CAMERA_TAG: u8 = 0xCA;
pub const SCREEN_TAG: u8 = 0x5C;

#[derive(Default)]
pub struct FakeDevices {
    /// Capture kinds in the order frames were grabbed
    pub captures: Arc<Mutex<Vec<CaptureKind>>>,
    /// PCM written to the speaker, in write order
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,
    pub fail_microphone: bool,
    /// How long each microphone read blocks
    pub mic_delay: Duration,
    /// Captures left to fail before frames are produced
    pub capture_failures: Arc<AtomicUsize>,
}

impl FakeDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mic_delay: Duration::from_millis(5),
            ..Self::default()
        })
    }

    pub fn without_microphone() -> Arc<Self> {
        Arc::new(Self {
            fail_microphone: true,
            ..Self::default()
        })
    }

    pub fn with_mic_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            mic_delay: delay,
            ..Self::default()
        })
    }

    pub fn failing_captures(count: usize) -> Arc<Self> {
        Arc::new(Self {
            mic_delay: Duration::from_millis(5),
            capture_failures: Arc::new(AtomicUsize::new(count)),
            ..Self::default()
        })
    }

    pub fn captured(&self, kind: CaptureKind) -> usize {
        self.captures
            .lock()
            .unwrap()
            .iter()
            .filter(|&&captured| captured == kind)
            .count()
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }
}

impl DeviceProvider for FakeDevices {
    fn open_capture(&self, kind: CaptureKind) -> Result<Box<dyn CaptureSource>, DeviceError> {
        Ok(Box::new(FakeCapture {
            kind,
            captures: Arc::clone(&self.captures),
            failures: Arc::clone(&self.capture_failures),
        }))
    }

    fn open_microphone(&self, format: &AudioFormat) -> Result<Box<dyn MicDevice>, DeviceError> {
        if self.fail_microphone {
            return Err(DeviceError::unavailable("microphone", "no input device"));
        }
        Ok(Box::new(FakeMic {
            bytes: format.chunk_bytes(),
            delay: self.mic_delay,
        }))
    }

    fn open_speaker(&self, _format: &AudioFormat) -> Result<Box<dyn SpeakerDevice>, DeviceError> {
        Ok(Box::new(FakeSpeaker {
            played: Arc::clone(&self.played),
        }))
    }
}

struct FakeCapture {
    kind: CaptureKind,
    captures: Arc<Mutex<Vec<CaptureKind>>>,
    failures: Arc<AtomicUsize>,
}

impl CaptureSource for FakeCapture {
    fn capture_once(&mut self) -> Result<Option<Frame>, DeviceError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DeviceError::read_failed(self.kind.as_str(), "grab failed"));
        }

        self.captures.lock().unwrap().push(self.kind);
        let tag = match self.kind {
            CaptureKind::Camera => CAMERA_TAG,
            CaptureKind::Screen => SCREEN_TAG,
        };
        Ok(Some(Frame::jpeg(vec![0xFF, 0xD8, tag])))
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}

struct FakeMic {
    bytes: usize,
    delay: Duration,
}

impl MicDevice for FakeMic {
    fn read_chunk(&mut self, _frames: usize) -> Result<Vec<u8>, DeviceError> {
        std::thread::sleep(self.delay);
        Ok(vec![1u8; self.bytes])
    }
}

struct FakeSpeaker {
    played: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SpeakerDevice for FakeSpeaker {
    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        self.played.lock().unwrap().push(pcm.to_vec());
        Ok(())
    }
}
