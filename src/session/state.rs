//! Lifecycle state, video mode, and the cross-thread cells that hold them.
//!
//! The state machine is:
//!
//! ```text
//! Inactive ──start──▶ Connecting ──connected──▶ Active
//!                         └────connect failed───▶ Inactive
//! Active ──stop──▶ Stopping ──workers joined, closed──▶ Inactive
//! ```
//!
//! `Connecting` and `Stopping` only exist while a `start`/`stop` call is in
//! flight and are never reported by `status()`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::devices::CaptureKind;
use crate::error::StateError;

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SessionState {
    Inactive = 0,
    Connecting = 1,
    Active = 2,
    Stopping = 3,
}

impl SessionState {
    /// The state as seen by external callers.
    ///
    /// Transient sub-states report the state the in-flight call started from.
    pub fn observed(self) -> Self {
        match self {
            SessionState::Connecting => SessionState::Inactive,
            SessionState::Stopping => SessionState::Active,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Inactive => "inactive",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Stopping => "stopping",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Active,
            3 => SessionState::Stopping,
            _ => SessionState::Inactive,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which video source feeds the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum VideoMode {
    #[default]
    None = 0,
    Camera = 1,
    Screen = 2,
}

impl VideoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoMode::None => "none",
            VideoMode::Camera => "camera",
            VideoMode::Screen => "screen",
        }
    }

    /// Capture device for this mode, if any
    pub fn capture_kind(&self) -> Option<CaptureKind> {
        match self {
            VideoMode::None => None,
            VideoMode::Camera => Some(CaptureKind::Camera),
            VideoMode::Screen => Some(CaptureKind::Screen),
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => VideoMode::Camera,
            2 => VideoMode::Screen,
            _ => VideoMode::None,
        }
    }
}

impl FromStr for VideoMode {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(VideoMode::None),
            "camera" => Ok(VideoMode::Camera),
            "screen" => Ok(VideoMode::Screen),
            other => Err(StateError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by `status()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub mode: VideoMode,
}

/// Lock-free cell holding the lifecycle state
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SessionState::Inactive as u8))
    }

    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Current video mode, shared with the capture worker.
///
/// Outlives individual sessions so the last mode survives `stop()`.
#[derive(Debug, Clone, Default)]
pub struct SharedMode(Arc<AtomicU8>);

impl SharedMode {
    pub fn new(mode: VideoMode) -> Self {
        Self(Arc::new(AtomicU8::new(mode as u8)))
    }

    pub fn get(&self) -> VideoMode {
        VideoMode::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store `mode` and return the previous one
    pub fn swap(&self, mode: VideoMode) -> VideoMode {
        VideoMode::from_u8(self.0.swap(mode as u8, Ordering::SeqCst))
    }
}

/// Cooperative cancellation flag for one session's workers.
///
/// Workers check [`is_active`](Self::is_active) once per iteration and idle
/// with [`pause`](Self::pause), which returns early once the flag clears.
/// Blocking device calls are not interrupted.
#[derive(Debug, Clone)]
pub struct ActiveFlag {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ActiveFlag {
    /// A new flag in the active position
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(true), Condvar::new())),
        }
    }

    pub fn is_active(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the flag and wake every paused worker
    pub fn deactivate(&self) {
        let (lock, wakeup) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = false;
        wakeup.notify_all();
    }

    /// Sleep up to `duration`, returning early if the flag clears.
    ///
    /// Returns whether the flag is still active.
    pub fn pause(&self, duration: Duration) -> bool {
        let (lock, wakeup) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wakeup
            .wait_timeout_while(guard, duration, |active| *active)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

impl Default for ActiveFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("camera".parse::<VideoMode>().unwrap(), VideoMode::Camera);
        assert_eq!("screen".parse::<VideoMode>().unwrap(), VideoMode::Screen);
        assert_eq!("none".parse::<VideoMode>().unwrap(), VideoMode::None);
        assert_eq!(
            "Camera".parse::<VideoMode>().unwrap_err(),
            StateError::InvalidMode("Camera".into())
        );
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&VideoMode::Screen).unwrap(), "\"screen\"");
        let mode: VideoMode = serde_json::from_str("\"camera\"").unwrap();
        assert_eq!(mode, VideoMode::Camera);
    }

    #[test]
    fn test_transient_states_are_not_observed() {
        assert_eq!(SessionState::Connecting.observed(), SessionState::Inactive);
        assert_eq!(SessionState::Stopping.observed(), SessionState::Active);
        assert_eq!(SessionState::Active.observed(), SessionState::Active);
        assert_eq!(SessionState::Inactive.observed(), SessionState::Inactive);
    }

    #[test]
    fn test_state_cell_round_trips_every_state() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), SessionState::Inactive);
        for state in [
            SessionState::Connecting,
            SessionState::Active,
            SessionState::Stopping,
            SessionState::Inactive,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_shared_mode_swap() {
        let mode = SharedMode::new(VideoMode::Camera);
        let clone = mode.clone();
        assert_eq!(clone.swap(VideoMode::Screen), VideoMode::Camera);
        assert_eq!(mode.get(), VideoMode::Screen);
    }

    #[test]
    fn test_pause_wakes_on_deactivate() {
        let flag = ActiveFlag::new();
        let waker = flag.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            waker.deactivate();
        });

        let started = Instant::now();
        assert!(!flag.pause(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!flag.is_active());
        handle.join().unwrap();
    }

    #[test]
    fn test_pause_times_out_while_active() {
        let flag = ActiveFlag::new();
        assert!(flag.pause(Duration::from_millis(10)));
        assert!(flag.is_active());
    }
}
