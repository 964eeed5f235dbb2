//! Error types for live sessions.
//!
//! Errors fall into four categories:
//! - [`StateError`]: the operation is invalid for the current lifecycle state
//! - [`ConnectionError`]: the remote collaborator failed (connect/send/receive)
//! - [`DeviceError`]: a capture, microphone or speaker device failed
//! - [`TimeoutError`]: a dispatch bridge call exceeded its deadline
//!
//! Only `StateError` and a connect failure during `start` are surfaced to the
//! control surface. Everything else is logged inside the worker loops.

use std::time::Duration;

/// Top-level error returned by [`SessionController`](crate::SessionController) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// A worker or bridge thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error comes from a lifecycle check.
    pub fn is_state(&self) -> bool {
        matches!(self, Error::State(_))
    }

    /// Returns true if the bridge gave up waiting on this call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// The operation is not valid for the session's current state or input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Session already active")]
    AlreadyActive,

    #[error("No active session")]
    NotActive,

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("No text provided")]
    EmptyText,
}

/// Failures talking to the remote conversational service.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimedOut(Duration),

    #[error("no open connection")]
    NotConnected,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The inbound stream ended; a handle's stream is not restartable.
    #[error("inbound stream closed")]
    StreamClosed,

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The dispatch bridge thread is gone.
    #[error("dispatch bridge is not running")]
    BridgeClosed,
}

/// Failures from local capture and playback devices.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device unavailable: {name} - {reason}")]
    Unavailable { name: String, reason: String },

    #[error("{name} read failed: {reason}")]
    ReadFailed { name: String, reason: String },

    #[error("{name} write failed: {reason}")]
    WriteFailed { name: String, reason: String },

    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn read_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn write_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A bridge submission did not complete within its deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} timed out after {after:?}")]
pub struct TimeoutError {
    pub op: &'static str,
    pub after: Duration,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
