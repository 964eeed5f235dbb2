//! Live session management
//!
//! This module provides the `SessionController` that manages:
//! - The session lifecycle state machine (start / stop / change mode)
//! - The dispatch bridge to the remote service
//! - Six worker pipelines (video capture/send, audio capture/send,
//!   response receive, playback)
//! - Session statistics

mod config;
mod controller;
mod session;
mod state;
mod stats;
mod workers;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use state::{ActiveFlag, SessionState, SessionStatus, SharedMode, VideoMode};
pub use stats::{Counter, PipelineCounters, SessionStats};
