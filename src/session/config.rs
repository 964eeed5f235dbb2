use std::time::Duration;

use crate::bridge::BridgeConfig;
use crate::devices::AudioFormat;

/// Configuration for a live session's pipelines
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Dispatch bridge timing (call timeout, connect timeout, drain window)
    pub bridge: BridgeConfig,

    /// How long `stop()` waits for each worker before abandoning it
    /// Default: 1 second
    pub join_timeout: Duration,

    /// Video capture cadence (default: 1 frame per second)
    pub capture_interval: Duration,

    /// Pause after a failed capture before retrying
    pub capture_backoff: Duration,

    /// Frames buffered before the oldest is dropped (default: 5)
    pub video_queue_capacity: usize,

    /// Idle poll interval for the video sender
    pub video_poll: Duration,

    /// Microphone format (16kHz mono, 1024-frame chunks)
    pub audio_input: AudioFormat,

    /// Speaker format (24kHz mono)
    pub audio_output: AudioFormat,

    /// Outbound audio chunks kept before the oldest is dropped (default: 10)
    pub audio_out_soft_cap: usize,

    /// Inbound audio chunks buffered for playback before dropping the oldest
    pub audio_in_capacity: usize,

    /// Idle poll interval for the audio sender
    pub audio_poll: Duration,

    /// Pause between inbound drains
    pub receive_poll: Duration,

    /// Idle poll interval for the audio player
    pub playback_poll: Duration,

    /// Pause after a failed speaker write
    pub playback_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            join_timeout: Duration::from_secs(1),
            capture_interval: Duration::from_secs(1),
            capture_backoff: Duration::from_secs(1),
            video_queue_capacity: 5,
            video_poll: Duration::from_millis(100),
            audio_input: AudioFormat::input(),
            audio_output: AudioFormat::output(),
            audio_out_soft_cap: 10,
            audio_in_capacity: 512,
            audio_poll: Duration::from_millis(10),
            receive_poll: Duration::from_millis(100),
            playback_poll: Duration::from_millis(10),
            playback_backoff: Duration::from_millis(100),
        }
    }
}
