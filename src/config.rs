use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::BridgeConfig;
use crate::devices::{AudioFormat, DefaultDevices};
use crate::remote::LiveConfig;
use crate::session::SessionConfig;

/// Environment overrides look like `LIVE_SESSION__SERVICE__HTTP__PORT=8080`
const ENV_PREFIX: &str = "LIVE_SESSION";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionTimings,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "live-session".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionTimings {
    pub call_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub bridge_ready_timeout_ms: u64,
    pub drain_window_ms: u64,
    pub join_timeout_ms: u64,
    pub receive_poll_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            call_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            bridge_ready_timeout_ms: 500,
            drain_window_ms: 50,
            join_timeout_ms: 1_000,
            receive_poll_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub queue_capacity: usize,
    pub capture_interval_ms: u64,
    pub capture_backoff_ms: u64,
    pub send_poll_ms: u64,
    /// JPEG served in camera mode
    pub camera_image: Option<PathBuf>,
    /// JPEG served in screen mode
    pub screen_image: Option<PathBuf>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            capture_interval_ms: 1_000,
            capture_backoff_ms: 1_000,
            send_poll_ms: 100,
            camera_image: None,
            screen_image: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub send_sample_rate: u32,
    pub receive_sample_rate: u32,
    pub channels: u16,
    pub chunk_frames: usize,
    pub out_soft_cap: usize,
    pub in_capacity: usize,
    pub send_poll_ms: u64,
    pub playback_poll_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            send_sample_rate: 16000,
            receive_sample_rate: 24000,
            channels: 1,
            chunk_frames: 1024,
            out_soft_cap: 10,
            in_capacity: 512,
            send_poll_ms: 10,
            playback_poll_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: String,
    pub model: String,
    pub voice: String,
    /// Falls back to `GEMINI_API_KEY` when unset
    pub api_key: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let live = LiveConfig::default();
        Self {
            url: live.url,
            model: live.model,
            voice: live.voice,
            api_key: None,
        }
    }
}

impl Config {
    /// Load from `path` (any extension the `config` crate knows, optional)
    /// layered under `LIVE_SESSION__*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }

    pub fn session_config(&self) -> SessionConfig {
        let timings = &self.session;
        SessionConfig {
            bridge: BridgeConfig {
                call_timeout: millis(timings.call_timeout_ms),
                connect_timeout: millis(timings.connect_timeout_ms),
                ready_timeout: millis(timings.bridge_ready_timeout_ms),
                drain_window: millis(timings.drain_window_ms),
            },
            join_timeout: millis(timings.join_timeout_ms),
            capture_interval: millis(self.video.capture_interval_ms),
            capture_backoff: millis(self.video.capture_backoff_ms),
            video_queue_capacity: self.video.queue_capacity,
            video_poll: millis(self.video.send_poll_ms),
            audio_input: AudioFormat {
                sample_rate: self.audio.send_sample_rate,
                channels: self.audio.channels,
                chunk_frames: self.audio.chunk_frames,
            },
            audio_output: AudioFormat {
                sample_rate: self.audio.receive_sample_rate,
                channels: self.audio.channels,
                chunk_frames: self.audio.chunk_frames,
            },
            audio_out_soft_cap: self.audio.out_soft_cap,
            audio_in_capacity: self.audio.in_capacity,
            audio_poll: millis(self.audio.send_poll_ms),
            receive_poll: millis(timings.receive_poll_ms),
            playback_poll: millis(self.audio.playback_poll_ms),
            ..SessionConfig::default()
        }
    }

    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            url: self.remote.url.clone(),
            model: self.remote.model.clone(),
            voice: self.remote.voice.clone(),
            api_key: self
                .remote
                .api_key
                .clone()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok()),
        }
    }

    pub fn devices(&self) -> DefaultDevices {
        DefaultDevices {
            camera_image: self.video.camera_image.clone(),
            screen_image: self.video.screen_image.clone(),
        }
    }
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_session_defaults() {
        let session = Config::default().session_config();
        let expected = SessionConfig::default();

        assert_eq!(session.bridge.call_timeout, expected.bridge.call_timeout);
        assert_eq!(session.join_timeout, expected.join_timeout);
        assert_eq!(session.capture_interval, Duration::from_secs(1));
        assert_eq!(session.video_queue_capacity, 5);
        assert_eq!(session.audio_out_soft_cap, 10);
        assert_eq!(session.audio_input, AudioFormat::input());
        assert_eq!(session.audio_output, AudioFormat::output());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[service.http]\nport = 8088\n\n[video]\nqueue_capacity = 3\n\n[remote]\nvoice = \"Kore\""
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let config = Config::load(path).unwrap();

        assert_eq!(config.service.http.port, 8088);
        assert_eq!(config.service.http.bind, "0.0.0.0");
        assert_eq!(config.video.queue_capacity, 3);
        assert_eq!(config.remote.voice, "Kore");
        assert_eq!(config.remote.model, "models/gemini-2.0-flash-live-001");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/live-session").unwrap();
        assert_eq!(config.service.name, "live-session");
        assert_eq!(config.audio.chunk_frames, 1024);
    }
}
