use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Monotonic event counter shared between workers
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Live counters for one session's pipelines
#[derive(Debug)]
pub struct PipelineCounters {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    ended_at: Mutex<Option<DateTime<Utc>>>,

    pub frames_captured: Counter,
    pub frames_sent: Counter,
    pub frames_dropped: Counter,
    pub capture_errors: Counter,

    pub audio_chunks_captured: Counter,
    pub audio_chunks_sent: Counter,
    pub audio_chunks_dropped: Counter,

    pub playback_chunks_received: Counter,
    pub playback_chunks_played: Counter,
    pub playback_chunks_dropped: Counter,
    pub text_messages_received: Counter,

    pub send_failures: Counter,
    pub bridge_timeouts: Counter,
}

impl PipelineCounters {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            ended_at: Mutex::new(None),
            frames_captured: Counter::default(),
            frames_sent: Counter::default(),
            frames_dropped: Counter::default(),
            capture_errors: Counter::default(),
            audio_chunks_captured: Counter::default(),
            audio_chunks_sent: Counter::default(),
            audio_chunks_dropped: Counter::default(),
            playback_chunks_received: Counter::default(),
            playback_chunks_played: Counter::default(),
            playback_chunks_dropped: Counter::default(),
            text_messages_received: Counter::default(),
            send_failures: Counter::default(),
            bridge_timeouts: Counter::default(),
        }
    }

    pub(crate) fn mark_ended(&self) {
        let mut ended = self.ended_at.lock().unwrap_or_else(|e| e.into_inner());
        ended.get_or_insert_with(Utc::now);
    }

    pub fn snapshot(&self) -> SessionStats {
        let ended_at = *self.ended_at.lock().unwrap_or_else(|e| e.into_inner());
        let until = ended_at.unwrap_or_else(Utc::now);
        let duration = until.signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.session_id.clone(),
            is_active: ended_at.is_none(),
            started_at: self.started_at,
            ended_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_captured: self.frames_captured.get(),
            frames_sent: self.frames_sent.get(),
            frames_dropped: self.frames_dropped.get(),
            capture_errors: self.capture_errors.get(),
            audio_chunks_captured: self.audio_chunks_captured.get(),
            audio_chunks_sent: self.audio_chunks_sent.get(),
            audio_chunks_dropped: self.audio_chunks_dropped.get(),
            playback_chunks_received: self.playback_chunks_received.get(),
            playback_chunks_played: self.playback_chunks_played.get(),
            playback_chunks_dropped: self.playback_chunks_dropped.get(),
            text_messages_received: self.text_messages_received.get(),
            send_failures: self.send_failures.get(),
            bridge_timeouts: self.bridge_timeouts.get(),
        }
    }
}

/// Statistics about a live session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Local session identifier (e.g., "session-6f1c…")
    pub session_id: String,

    /// Whether the session is still running
    pub is_active: bool,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session stopped, if it has
    pub ended_at: Option<DateTime<Utc>>,

    /// Total duration in seconds
    pub duration_secs: f64,

    pub frames_captured: u64,
    pub frames_sent: u64,
    /// Frames evicted from a full video queue
    pub frames_dropped: u64,
    pub capture_errors: u64,

    pub audio_chunks_captured: u64,
    pub audio_chunks_sent: u64,
    /// Chunks evicted from the outbound audio queue
    pub audio_chunks_dropped: u64,

    /// Inbound audio chunks queued for playback
    pub playback_chunks_received: u64,
    pub playback_chunks_played: u64,
    pub playback_chunks_dropped: u64,
    pub text_messages_received: u64,

    pub send_failures: u64,
    pub bridge_timeouts: u64,
}
