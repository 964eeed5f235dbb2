//! Producer/consumer loops run by each session.
//!
//! ```text
//! capture ──▶ video queue ──▶ video sender ──┐
//! microphone ──▶ audio-out queue ──▶ audio sender ──┼──▶ dispatch bridge ──▶ remote
//! speaker ◀── audio player ◀── audio-in queue ◀── response receiver ◀──┘
//! ```
//!
//! Every loop checks the session's active flag once per iteration. Failures
//! inside an iteration are logged and never escape the thread.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::session::SessionShared;
use super::stats::Counter;
use crate::bridge::{InboundEvent, Outbound};
use crate::devices::{AudioChunk, CaptureKind, CaptureSource};
use crate::queue::BoundedQueue;

type WorkerBody = fn(Arc<SessionShared>);

/// Thread name and body for every worker a session runs
pub(crate) const PIPELINE: &[(&str, WorkerBody)] = &[
    ("video-capture", capture_frames),
    ("video-sender", send_frames),
    ("audio-capture", record_audio),
    ("audio-sender", send_audio),
    ("response-receiver", receive_responses),
    ("audio-player", play_audio),
];

/// Poll the capture source for the current mode once per capture interval.
pub(crate) fn capture_frames(session: Arc<SessionShared>) {
    info!("Capture producer started");
    let config = &session.config;
    let mut source: Option<(CaptureKind, Box<dyn CaptureSource>)> = None;

    while session.active.is_active() {
        let Some(kind) = session.mode.get().capture_kind() else {
            // Release the device while no video is wanted
            source = None;
            session.active.pause(config.capture_interval);
            continue;
        };

        if source.as_ref().map(|(open, _)| *open) != Some(kind) {
            match session.devices.open_capture(kind) {
                Ok(opened) => {
                    info!("Capturing from {}", opened.name());
                    source = Some((kind, opened));
                }
                Err(e) => {
                    warn!("Error opening {} capture: {}", kind.as_str(), e);
                    session.counters.capture_errors.inc();
                    source = None;
                    session.active.pause(config.capture_backoff);
                    continue;
                }
            }
        }

        let Some((_, capture)) = source.as_mut() else {
            continue;
        };

        match capture.capture_once() {
            Ok(Some(frame)) => {
                session.counters.frames_captured.inc();
                if session.video.push(frame).is_some() {
                    session.counters.frames_dropped.inc();
                    debug!("Video queue full, dropped oldest frame");
                }
            }
            Ok(None) => debug!("No frame from {} this cycle", capture.name()),
            Err(e) => {
                warn!("Error capturing images: {}", e);
                session.counters.capture_errors.inc();
                session.active.pause(config.capture_backoff);
                continue;
            }
        }

        session.active.pause(config.capture_interval);
    }

    info!("Capture producer stopped");
}

pub(crate) fn send_frames(session: Arc<SessionShared>) {
    info!("Video sender started");
    forward(
        &session,
        &session.video,
        Outbound::Frame,
        session.config.video_poll,
        &session.counters.frames_sent,
    );
    info!("Video sender stopped");
}

/// Read fixed-size chunks from the microphone until the session stops.
///
/// A device failure ends this loop until the next session.
pub(crate) fn record_audio(session: Arc<SessionShared>) {
    let format = session.config.audio_input;
    let mut mic = match session.devices.open_microphone(&format) {
        Ok(mic) => mic,
        Err(e) => {
            error!("Error recording audio: {}", e);
            return;
        }
    };
    info!(
        "Audio capture started ({}Hz, {} channels, {} frames per chunk)",
        format.sample_rate, format.channels, format.chunk_frames
    );

    while session.active.is_active() {
        match mic.read_chunk(format.chunk_frames) {
            Ok(pcm) => {
                session.counters.audio_chunks_captured.inc();
                if session.audio_out.push(AudioChunk::new(pcm)).is_some() {
                    session.counters.audio_chunks_dropped.inc();
                    debug!("Audio-out queue over its cap, dropped oldest chunk");
                }
            }
            Err(e) => {
                error!("Error recording audio: {}", e);
                break;
            }
        }
    }

    info!("Audio capture stopped");
}

pub(crate) fn send_audio(session: Arc<SessionShared>) {
    info!("Audio sender started");
    forward(
        &session,
        &session.audio_out,
        Outbound::Audio,
        session.config.audio_poll,
        &session.counters.audio_chunks_sent,
    );
    info!("Audio sender stopped");
}

/// Drain inbound events through the bridge and route them.
pub(crate) fn receive_responses(session: Arc<SessionShared>) {
    info!("Response receiver started");

    while session.active.is_active() {
        if session.bridge.is_connected() {
            match session.bridge.drain() {
                Ok(events) => {
                    for event in events {
                        route_event(&session, event);
                    }
                }
                Err(e) if e.is_timeout() => {
                    session.counters.bridge_timeouts.inc();
                    warn!("Receive drain timed out, retrying: {}", e);
                }
                Err(e) => warn!("Error in receive operation: {}", e),
            }
        }

        session.active.pause(session.config.receive_poll);
    }

    info!("Response receiver stopped");
}

/// Write inbound audio to the speaker in arrival order.
pub(crate) fn play_audio(session: Arc<SessionShared>) {
    let mut speaker = match session.devices.open_speaker(&session.config.audio_output) {
        Ok(speaker) => speaker,
        Err(e) => {
            error!("Error setting up audio playback: {}", e);
            return;
        }
    };
    info!("Audio player started");

    while session.active.is_active() {
        let Some(pcm) = session.audio_in.pop() else {
            session.active.pause(session.config.playback_poll);
            continue;
        };

        match speaker.write(&pcm) {
            Ok(()) => session.counters.playback_chunks_played.inc(),
            Err(e) => {
                warn!("Error playing audio: {}", e);
                session.active.pause(session.config.playback_backoff);
            }
        }
    }

    info!("Audio player stopped");
}

fn route_event(session: &SessionShared, event: InboundEvent) {
    if let Some(pcm) = event.audio.filter(|pcm| !pcm.is_empty()) {
        session.counters.playback_chunks_received.inc();
        if session.audio_in.push(pcm).is_some() {
            session.counters.playback_chunks_dropped.inc();
            warn!("Playback is falling behind, dropped oldest inbound audio");
        }
    }

    if let Some(text) = event.text.filter(|text| !text.is_empty()) {
        session.counters.text_messages_received.inc();
        info!(target: "live_session::transcript", "Received text: {}", text);
    }

    if event.turn_complete {
        debug!("Remote turn complete");
    }
}

/// Pop items off `queue` and send each through the bridge while connected.
fn forward<T>(
    session: &SessionShared,
    queue: &BoundedQueue<T>,
    wrap: fn(T) -> Outbound,
    poll: Duration,
    sent: &Counter,
) {
    while session.active.is_active() {
        if queue.is_empty() || !session.bridge.is_connected() {
            session.active.pause(poll);
            continue;
        }

        let Some(item) = queue.pop() else {
            continue;
        };

        let payload = wrap(item);
        let kind = payload.kind();
        match session.bridge.send(payload) {
            Ok(()) => sent.inc(),
            Err(e) if e.is_timeout() => {
                session.counters.bridge_timeouts.inc();
                warn!("Dropped {} after bridge timeout: {}", kind, e);
            }
            Err(e) => {
                session.counters.send_failures.inc();
                warn!("Error sending {}: {}", kind, e);
                session.active.pause(poll);
            }
        }
    }
}
