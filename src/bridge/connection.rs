use crate::devices::{AudioChunk, Frame};
use crate::error::ConnectionError;

/// Payload submitted to the remote service
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(Frame),
    Audio(AudioChunk),
    /// A complete user turn
    Text(String),
}

impl Outbound {
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Frame(_) => "frame",
            Outbound::Audio(_) => "audio",
            Outbound::Text(_) => "text",
        }
    }
}

/// One event received from the remote service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEvent {
    /// Raw PCM to play back
    pub audio: Option<Vec<u8>>,
    /// Text to forward to the log sink
    pub text: Option<String>,
    /// The service finished its turn
    pub turn_complete: bool,
}

impl InboundEvent {
    pub fn audio(pcm: Vec<u8>) -> Self {
        Self {
            audio: Some(pcm),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn turn_complete() -> Self {
        Self {
            turn_complete: true,
            ..Default::default()
        }
    }
}

/// Opens connections to the remote service.
///
/// Only ever invoked from the dispatch bridge thread.
#[async_trait::async_trait]
pub trait ConnectionAdapter: Send + Sync {
    /// Open a new duplex connection.
    ///
    /// The bridge bounds this call with its connect timeout.
    async fn connect(&self) -> Result<Box<dyn ConnectionHandle>, ConnectionError>;

    /// Adapter name for logging
    fn name(&self) -> &str;
}

/// An open duplex connection.
///
/// Not safe for concurrent use; the dispatch bridge is its only caller.
#[async_trait::async_trait]
pub trait ConnectionHandle: Send {
    /// Opaque remote session identifier
    fn session_id(&self) -> &str;

    async fn send(&mut self, payload: Outbound) -> Result<(), ConnectionError>;

    /// Next inbound event, or `None` once the stream has ended.
    ///
    /// Must be cancel-safe: the bridge stops waiting when its drain window
    /// closes. Once it returns `None` the stream cannot be restarted.
    async fn next_event(&mut self) -> Option<Result<InboundEvent, ConnectionError>>;

    async fn close(&mut self) -> Result<(), ConnectionError>;
}
