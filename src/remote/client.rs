use std::collections::VecDeque;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::{ClientContentMessage, RealtimeInputMessage, ServerMessage, SetupMessage};
use crate::bridge::{ConnectionAdapter, ConnectionHandle, InboundEvent, Outbound};
use crate::error::ConnectionError;

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-live-001";
pub const DEFAULT_VOICE: &str = "Puck";

type LiveStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where and how to open a live connection
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// WebSocket endpoint
    pub url: String,
    pub model: String,
    /// Prebuilt voice for audio responses
    pub voice: String,
    /// Appended as the `key` query parameter when set
    pub api_key: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            api_key: std::env::var("GEMINI_API_KEY").ok(),
        }
    }
}

impl LiveConfig {
    fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) if !key.is_empty() => format!("{}?key={}", self.url, key),
            _ => self.url.clone(),
        }
    }
}

pub struct LiveAdapter {
    config: LiveConfig,
}

impl LiveAdapter {
    pub fn new(config: LiveConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl ConnectionAdapter for LiveAdapter {
    async fn connect(&self) -> Result<Box<dyn ConnectionHandle>, ConnectionError> {
        info!("Connecting to {} ({})", self.config.url, self.config.model);

        let (mut ws, _) = tokio_tungstenite::connect_async(self.config.endpoint())
            .await
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

        let setup = SetupMessage::audio_response(&self.config.model, &self.config.voice);
        let payload =
            serde_json::to_string(&setup).map_err(|e| ConnectionError::Protocol(e.to_string()))?;
        ws.send(Message::Text(payload.into()))
            .await
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

        // Nothing else is valid until the server acknowledges the setup
        loop {
            let message = match ws.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(ConnectionError::ConnectFailed(e.to_string())),
                None => {
                    return Err(ConnectionError::ConnectFailed(
                        "connection closed during setup".to_string(),
                    ))
                }
            };

            let parsed = match &message {
                Message::Text(text) => serde_json::from_str::<ServerMessage>(text),
                Message::Binary(data) => serde_json::from_slice::<ServerMessage>(data),
                Message::Close(frame) => {
                    return Err(ConnectionError::ConnectFailed(format!(
                        "server closed during setup: {:?}",
                        frame
                    )))
                }
                _ => continue,
            };

            match parsed {
                Ok(reply) if reply.is_setup_complete() => break,
                Ok(_) => debug!("Ignoring message received before setup completed"),
                Err(e) => return Err(ConnectionError::Protocol(e.to_string())),
            }
        }

        let session_id = format!("live-{}", uuid::Uuid::new_v4());
        info!("Live session {} established", session_id);

        Ok(Box::new(LiveConnection {
            session_id,
            ws,
            pending: VecDeque::new(),
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "gemini-live"
    }
}

struct LiveConnection {
    session_id: String,
    ws: LiveStream,
    /// Events decoded from a message but not yet handed out
    pending: VecDeque<InboundEvent>,
    closed: bool,
}

#[async_trait::async_trait]
impl ConnectionHandle for LiveConnection {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn send(&mut self, payload: Outbound) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::NotConnected);
        }

        let encoded = match &payload {
            Outbound::Frame(frame) => serde_json::to_string(&RealtimeInputMessage::media(
                frame.mime_type(),
                frame.payload(),
            )),
            Outbound::Audio(chunk) => serde_json::to_string(&RealtimeInputMessage::media(
                chunk.mime_type(),
                chunk.payload(),
            )),
            Outbound::Text(text) => serde_json::to_string(&ClientContentMessage::user_text(text)),
        }
        .map_err(|e| ConnectionError::Protocol(e.to_string()))?;

        self.ws
            .send(Message::Text(encoded.into()))
            .await
            .map_err(|e| ConnectionError::SendFailed(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<Result<InboundEvent, ConnectionError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.closed {
                return None;
            }

            let message = match self.ws.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Some(Err(ConnectionError::ReceiveFailed(e.to_string()))),
                None => {
                    self.closed = true;
                    return None;
                }
            };

            let parsed = match &message {
                Message::Text(text) => serde_json::from_str::<ServerMessage>(text),
                Message::Binary(data) => serde_json::from_slice::<ServerMessage>(data),
                Message::Close(frame) => {
                    info!("Server closed live session {}: {:?}", self.session_id, frame);
                    self.closed = true;
                    return None;
                }
                _ => continue,
            };

            match parsed.map_err(|e| ConnectionError::Protocol(e.to_string())) {
                Ok(reply) => match reply.into_events() {
                    Ok(events) => self.pending.extend(events),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.ws.close(None).await {
            warn!("Error closing live session {}: {}", self.session_id, e);
        }
        Ok(())
    }
}
