//! Remote connection adapter for the Gemini Live bidirectional API
//!
//! Speaks the `BidiGenerateContent` WebSocket protocol: one setup message,
//! then realtime media chunks and text turns out, server content in.

mod client;
pub mod messages;

pub use client::{LiveAdapter, LiveConfig};
