//! HTTP API server for external control (browser frontend)
//!
//! This module provides a REST API for controlling the live session:
//! - POST /api/start - Start a session in a video mode
//! - POST /api/stop - Stop the session
//! - POST /api/change_mode - Switch between camera, screen and none
//! - POST /api/send_text - Send a text turn
//! - GET /api/status - Query state and mode
//! - GET /api/stats - Pipeline counters
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::ApiResponse;
pub use routes::create_router;
pub use state::AppState;
