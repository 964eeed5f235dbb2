use super::state::AppState;
use crate::error::{Error, StateError};
use crate::session::{SessionController, SessionState, VideoMode};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    /// "camera", "screen" or "none" (default: none)
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    #[serde(default)]
    pub text: String,
}

/// Body of every control response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    /// "success" or "error"
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<VideoMode>,
}

impl ApiResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            mode: None,
        }
    }

    fn with_mode(mut self, mode: VideoMode) -> Self {
        self.mode = Some(mode);
        self
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            mode: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// "active" or "inactive"
    pub status: SessionState,
    pub mode: VideoMode,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/start
/// Connect to the remote service and start every pipeline
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<ModeRequest>,
) -> Response {
    // Lifecycle errors take precedence over a bad mode
    if state.controller.status().state == SessionState::Active {
        return failure("start session", StateError::AlreadyActive.into());
    }

    let mode = match parse_mode(req.mode.as_deref()) {
        Ok(mode) => mode,
        Err(response) => return response,
    };

    match blocking(&state, move |controller| controller.start(mode)).await {
        Ok(()) => ok(ApiResponse::success("Session started").with_mode(mode)),
        Err(e) => failure("start session", e),
    }
}

/// POST /api/stop
/// Stop the session and close the connection
pub async fn stop_session(State(state): State<AppState>) -> Response {
    match blocking(&state, |controller| controller.stop()).await {
        Ok(()) => ok(ApiResponse::success("Session stopped")),
        Err(e) => failure("stop session", e),
    }
}

/// POST /api/change_mode
/// Switch the video source of the running session
pub async fn change_mode(
    State(state): State<AppState>,
    Json(req): Json<ModeRequest>,
) -> Response {
    if state.controller.status().state != SessionState::Active {
        return failure("change mode", StateError::NotActive.into());
    }

    let mode = match parse_mode(req.mode.as_deref()) {
        Ok(mode) => mode,
        Err(response) => return response,
    };

    match blocking(&state, move |controller| controller.change_mode(mode)).await {
        Ok(()) => ok(ApiResponse::success(format!("Mode changed to {}", mode)).with_mode(mode)),
        Err(e) => failure("change mode", e),
    }
}

/// POST /api/send_text
/// Send one text turn to the remote service; delivery failures are only logged
pub async fn send_text(
    State(state): State<AppState>,
    Json(req): Json<SendTextRequest>,
) -> Response {
    match blocking(&state, move |controller| controller.send_text(&req.text)).await {
        Ok(()) => ok(ApiResponse::success("Text sent")),
        Err(e) => failure("send text", e),
    }
}

/// GET /api/status
/// Current state and mode
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.status();
    Json(StatusResponse {
        status: status.state,
        mode: status.mode,
    })
}

/// GET /api/stats
/// Pipeline counters of the current or last session
pub async fn get_stats(State(state): State<AppState>) -> Response {
    match state.controller.stats() {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("No session has run yet")),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_mode(mode: Option<&str>) -> Result<VideoMode, Response> {
    mode.unwrap_or("none").parse::<VideoMode>().map_err(|e| {
        (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))).into_response()
    })
}

/// Run a lifecycle call on the blocking pool; they wait on threads and the bridge
async fn blocking<F>(state: &AppState, call: F) -> Result<(), Error>
where
    F: FnOnce(&SessionController) -> Result<(), Error> + Send + 'static,
{
    let controller = Arc::clone(&state.controller);
    match tokio::task::spawn_blocking(move || call(&controller)).await {
        Ok(result) => result,
        Err(e) => {
            error!("Session control task failed: {}", e);
            Err(Error::Internal(e.to_string()))
        }
    }
}

fn ok(body: ApiResponse) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn failure(action: &str, e: Error) -> Response {
    let status = if e.is_state() {
        StatusCode::BAD_REQUEST
    } else {
        error!("Failed to {}: {}", action, e);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(ApiResponse::error(e.to_string()))).into_response()
}
