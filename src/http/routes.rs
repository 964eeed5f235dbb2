use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/api/start", post(handlers::start_session))
        .route("/api/stop", post(handlers::stop_session))
        .route("/api/change_mode", post(handlers::change_mode))
        .route("/api/send_text", post(handlers::send_text))
        // Session queries
        .route("/api/status", get(handlers::get_status))
        .route("/api/stats", get(handlers::get_stats))
        // The browser frontend is served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
