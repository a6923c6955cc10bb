use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Conversation services
        .route("/api/speech-to-text", post(handlers::speech_to_text))
        .route("/api/generate-reply", post(handlers::generate_reply))
        .route("/api/correct-text", post(handlers::correct_text))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
