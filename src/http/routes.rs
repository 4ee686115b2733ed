use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Upload cap for advance submissions. Long memos produce WAV payloads
/// well past axum's 2 MB default; anything under this bound reaches the
/// handler and is chunked downstream if the transcription API needs it.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Initial record for a fresh operator session
        .route("/", get(handlers::initial_record))
        // Submit current recording, receive the next record
        .route("/advance", post(handlers::advance))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
