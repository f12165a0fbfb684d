pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::dispatch::handlers as dispatch;
use crate::results::handlers as results;
use crate::sessions::handlers as sessions;
use crate::state::AppState;

/// Room for multipart framing on top of the file itself, so oversized files
/// reach the intake size check instead of failing mid-stream.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Input surface
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        .route("/api/v1/sessions/:id/text", put(sessions::handle_set_text))
        .route("/api/v1/sessions/:id/upload", post(sessions::handle_upload))
        .route("/api/v1/sessions/:id/parse", post(sessions::handle_parse))
        .route("/api/v1/parse", post(dispatch::handle_parse_once))
        .route(
            "/api/v1/parse_resume",
            post(dispatch::handle_parse_resume_json),
        )
        // Display surface
        .route("/api/v1/results/:id", get(results::handle_get_result))
        .route("/parsed", get(results::handle_display))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
