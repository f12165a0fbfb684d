use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::dispatch::dispatch_session;
use crate::errors::AppError;
use crate::intake::multipart::read_resume_form;
use crate::intake::read_upload;
use crate::sessions::{Session, TextSource};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub resume_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetTextRequest {
    pub resume_text: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub result_id: Uuid,
    pub session_id: Uuid,
    pub parsed_resume: Value,
    pub display_url: String,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> (StatusCode, Json<Session>) {
    let Json(req) = body.unwrap_or_default();
    let session = state.sessions.create(req.resume_text).await;
    (StatusCode::CREATED, Json(session))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.sessions.get(id).await?))
}

/// DELETE /api/v1/sessions/:id
///
/// Drops the session and every result it produced.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    let dropped = state.results.remove_for_session(id).await;
    info!("Session {id} deleted with {dropped} result(s)");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/sessions/:id/text
pub async fn handle_set_text(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetTextRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .sessions
        .set_text(id, req.resume_text, TextSource::Manual)
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/:id/upload
///
/// Multipart with exactly one `resume` file. On a read failure the session's
/// text is left as it was.
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Session>, AppError> {
    // Fail fast on unknown sessions before reading the body.
    state.sessions.get(id).await?;

    let upload = read_resume_form(multipart)
        .await?
        .file
        .ok_or_else(|| AppError::Validation("No resume file provided".to_string()))?;
    let filename = upload.filename.clone();

    let decoded = read_upload(upload, state.config.max_upload_bytes).await?;
    let session = state
        .sessions
        .accept_upload(id, decoded.text, filename, decoded.format)
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/:id/parse
///
/// Sends the session's text to the model. Returns 409 without calling the
/// model when a parse is already running for this session.
pub async fn handle_parse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParseResponse>, AppError> {
    let stored = dispatch_session(&state.sessions, &state.results, state.llm.clone(), id).await?;

    Ok(Json(ParseResponse {
        display_url: format!("/parsed?result_id={}", stored.id),
        result_id: stored.id,
        session_id: stored.session_id,
        parsed_resume: stored.parsed_resume,
    }))
}
