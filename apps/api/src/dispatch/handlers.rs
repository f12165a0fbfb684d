use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::parse_resume;
use crate::errors::AppError;
use crate::intake::multipart::read_resume_form;
use crate::intake::read_upload;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseResumeRequest {
    #[serde(default)]
    pub resume_content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseResumeResponse {
    pub parsed_resume: Value,
}

/// POST /api/v1/parse
///
/// One-shot parse without a session. Takes a `resume` file or a `resume_text`
/// field (the file wins when both are sent) and returns the model's JSON as-is.
pub async fn handle_parse_once(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = read_resume_form(multipart).await?;

    let resume_text = match (form.file, form.text) {
        (Some(upload), _) => {
            read_upload(upload, state.config.max_upload_bytes)
                .await?
                .text
        }
        (None, Some(text)) => text,
        (None, None) => {
            return Err(AppError::Validation(
                "No resume content provided".to_string(),
            ))
        }
    };

    let parsed = parse_resume(state.llm.as_ref(), &resume_text).await?;
    Ok(Json(parsed))
}

/// POST /api/v1/parse_resume
///
/// JSON variant of the one-shot parse: `{"resume_content": "..."}` in,
/// `{"parsed_resume": {...}}` out.
pub async fn handle_parse_resume_json(
    State(state): State<AppState>,
    Json(body): Json<ParseResumeRequest>,
) -> Result<Json<ParseResumeResponse>, AppError> {
    let resume_content = body
        .resume_content
        .filter(|content| !content.is_empty())
        .ok_or_else(|| AppError::Validation("Resume content is required".to_string()))?;

    let parsed_resume = parse_resume(state.llm.as_ref(), &resume_content).await?;
    Ok(Json(ParseResumeResponse { parsed_resume }))
}
