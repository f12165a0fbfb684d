use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::intake::ReadError;
use crate::llm_client::LlmError;

/// Message shown for any failure while reading an uploaded file.
pub const READ_FAILED_MESSAGE: &str = "Error reading file. Please try again.";
/// Message shown for any failure between dispatch and a decoded result.
pub const PROCESSING_FAILED_MESSAGE: &str = "Error processing resume. Please try again.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Detail is logged when the response is built; clients only ever see the
/// generic message for read, transport and decode failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Session {0} is already processing")]
    AlreadyProcessing(uuid::Uuid),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http(_) | LlmError::Api { .. } => AppError::Transport(err.to_string()),
            LlmError::EmptyContent | LlmError::Parse(_) => AppError::Decode(err.to_string()),
        }
    }
}

impl AppError {
    /// Stable machine-readable code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Read(_) => "READ_ERROR",
            AppError::AlreadyProcessing(_) => "ALREADY_PROCESSING",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Decode(_) => "DECODE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The text a user sees for this error.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::Validation(msg) => msg.clone(),
            AppError::Read(_) => READ_FAILED_MESSAGE.to_string(),
            AppError::AlreadyProcessing(_) => {
                "This resume is already being processed.".to_string()
            }
            AppError::Transport(_) | AppError::Decode(_) => PROCESSING_FAILED_MESSAGE.to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Read(e) => {
                tracing::warn!("File reading error: {e}");
                StatusCode::BAD_REQUEST
            }
            AppError::AlreadyProcessing(_) => StatusCode::CONFLICT,
            AppError::Transport(msg) => {
                tracing::error!("Transport error: {msg}");
                StatusCode::BAD_GATEWAY
            }
            AppError::Decode(msg) => {
                tracing::error!("Decode error: {msg}");
                StatusCode::BAD_GATEWAY
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.user_message()
            }
        }));

        (status, body).into_response()
    }
}
