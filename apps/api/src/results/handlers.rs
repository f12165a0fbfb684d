use axum::{
    extract::{Path, Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::results::{display::render_page, StoredResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DisplayQuery {
    // Kept as text so a malformed id renders the empty page instead of a 400.
    pub result_id: Option<String>,
}

/// GET /api/v1/results/:id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredResult>, AppError> {
    state
        .results
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Result {id} not found")))
}

/// GET /parsed
///
/// Display page. A missing, malformed or unknown `result_id` renders the
/// empty page.
pub async fn handle_display(
    State(state): State<AppState>,
    Query(query): Query<DisplayQuery>,
) -> Html<String> {
    let stored = match query.result_id.as_deref().map(Uuid::parse_str) {
        Some(Ok(id)) => state.results.get(id).await,
        _ => None,
    };
    Html(render_page(stored.as_ref().map(|r| &r.parsed_resume)))
}
