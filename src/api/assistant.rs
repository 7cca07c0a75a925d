//! The assistant function endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::assistant::{AssistantAnswer, AssistantRequest};
use crate::db::AssistantStats;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /functions/v1/assistant
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssistantRequest>,
) -> Result<Json<AssistantAnswer>, ApiError> {
    crate::services::assistant::ask(&state, &req.question, req.event_id.as_deref())
        .await
        .map(Json)
        .map_err(ApiError::bad_request)
}

/// GET /api/assistant/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<AssistantStats>, ApiError> {
    let stats = state
        .with_db(|db| db.assistant_stats())
        .ok_or_else(|| ApiError::unavailable("Local store is unavailable"))??;
    Ok(Json(stats))
}
