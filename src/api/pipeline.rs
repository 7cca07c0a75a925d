//! Pipeline endpoints: priority queue, follow-ups, board.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::pipeline::board::PipelineBoard;
use crate::pipeline::followups::FollowUp;
use crate::pipeline::priority::PriorityItem;
use crate::services::pipeline::{self, SyncReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PriorityParams {
    pub limit: Option<usize>,
}

/// GET /api/pipeline/priorities?limit=
pub async fn priorities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PriorityParams>,
) -> Json<Vec<PriorityItem>> {
    let config = state.config();
    let today = config.today();
    Json(pipeline::priorities(state.backend.as_ref(), &config, today, params.limit).await)
}

/// GET /api/pipeline/follow-ups
pub async fn follow_ups(State(state): State<Arc<AppState>>) -> Json<Vec<FollowUp>> {
    let today = state.config().today();
    Json(pipeline::follow_ups(state.backend.as_ref(), today).await)
}

/// POST /api/pipeline/follow-ups/sync
pub async fn sync(State(state): State<Arc<AppState>>) -> Result<Json<SyncReport>, ApiError> {
    let today = state.config().today();
    let report = pipeline::sync_follow_ups(&state, today).await?;
    Ok(Json(report))
}

/// GET /api/pipeline/board
pub async fn board(State(state): State<Arc<AppState>>) -> Json<PipelineBoard> {
    Json(pipeline::board(state.backend.as_ref()).await)
}
