//! Per-event planning endpoints and the finance summary.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;

use crate::assistant::snapshot::FinanceSnapshot;
use crate::error::ApiError;
use crate::planning::budget::BudgetSummary;
use crate::planning::guests::SeatingChart;
use crate::services::planning::{self, ContractUpload};
use crate::state::AppState;

/// GET /api/events/{id}/budget
pub async fn budget(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Json<BudgetSummary> {
    Json(planning::budget(state.backend.as_ref(), &event_id).await)
}

/// GET /api/events/{id}/guests
pub async fn guests(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Json<SeatingChart> {
    Json(planning::seating_chart(state.backend.as_ref(), &event_id).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub guest_id: String,
    /// `null` unseats the guest.
    #[serde(default)]
    pub table_id: Option<String>,
}

/// POST /api/events/{id}/seating/move
pub async fn move_guest(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<SeatingChart>, ApiError> {
    let chart = planning::move_guest_to_table(
        state.backend.as_ref(),
        &event_id,
        &req.guest_id,
        req.table_id.as_deref(),
    )
    .await?;
    Ok(Json(chart))
}

/// GET /api/finance/summary
pub async fn finance_summary(State(state): State<Arc<AppState>>) -> Json<FinanceSnapshot> {
    let today = state.config().today();
    Json(planning::finance_summary(state.backend.as_ref(), today).await)
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

/// POST /api/events/{id}/contracts?filename=
pub async fn upload_contract(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ContractUpload>, ApiError> {
    let client = state
        .client
        .clone()
        .ok_or_else(|| ApiError::unavailable("Backend is not configured"))?;
    let bucket = state.config.read().backend.contracts_bucket.clone();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let upload = planning::upload_contract(
        &client,
        &bucket,
        &event_id,
        &params.filename,
        body.to_vec(),
        &content_type,
    )
    .await?;
    Ok(Json(upload))
}
