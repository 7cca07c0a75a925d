//! Settings: priority weights and local flags (session/consent/UI toggles).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db::DbFlag;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::PriorityWeights;

/// GET /api/settings/weights
pub async fn get_weights(State(state): State<Arc<AppState>>) -> Json<PriorityWeights> {
    Json(state.config.read().pipeline.weights)
}

/// PUT /api/settings/weights
pub async fn put_weights(
    State(state): State<Arc<AppState>>,
    Json(weights): Json<PriorityWeights>,
) -> Result<Json<PriorityWeights>, ApiError> {
    let values = [
        weights.stage,
        weights.overdue_follow_up,
        weights.upcoming_event,
        weights.stale_interaction,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ApiError::bad_request("Weights must be finite numbers"));
    }
    Ok(Json(state.set_weights(weights)?))
}

fn validate_key(key: &str) -> Result<(), ApiError> {
    let ok = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("Invalid flag key: {}", key)))
    }
}

fn store_unavailable() -> ApiError {
    ApiError::unavailable("Local store is unavailable")
}

/// GET /api/flags/{key}
pub async fn get_flag(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<DbFlag>, ApiError> {
    validate_key(&key)?;
    state
        .with_db(|db| db.get_flag(&key))
        .ok_or_else(store_unavailable)??
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Flag not set: {}", key)))
}

#[derive(Debug, Deserialize)]
pub struct FlagValue {
    pub value: String,
}

/// PUT /api/flags/{key}
pub async fn put_flag(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(body): Json<FlagValue>,
) -> Result<Json<DbFlag>, ApiError> {
    validate_key(&key)?;
    let flag = state
        .with_db(|db| {
            db.set_flag(&key, &body.value)?;
            db.get_flag(&key)
        })
        .ok_or_else(store_unavailable)??
        .ok_or_else(|| ApiError::internal("Flag vanished after write"))?;
    Ok(Json(flag))
}

/// DELETE /api/flags/{key}
pub async fn delete_flag(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_key(&key)?;
    let removed = state
        .with_db(|db| db.remove_flag(&key))
        .ok_or_else(store_unavailable)??;
    Ok(if removed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}
