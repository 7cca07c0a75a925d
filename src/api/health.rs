//! Health check endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let local_store = state.db.lock().is_some();
    let backend = state.client.is_some();
    let status = if local_store && backend { "ok" } else { "degraded" };
    Json(serde_json::json!({
        "status": status,
        "service": "plannerdesk",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": backend,
        "localStore": local_store,
        "assistantModel": state.provider.model(),
    }))
}
