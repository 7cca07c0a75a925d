//! Sign-in / sign-out against the backend's auth endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::backend::{BackendClient, Session};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Session details safe to hand to the browser (no refresh token).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: i64,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            expires_at: session.expires_at,
        }
    }
}

fn client(state: &AppState) -> Result<Arc<BackendClient>, ApiError> {
    state
        .client
        .clone()
        .ok_or_else(|| ApiError::unavailable("Backend is not configured"))
}

/// POST /api/auth/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionInfo>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let client = client(&state)?;
    let session = client.sign_in_with_password(email, &req.password).await?;
    // Rows are scoped to the user, so sweep now rather than at the next tick.
    state.follow_up_wake.notify_one();
    Ok(Json(SessionInfo::from(&session)))
}

/// POST /api/auth/sign-out
pub async fn sign_out(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    let client = client(&state)?;
    client.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/session
pub async fn current_session(
    State(state): State<Arc<AppState>>,
) -> Json<Option<SessionInfo>> {
    let session = state.client.as_ref().and_then(|c| c.session());
    Json(session.as_ref().map(SessionInfo::from))
}
