//! Error types for assistant calls and the HTTP surface
//!
//! Errors are classified by recoverability:
//! - Retryable: Network issues, timeouts, rate limits, backend 5xx
//! - NonRetryable: Bad input, malformed responses
//! - RequiresUserAction: Missing configuration, expired sign-in

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::db::DbError;
use crate::planning::guests::SeatingError;

/// Errors from the hosted inference endpoint.
#[derive(Debug, Error)]
pub enum AssistantError {
    // Retryable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Model did not answer within {0} seconds")]
    Timeout(u64),

    #[error("Inference rate limit exceeded")]
    RateLimited,

    #[error("Inference endpoint error {status}: {message}")]
    Http { status: u16, message: String },

    // Non-retryable errors
    #[error("Failed to parse inference response: {0}")]
    Parse(String),

    #[error("Model returned an empty answer")]
    EmptyCompletion,

    // Requires user action
    #[error("Inference endpoint is not configured")]
    NotConfigured,

    #[error("Inference endpoint rejected the API key")]
    Unauthorized,
}

impl AssistantError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            AssistantError::Network(_)
            | AssistantError::Timeout(_)
            | AssistantError::RateLimited => true,
            AssistantError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            AssistantError::NotConfigured | AssistantError::Unauthorized
        )
    }

    /// Short machine-readable tag stored as `meta.fallback_reason`.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AssistantError::Network(_) => "network",
            AssistantError::Timeout(_) => "timeout",
            AssistantError::RateLimited => "rate_limited",
            AssistantError::Http { .. } => "upstream_error",
            AssistantError::Parse(_) => "bad_response",
            AssistantError::EmptyCompletion => "empty_answer",
            AssistantError::NotConfigured => "not_configured",
            AssistantError::Unauthorized => "unauthorized",
        }
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AssistantError::Network(_) => "Check the server's internet connection and try again.",
            AssistantError::Timeout(_) => "The model took too long. Try again.",
            AssistantError::RateLimited => "Wait a few minutes and try again.",
            AssistantError::Http { .. } => "The inference provider is having trouble. Try again later.",
            AssistantError::Parse(_) | AssistantError::EmptyCompletion => {
                "Try rephrasing the question."
            }
            AssistantError::NotConfigured => {
                "Set ai.apiKey in ~/.plannerdesk/config.json or PLANNERDESK_AI_KEY."
            }
            AssistantError::Unauthorized => "Check the inference API key.",
        }
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AssistantError::Parse(err.to_string())
        } else {
            AssistantError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

/// Serializable error returned by every API handler.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_suggestion: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>, error_type: ErrorType) -> Self {
        ApiError {
            status,
            message: message.into(),
            error_type,
            can_retry: error_type == ErrorType::Retryable,
            recovery_suggestion: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, ErrorType::NonRetryable)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, ErrorType::NonRetryable)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message,
            ErrorType::RequiresUserAction,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            ErrorType::NonRetryable,
        )
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.recovery_suggestion = Some(suggestion.into());
        self
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match &err {
            BackendError::NotConfigured(_) => ApiError::unavailable(err.to_string())
                .with_suggestion("Set backend.url and backend.apiKey in ~/.plannerdesk/config.json"),
            BackendError::Unauthorized => ApiError::new(
                StatusCode::UNAUTHORIZED,
                err.to_string(),
                ErrorType::RequiresUserAction,
            )
            .with_suggestion("Sign in again."),
            _ if err.is_retryable() => {
                ApiError::new(StatusCode::BAD_GATEWAY, err.to_string(), ErrorType::Retryable)
            }
            BackendError::Http { status: 404, .. } => ApiError::not_found(err.to_string()),
            BackendError::InvalidObjectPath(_) => ApiError::bad_request(err.to_string()),
            _ => ApiError::new(StatusCode::BAD_GATEWAY, err.to_string(), ErrorType::NonRetryable),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        log::error!("Local store error: {}", err);
        ApiError::internal(err.to_string())
    }
}

impl From<SeatingError> for ApiError {
    fn from(err: SeatingError) -> Self {
        match err {
            SeatingError::GuestNotFound(_) | SeatingError::TableNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            _ => ApiError::new(StatusCode::CONFLICT, err.to_string(), ErrorType::NonRetryable),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}
