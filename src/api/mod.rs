//! HTTP API consumed by the dashboard UI.

pub mod assistant;
pub mod auth;
pub mod health;
pub mod logging;
pub mod pipeline;
pub mod planning;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;

const CONTRACT_BODY_LIMIT: usize = 20 * 1024 * 1024;
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;
const REQUEST_TIMEOUT_SECS: u64 = 30;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Create the combined router
pub fn router(state: Arc<AppState>) -> Router {
    let allowed_origins = state.config.read().server.allowed_origins.clone();

    // Contract uploads need a larger body limit
    let uploads = Router::new()
        .route(
            "/api/events/{id}/contracts",
            post(planning::upload_contract),
        )
        .layer(DefaultBodyLimit::max(CONTRACT_BODY_LIMIT));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/functions/v1/assistant", post(assistant::ask))
        .route("/api/assistant/stats", get(assistant::stats))
        .route("/api/pipeline/priorities", get(pipeline::priorities))
        .route("/api/pipeline/follow-ups", get(pipeline::follow_ups))
        .route("/api/pipeline/follow-ups/sync", post(pipeline::sync))
        .route("/api/pipeline/board", get(pipeline::board))
        .route(
            "/api/settings/weights",
            get(settings::get_weights).put(settings::put_weights),
        )
        .route(
            "/api/flags/{key}",
            get(settings::get_flag)
                .put(settings::put_flag)
                .delete(settings::delete_flag),
        )
        .route("/api/events/{id}/budget", get(planning::budget))
        .route("/api/events/{id}/guests", get(planning::guests))
        .route("/api/events/{id}/seating/move", post(planning::move_guest))
        .route("/api/finance/summary", get(planning::finance_summary))
        .route("/api/auth/sign-in", post(auth::sign_in))
        .route("/api/auth/sign-out", post(auth::sign_out))
        .route("/api/auth/session", get(auth::current_session))
        .merge(uploads)
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(middleware::from_fn(logging::log_requests))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(cors_layer(&allowed_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::provider::InferenceProvider;
    use crate::assistant::service::test_support::ScriptedProvider;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::{DataSource, Unconfigured};
    use crate::state::test_utils::test_state;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn seeded_backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "leads",
            vec![
                json!({ "id": "l1", "name": "Ana", "stage": "budgeting", "created_at": "2020-01-01" }),
                json!({ "id": "l2", "name": "Bia", "stage": "closed", "created_at": "2020-01-02" }),
            ],
        );
        backend
    }

    #[tokio::test]
    async fn health_reports_degraded_without_backend() {
        let state = test_state(Arc::new(Unconfigured("test".into())), None);
        let (status, body) = call(router(state), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["localStore"], true);
        assert!(body["assistantModel"].is_null());
    }

    #[tokio::test]
    async fn assistant_rejects_empty_question() {
        let state = test_state(seeded_backend(), None);
        let (status, body) = call(
            router(state),
            Method::POST,
            "/functions/v1/assistant",
            Some(json!({ "question": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["canRetry"], false);
    }

    #[tokio::test]
    async fn assistant_returns_envelope() {
        let provider: Arc<dyn InferenceProvider> = Arc::new(ScriptedProvider::answering("Hi!"));
        let state = test_state(seeded_backend(), Some(provider));
        let (status, body) = call(
            router(state),
            Method::POST,
            "/functions/v1/assistant",
            Some(json!({ "question": "what's pending?", "eventId": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Hi!");
        assert_eq!(body["meta"]["source"], "model");
        assert!(body["context"]["finance"].is_object());
    }

    #[tokio::test]
    async fn priorities_respect_limit_and_skip_closed() {
        let state = test_state(seeded_backend(), None);
        let (status, body) = call(
            router(state),
            Method::GET,
            "/api/pipeline/priorities?limit=5",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["leadId"], "l1");
    }

    #[tokio::test]
    async fn list_endpoints_degrade_to_empty() {
        let backend: Arc<dyn DataSource> = Arc::new(Unconfigured("test".into()));
        let state = test_state(backend, None);
        let (status, body) = call(router(state.clone()), Method::GET, "/api/pipeline/follow-ups", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = call(router(state), Method::GET, "/api/events/e1/guests", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"], json!([]));
    }

    #[tokio::test]
    async fn weights_round_trip() {
        let state = test_state(seeded_backend(), None);
        let (status, body) = call(
            router(state.clone()),
            Method::PUT,
            "/api/settings/weights",
            Some(json!({ "stage": 50, "overdueFollowUp": -1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], 50.0);
        assert_eq!(body["overdueFollowUp"], 0.0);

        let (_, body) = call(router(state), Method::GET, "/api/settings/weights", None).await;
        assert_eq!(body["stage"], 50.0);
        assert_eq!(body["upcomingEvent"], 25.0);
    }

    #[tokio::test]
    async fn flags_crud() {
        let state = test_state(seeded_backend(), None);
        let (status, _) = call(router(state.clone()), Method::GET, "/api/flags/consent.analytics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            router(state.clone()),
            Method::PUT,
            "/api/flags/consent.analytics",
            Some(json!({ "value": "granted" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], "granted");

        let (status, _) = call(router(state.clone()), Method::DELETE, "/api/flags/consent.analytics", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(router(state), Method::GET, "/api/flags/bad%20key!", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auth_without_backend_is_unavailable() {
        let state = test_state(seeded_backend(), None);
        let (status, body) = call(
            router(state),
            Method::POST,
            "/api/auth/sign-in",
            Some(json!({ "email": "a@b.co", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["errorType"], "requiresuseraction");
    }
}
