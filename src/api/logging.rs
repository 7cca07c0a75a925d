//! Request logging middleware.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;
    let status = response.status();
    let elapsed = start.elapsed().as_millis();

    if status.is_server_error() {
        log::warn!("{} {} -> {} ({}ms)", method, path, status.as_u16(), elapsed);
    } else {
        log::info!("{} {} -> {} ({}ms)", method, path, status.as_u16(), elapsed);
    }
    response
}
