//! Liveness endpoint.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status; always `healthy` while the process serves.
    pub status: &'static str,
    /// Current server time.
    pub timestamp: chrono::DateTime<Utc>,
    /// Build version.
    pub version: &'static str,
}

/// Health routes, mounted unauthenticated.
pub fn health_routes<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
