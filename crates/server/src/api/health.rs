//! Liveness and metrics endpoints (no auth).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub llm_configured: bool,
    pub uptime_seconds: u64,
}

/// GET /health: always 200; `status` flips to `degraded` when a dependency
/// is down so orchestrators can keep the pod while alerting.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = tokio::time::timeout(
        Duration::from_secs(2),
        sqlx::query("SELECT 1").execute(&state.pool),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    let llm_configured = state.config.llm.is_configured();

    Json(HealthResponse {
        status: if database && llm_configured { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        llm_configured,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// GET /metrics: Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}
