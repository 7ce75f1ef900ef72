//! Explicit enqueue and admin job inspection endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use blogqa_store::{audit, publisher, queue, QueueStatus};

use crate::auth::{self, SlotReservation};
use crate::middleware::RequestId;
use crate::response::{ok, ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub blog_url: String,
}

/// POST /api/v1/jobs/process: explicit enqueue, no fast path.
pub async fn job_process(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<ProcessRequest>,
) -> Response {
    match process_inner(&state, &headers, &body.blog_url, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn process_inner(
    state: &AppState,
    headers: &HeaderMap,
    blog_url: &str,
    rid: &str,
) -> ApiResult<Response> {
    let pool = &state.pool;
    let publisher = auth::require_publisher(state, headers).await?;
    let normalized_url = blogqa_core::url::normalize(blog_url)?;
    info!("[{}] Explicit enqueue for {}", rid, normalized_url);

    auth::check_admission(&publisher, &normalized_url)?;

    // Reservation comes before the queue write; every early exit below
    // that doesn't keep it must roll it back.
    let reservation = SlotReservation::take(pool, publisher.id).await?;

    let (entry, created) = match queue::get_or_create(pool, &normalized_url, publisher.id).await {
        Ok(v) => v,
        Err(e) => {
            reservation.rollback(pool).await;
            return Err(e.into());
        }
    };

    let (entry, outcome) = if created {
        match queue::assign_job_id(pool, &normalized_url).await {
            Ok(Some(admitted)) => {
                reservation.keep();
                (admitted, "created")
            }
            Ok(None) => {
                reservation.rollback(pool).await;
                (entry, "existing")
            }
            Err(e) => {
                reservation.rollback(pool).await;
                return Err(e.into());
            }
        }
    } else {
        match entry.status {
            QueueStatus::Failed => match queue::requeue_failed(pool, &normalized_url, true, false).await {
                Ok(Some(requeued)) => {
                    reservation.keep();
                    (requeued, "requeued")
                }
                Ok(None) => {
                    reservation.rollback(pool).await;
                    (entry, "existing")
                }
                Err(e) => {
                    reservation.rollback(pool).await;
                    return Err(e.into());
                }
            },
            QueueStatus::Completed => match queue::requeue_completed(pool, &normalized_url).await {
                Ok(Some(requeued)) => {
                    reservation.keep();
                    (requeued, "reprocess")
                }
                Ok(None) => {
                    reservation.rollback(pool).await;
                    (entry, "existing")
                }
                Err(e) => {
                    reservation.rollback(pool).await;
                    return Err(e.into());
                }
            },
            QueueStatus::Queued if entry.current_job_id.is_none() => {
                // Threshold-gated entry: an explicit enqueue admits it.
                match queue::assign_job_id(pool, &normalized_url).await {
                    Ok(Some(admitted)) => {
                        reservation.keep();
                        (admitted, "admitted")
                    }
                    Ok(None) => {
                        reservation.rollback(pool).await;
                        (entry, "existing")
                    }
                    Err(e) => {
                        reservation.rollback(pool).await;
                        return Err(e.into());
                    }
                }
            }
            _ => {
                // Already queued, processing, or retrying; don't double-book.
                reservation.rollback(pool).await;
                (entry, "existing")
            }
        }
    };

    state
        .metrics
        .jobs_enqueued_total
        .with_label_values(&[outcome])
        .inc();

    Ok(ok(
        rid,
        StatusCode::ACCEPTED,
        "Blog processing job enqueued",
        serde_json::json!({
            "blog_url": entry.url,
            "status": entry.status,
            "job_id": entry.current_job_id,
            "attempt_count": entry.attempt_count,
            "outcome": outcome,
        }),
    ))
}

/// GET /api/v1/jobs/status/{job_id}: admin job inspection.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> Response {
    match status_inner(&state, &headers, job_id, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn status_inner(
    state: &AppState,
    headers: &HeaderMap,
    job_id: Uuid,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;

    let entry = queue::get_by_job_id(&state.pool, job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))?;
    let attempts = audit::by_job_id(&state.pool, job_id).await?;

    Ok(ok(
        rid,
        StatusCode::OK,
        "Job status retrieved",
        serde_json::json!({
            "job": entry,
            "attempts": attempts,
        }),
    ))
}

/// GET /api/v1/jobs/stats: aggregate queue counts.
pub async fn job_stats(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
) -> Response {
    match stats_inner(&state, &headers, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn stats_inner(state: &AppState, headers: &HeaderMap, rid: &str) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let stats = queue::stats(&state.pool).await?;
    Ok(ok(
        rid,
        StatusCode::OK,
        "Queue stats retrieved",
        serde_json::json!({ "queue_stats": stats }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub blog_url: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 500)
}

/// GET /api/v1/jobs/history?blog_url=…: audit trail for one URL, newest first.
pub async fn job_history(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match history_inner(&state, &headers, query, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn history_inner(
    state: &AppState,
    headers: &HeaderMap,
    query: HistoryQuery,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let normalized_url = blogqa_core::url::normalize(&query.blog_url)?;
    let attempts =
        audit::history_for_url(&state.pool, &normalized_url, clamp_limit(query.limit)).await?;
    let request_metadata = blogqa_store::metadata::get(&state.pool, &normalized_url).await?;
    Ok(ok(
        rid,
        StatusCode::OK,
        "Audit history retrieved",
        serde_json::json!({
            "blog_url": normalized_url,
            "attempts": attempts,
            "request_metadata": request_metadata,
        }),
    ))
}

/// GET /api/v1/jobs/recent: most recent attempts across all URLs.
pub async fn job_recent(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response {
    match recent_inner(&state, &headers, query.limit, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn recent_inner(
    state: &AppState,
    headers: &HeaderMap,
    limit: i64,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let attempts = audit::recent(&state.pool, clamp_limit(limit)).await?;
    Ok(ok(
        rid,
        StatusCode::OK,
        "Recent attempts retrieved",
        serde_json::json!({ "attempts": attempts }),
    ))
}

/// GET /api/v1/jobs/failures: most recent failed attempts.
pub async fn job_failures(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response {
    match failures_inner(&state, &headers, query.limit, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn failures_inner(
    state: &AppState,
    headers: &HeaderMap,
    limit: i64,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let attempts =
        audit::by_status(&state.pool, blogqa_store::AuditStatus::Failed, clamp_limit(limit)).await?;
    Ok(ok(
        rid,
        StatusCode::OK,
        "Failed attempts retrieved",
        serde_json::json!({ "attempts": attempts }),
    ))
}

/// POST /api/v1/jobs/cancel/{job_id}: cancel while still queued.
pub async fn job_cancel(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> Response {
    match cancel_inner(&state, &headers, job_id, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn cancel_inner(
    state: &AppState,
    headers: &HeaderMap,
    job_id: Uuid,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let pool = &state.pool;

    let entry = queue::get_by_job_id(pool, job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))?;

    if entry.status != QueueStatus::Queued {
        return Err(ApiError::conflict(format!(
            "job cannot be cancelled in status '{}'",
            entry.status.as_str()
        )));
    }

    let deleted = queue::delete_if_queued(pool, &entry.url).await?;
    if !deleted {
        return Err(ApiError::conflict(
            "job was picked up by a worker before it could be cancelled",
        ));
    }

    // The admission that assigned this job id reserved a slot; hand it back.
    publisher::release_blog_slot(pool, entry.publisher_id, false).await?;
    info!("[{}] Cancelled job {} ({})", rid, job_id, entry.url);

    Ok(ok(
        rid,
        StatusCode::OK,
        "Job cancelled",
        serde_json::json!({ "job_id": job_id, "blog_url": entry.url, "cancelled": true }),
    ))
}
