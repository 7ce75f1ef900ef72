//! Admin publisher CRUD.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use tracing::info;
use uuid::Uuid;

use blogqa_store::{publisher, NewPublisher, PublisherUpdate};

use crate::auth;
use crate::middleware::RequestId;
use crate::response::{ok, ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/v1/publishers
pub async fn publisher_create(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<NewPublisher>,
) -> Response {
    match create_inner(&state, &headers, body, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn create_inner(
    state: &AppState,
    headers: &HeaderMap,
    body: NewPublisher,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::validation("publisher name must not be empty", "name"));
    }
    if body.domain.trim().is_empty() || body.domain.contains('/') {
        return Err(ApiError::validation(
            "domain must be a bare hostname like 'example.com'",
            "domain",
        ));
    }

    let created = publisher::create(&state.pool, &body).await?;
    info!("[{}] Created publisher {} ({})", rid, created.name, created.id);
    Ok(ok(rid, StatusCode::CREATED, "Publisher created", created))
}

/// GET /api/v1/publishers
pub async fn publisher_list(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
) -> Response {
    match list_inner(&state, &headers, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn list_inner(state: &AppState, headers: &HeaderMap, rid: &str) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let publishers = publisher::list(&state.pool).await?;
    Ok(ok(rid, StatusCode::OK, "Publishers retrieved", publishers))
}

/// GET /api/v1/publishers/{id}
pub async fn publisher_get(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    match get_inner(&state, &headers, id, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn get_inner(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let found = publisher::get_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("publisher {id}")))?;
    Ok(ok(rid, StatusCode::OK, "Publisher retrieved", found))
}

/// PUT /api/v1/publishers/{id}
pub async fn publisher_update(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<PublisherUpdate>,
) -> Response {
    match update_inner(&state, &headers, id, body, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn update_inner(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    body: PublisherUpdate,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let updated = publisher::update(&state.pool, id, &body)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("publisher {id}")))?;
    info!("[{}] Updated publisher {}", rid, id);
    Ok(ok(rid, StatusCode::OK, "Publisher updated", updated))
}

/// DELETE /api/v1/publishers/{id}
pub async fn publisher_delete(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    match delete_inner(&state, &headers, id, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn delete_inner(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let deleted = publisher::delete(&state.pool, id).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("publisher {id}")));
    }
    info!("[{}] Deleted publisher {}", rid, id);
    Ok(ok(
        rid,
        StatusCode::OK,
        "Publisher deleted",
        serde_json::json!({ "id": id, "deleted": true }),
    ))
}

#[derive(Debug, serde::Deserialize)]
pub struct PublisherReportQuery {
    #[serde(default = "default_report_limit")]
    pub limit: i64,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_report_limit() -> i64 {
    50
}

/// GET /api/v1/publishers/{id}/audit: recent attempts for one publisher.
pub async fn publisher_audit(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<PublisherReportQuery>,
) -> Response {
    match audit_inner(&state, &headers, id, query.limit, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn audit_inner(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    limit: i64,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let attempts =
        blogqa_store::audit::for_publisher(&state.pool, id, limit.clamp(1, 500)).await?;
    Ok(ok(
        rid,
        StatusCode::OK,
        "Publisher audit retrieved",
        serde_json::json!({ "publisher_id": id, "attempts": attempts }),
    ))
}

/// GET /api/v1/publishers/{id}/queue: the publisher's queue entries.
pub async fn publisher_queue(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<PublisherReportQuery>,
) -> Response {
    match queue_inner(&state, &headers, id, query, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn queue_inner(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    query: PublisherReportQuery,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;

    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(
            blogqa_store::QueueStatus::parse(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown status '{raw}'"), "status"))?,
        ),
    };

    let entries = blogqa_store::queue::list_for_publisher(
        &state.pool,
        id,
        status,
        query.limit.clamp(1, 500),
    )
    .await?;

    Ok(ok(
        rid,
        StatusCode::OK,
        "Publisher queue retrieved",
        serde_json::json!({ "publisher_id": id, "entries": entries }),
    ))
}

/// POST /api/v1/publishers/{id}/regenerate-key
pub async fn publisher_regenerate_key(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    match regenerate_inner(&state, &headers, id, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn regenerate_inner(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let updated = publisher::regenerate_api_key(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("publisher {id}")))?;
    info!("[{}] Regenerated API key for publisher {}", rid, id);
    Ok(ok(rid, StatusCode::OK, "API key regenerated", updated))
}
