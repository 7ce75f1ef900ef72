//! Admin blog content inspection and deletion.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use blogqa_store::{content, metadata};

use crate::auth;
use crate::middleware::RequestId;
use crate::response::{ok, ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    pub blog_url: String,
}

/// GET /api/v1/blogs?blog_url=…: admin view of stored content for a URL.
pub async fn blog_inspect(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<BlogQuery>,
) -> Response {
    match inspect_inner(&state, &headers, &query.blog_url, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn inspect_inner(
    state: &AppState,
    headers: &HeaderMap,
    blog_url: &str,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;
    let normalized_url = blogqa_core::url::normalize(blog_url)?;

    let blog = content::get_blog(&state.pool, &normalized_url)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no blog stored for {blog_url}")))?;
    let summary = content::get_summary(&state.pool, &normalized_url).await?;
    let questions = content::get_questions(&state.pool, &normalized_url, None).await?;
    let request_count = metadata::get_count(&state.pool, &normalized_url).await?;

    Ok(ok(
        rid,
        StatusCode::OK,
        "Blog content retrieved",
        serde_json::json!({
            "blog": blog,
            "summary": summary,
            "question_count": questions.len(),
            "request_count": request_count,
        }),
    ))
}

/// DELETE /api/v1/blogs/{blog_id}: cascades to summary and questions.
pub async fn blog_delete(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Path(blog_id): Path<Uuid>,
) -> Response {
    match delete_inner(&state, &headers, blog_id, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn delete_inner(
    state: &AppState,
    headers: &HeaderMap,
    blog_id: Uuid,
    rid: &str,
) -> ApiResult<Response> {
    auth::require_admin(state, headers)?;

    let deleted = content::delete_blog(&state.pool, blog_id).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("blog {blog_id}")));
    }
    info!("[{}] Deleted blog {}", rid, blog_id);

    Ok(ok(
        rid,
        StatusCode::OK,
        "Blog deleted",
        serde_json::json!({ "blog_id": blog_id, "deleted": true }),
    ))
}
