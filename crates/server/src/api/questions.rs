//! Widget-facing question endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;
use tracing::info;

use blogqa_store::content;

use crate::auth;
use crate::check_and_load::{self, BlogInfo, QuestionView};
use crate::middleware::RequestId;
use crate::response::{ok, ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BlogUrlQuery {
    pub blog_url: String,
}

/// GET /api/v1/questions/check-and-load
///
/// Fast path when questions exist; otherwise drives the queue state machine
/// and reports the current processing status.
pub async fn check_and_load(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<BlogUrlQuery>,
) -> Response {
    match check_and_load_inner(&state, &headers, &query.blog_url, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn check_and_load_inner(
    state: &AppState,
    headers: &HeaderMap,
    blog_url: &str,
    rid: &str,
) -> ApiResult<Response> {
    let publisher = auth::require_publisher(state, headers).await?;
    let normalized_url = blogqa_core::url::normalize(blog_url)?;
    info!("[{}] Check-and-load for {}", rid, normalized_url);

    auth::check_admission(&publisher, &normalized_url)?;

    let result = check_and_load::check_and_load(state, &publisher, &normalized_url).await?;

    state
        .metrics
        .check_and_load_total
        .with_label_values(&[result.processing_status.as_str()])
        .inc();

    let message = result.message.clone();
    Ok(ok(rid, StatusCode::OK, &message, result))
}

/// GET /api/v1/questions/by-url: fast-path read only; 404 when absent.
pub async fn questions_by_url(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<BlogUrlQuery>,
) -> Response {
    match by_url_inner(&state, &headers, &query.blog_url, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn by_url_inner(
    state: &AppState,
    headers: &HeaderMap,
    blog_url: &str,
    rid: &str,
) -> ApiResult<Response> {
    use rand::seq::SliceRandom;

    let publisher = auth::require_publisher(state, headers).await?;
    let normalized_url = blogqa_core::url::normalize(blog_url)?;
    auth::check_active(&publisher)?;
    auth::check_domain(&publisher, &normalized_url)?;

    let mut questions = content::get_questions(&state.pool, &normalized_url, None).await?;
    if questions.is_empty() {
        return Err(ApiError::not_found(format!(
            "no questions found for URL: {blog_url}"
        )));
    }

    questions.shuffle(&mut rand::thread_rng());
    let question_count = questions.len();

    let blog = content::get_blog(&state.pool, &normalized_url).await?;
    let views: Vec<QuestionView> = questions
        .into_iter()
        .map(|q| QuestionView {
            id: q.id,
            question: q.question,
            answer: q.answer,
        })
        .collect();

    let blog_info = blog.map(|b| BlogInfo {
        id: b.id,
        title: b.title,
        url: normalized_url.clone(),
        author: b.author.unwrap_or_default(),
        published_date: b.published_date.unwrap_or_default(),
        question_count,
    });

    Ok(ok(
        rid,
        StatusCode::OK,
        "Questions retrieved successfully",
        serde_json::json!({
            "questions": views,
            "blog_info": blog_info,
        }),
    ))
}
