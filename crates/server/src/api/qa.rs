//! Stateless Q&A answer generation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;

use blogqa_llm::prompt::QA_ANSWER_SYSTEM_PROMPT;
use blogqa_llm::{create_provider, LlmError, Message};

use crate::auth;
use crate::middleware::RequestId;
use crate::response::{ok, ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Optional grounding context (e.g. the blog summary the widget shows).
    #[serde(default)]
    pub context: Option<String>,
}

/// POST /api/v1/qa/ask
pub async fn qa_ask(
    State(state): State<Arc<AppState>>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<AskRequest>,
) -> Response {
    match ask_inner(&state, &headers, body, &rid.0).await {
        Ok(response) => response,
        Err(e) => e.rid(&rid.0).into_response(),
    }
}

async fn ask_inner(
    state: &AppState,
    headers: &HeaderMap,
    body: AskRequest,
    rid: &str,
) -> ApiResult<Response> {
    let publisher = auth::require_publisher(state, headers).await?;
    auth::check_active(&publisher)?;

    if body.question.trim().is_empty() {
        return Err(ApiError::validation("question must not be empty", "question"));
    }

    let provider = create_provider(&publisher.config.llm_model, &state.config.llm)
        .map_err(|e| ApiError::upstream(e.to_string()))?;

    let user_content = match &body.context {
        Some(context) if !context.trim().is_empty() => {
            format!("Context:\n{context}\n\nQuestion: {}", body.question)
        }
        _ => body.question.clone(),
    };

    let messages = vec![
        Message::system(QA_ANSWER_SYSTEM_PROMPT),
        Message::user(user_content),
    ];

    info!("[{}] Q&A ask via model {}", rid, publisher.config.llm_model);

    let answer = provider
        .complete(messages, state.config.llm.temperature, state.config.llm.max_tokens)
        .await
        .map_err(|e| match e {
            LlmError::NotConfigured(detail) => ApiError::internal(detail),
            other => ApiError::upstream(other.to_string()),
        })?;

    Ok(ok(
        rid,
        StatusCode::OK,
        "Answer generated",
        serde_json::json!({
            "question": body.question,
            "answer": answer,
            "model": publisher.config.llm_model,
        }),
    ))
}
