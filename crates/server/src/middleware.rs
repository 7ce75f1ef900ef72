//! Request-ID generation and access logging.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::response::generate_request_id;
use crate::state::AppState;

/// Per-request id, available to handlers via `Extension<RequestId>` and
/// echoed back as `X-Request-ID`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = generate_request_id();
    let method = request.method().clone();
    // Log the route template, not the raw path, to keep label cardinality flat.
    let path = request
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status();
    state
        .metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), path.as_str(), status.as_str()])
        .inc();
    state
        .metrics
        .http_request_duration_seconds
        .with_label_values(&[method.as_str(), path.as_str()])
        .observe(elapsed.as_secs_f64());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-ID", value);
    }

    info!(
        "[{}] {} {} → {} ({} ms)",
        request_id,
        method,
        path,
        status.as_u16(),
        elapsed.as_millis(),
    );

    response
}
