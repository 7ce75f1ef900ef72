//! Standardized response envelope and API error type.
//!
//! Every endpoint returns the same shape: a success envelope wrapping the
//! result, or an error envelope with a machine-readable code. Handlers build
//! successes with [`ok`] and bubble [`ApiError`] for everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use blogqa_store::StoreError;

/// Generate a request id (`req_` + 12 hex chars).
pub fn generate_request_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("req_{}", &hex[..12])
}

/// Build a success envelope response.
pub fn ok<T: Serialize>(
    request_id: &str,
    status: StatusCode,
    message: &str,
    result: T,
) -> Response {
    let body = json!({
        "status": "success",
        "status_code": status.as_u16(),
        "message": message,
        "result": result,
        "request_id": request_id,
        "timestamp": Utc::now(),
    });
    (status, Json(body)).into_response()
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub detail: String,
    pub field: Option<&'static str>,
    pub request_id: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: &str, detail: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.to_string(),
            detail: detail.into(),
            field: None,
            request_id: None,
        }
    }

    pub fn validation(detail: impl Into<String>, field: &'static str) -> Self {
        let mut err = Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "Invalid request",
            detail,
        );
        err.field = Some(field);
        err
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication required",
            detail,
        )
    }

    pub fn forbidden(code: &'static str, message: &str, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found", detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", "Conflict", detail)
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "UPSTREAM",
            "Upstream provider failure",
            detail,
        )
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Internal server error",
            detail,
        )
    }

    /// Attach the request id from the middleware.
    pub fn rid(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsageLimitExceeded { limit } => Self::forbidden(
                "DAILY_LIMIT_REACHED",
                "Daily blog limit reached",
                format!("daily blog processing limit reached ({limit} per day)"),
            ),
            StoreError::NotFound(what) => Self::not_found(format!("{what} not found")),
            StoreError::Conflict(detail) => Self::conflict(detail),
            StoreError::Database(e) => Self::internal(e.to_string()),
            StoreError::Migration(e) => Self::internal(e.to_string()),
        }
    }
}

impl From<blogqa_core::CoreError> for ApiError {
    fn from(err: blogqa_core::CoreError) -> Self {
        Self::validation(err.to_string(), "blog_url")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.unwrap_or_else(generate_request_id);
        let mut error = json!({
            "code": self.code,
            "detail": self.detail,
        });
        if let Some(field) = self.field {
            error["field"] = json!(field);
        }
        let body = json!({
            "status": "error",
            "status_code": self.status.as_u16(),
            "message": self.message,
            "error": error,
            "request_id": request_id,
            "timestamp": Utc::now(),
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_prefixed_and_unique() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert!(a.starts_with("req_"));
        assert_eq!(a.len(), 4 + 12);
        assert_ne!(a, b);
    }

    #[test]
    fn store_limit_error_maps_to_403() {
        let err: ApiError = StoreError::UsageLimitExceeded { limit: 100 }.into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "DAILY_LIMIT_REACHED");
        assert!(err.detail.contains("100"));
    }

    #[test]
    fn store_not_found_maps_to_404() {
        let err: ApiError = StoreError::NotFound("publisher").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn validation_error_carries_field() {
        let err = ApiError::validation("not a URL", "blog_url");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.field, Some("blog_url"));
    }

    #[test]
    fn core_url_error_is_validation() {
        let err: ApiError = blogqa_core::CoreError::InvalidUrl("x".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "VALIDATION");
    }

    #[tokio::test]
    async fn success_envelope_shape() {
        use http_body_util::BodyExt;

        let response = ok(
            "req_abc123def456",
            StatusCode::OK,
            "All good",
            serde_json::json!({ "value": 42 }),
        );
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.expect("body").to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["status"], "success");
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["message"], "All good");
        assert_eq!(json["result"]["value"], 42);
        assert_eq!(json["request_id"], "req_abc123def456");
        assert!(json["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        use http_body_util::BodyExt;

        let err = ApiError::forbidden(
            "DOMAIN_MISMATCH",
            "Blog URL domain mismatch",
            "host 'evil.com' does not match 'example.com'",
        )
        .rid("req_abc123def456");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = response.into_body().collect().await.expect("body").to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["status"], "error");
        assert_eq!(json["status_code"], 403);
        assert_eq!(json["error"]["code"], "DOMAIN_MISMATCH");
        assert!(json["error"]["detail"].as_str().expect("detail").contains("evil.com"));
        assert_eq!(json["request_id"], "req_abc123def456");
    }
}
