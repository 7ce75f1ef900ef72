//! Shared HTTP plumbing for the provider and embedding backends.
//!
//! Every backend speaks the same dialect: POST a JSON body, treat any
//! non-2xx as an API error carrying the response text, decode the rest.
//! [`CallError`] is the common failure shape; each backend family converts
//! it into its own error type.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::embedding::EmbeddingError;
use crate::provider::LlmError;

/// Hard cap on any single provider call. Generation against long articles
/// can be slow, but nothing should hold a worker past this.
const CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// A reqwest client with the provider timeout applied.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(CALL_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// What a provider call can fail with before backend-specific parsing.
#[derive(Debug)]
pub(crate) enum CallError {
    Transport(reqwest::Error),
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<CallError> for LlmError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(e) => LlmError::HttpError(e),
            CallError::Status { status, body } => LlmError::ApiError { status, body },
        }
    }
}

impl From<CallError> for EmbeddingError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(e) => EmbeddingError::Http(e),
            CallError::Status { status, body } => {
                EmbeddingError::Api(format!("{status}: {body}"))
            }
        }
    }
}

/// Send a prepared request and decode the JSON response.
///
/// Non-2xx responses become [`CallError::Status`] with the body preserved,
/// since providers put the useful diagnostics (rate limits, content policy
/// refusals) in the response text.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, CallError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CallError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_maps_into_both_error_families() {
        let err = CallError::Status {
            status: 429,
            body: "slow down".into(),
        };
        let llm: LlmError = err.into();
        assert!(matches!(llm, LlmError::ApiError { status: 429, .. }));
        assert!(llm.is_retryable());

        let err = CallError::Status {
            status: 400,
            body: "bad input".into(),
        };
        let emb: EmbeddingError = err.into();
        assert!(matches!(emb, EmbeddingError::Api(_)));
        assert!(!emb.is_retryable());
    }

    #[test]
    fn embedding_api_error_keeps_status_prefix() {
        let err = CallError::Status {
            status: 503,
            body: "overloaded".into(),
        };
        let emb: EmbeddingError = err.into();
        // The status prefix is what EmbeddingError::is_retryable keys on.
        assert!(emb.is_retryable());
        assert!(emb.to_string().contains("503"));
    }
}
