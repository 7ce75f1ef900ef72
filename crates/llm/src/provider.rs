use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Trait for LLM providers — each backend implements this.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant's response text.
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;

    /// The model this provider instance is bound to.
    fn model(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} — {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Whether a failed call is worth retrying on a later attempt.
    ///
    /// Timeouts, connection failures, rate limits, and 5xx responses are
    /// transient. 4xx responses (bad request, content policy refusal,
    /// invalid key) will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::ApiError { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            LlmError::ParseError(_) => true,
            LlmError::NotConfigured(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_retryability() {
        let rate_limited = LlmError::ApiError {
            status: 429,
            body: "slow down".into(),
        };
        assert!(rate_limited.is_retryable());

        let server_error = LlmError::ApiError {
            status: 503,
            body: "overloaded".into(),
        };
        assert!(server_error.is_retryable());

        let bad_request = LlmError::ApiError {
            status: 400,
            body: "content policy".into(),
        };
        assert!(!bad_request.is_retryable());

        let unauthorized = LlmError::ApiError {
            status: 401,
            body: "invalid key".into(),
        };
        assert!(!unauthorized.is_retryable());
    }

    #[test]
    fn parse_errors_retry_within_budget() {
        assert!(LlmError::ParseError("missing field".into()).is_retryable());
    }

    #[test]
    fn misconfiguration_is_fatal() {
        assert!(!LlmError::NotConfigured("OPENAI_API_KEY not set".into()).is_retryable());
    }

    #[test]
    fn message_constructors() {
        let m = Message::system("be brief");
        assert!(matches!(m.role, Role::System));
        let m = Message::user("hello");
        assert!(matches!(m.role, Role::User));
        assert_eq!(m.content, "hello");
    }
}
