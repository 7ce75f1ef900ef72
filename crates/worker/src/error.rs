use thiserror::Error;
use uuid::Uuid;

use blogqa_crawler::CrawlError;
use blogqa_llm::{EmbeddingError, LlmError, OutputError};
use blogqa_store::StoreError;

/// Anything the orchestrator can fail with. The worker runtime uses
/// [`ProcessError::is_retryable`] plus the attempt count to decide
/// retry vs fail; only the runtime writes audit rows.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM output rejected: {0}")]
    Output(#[from] OutputError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("publisher {0} not found for leased entry")]
    PublisherMissing(Uuid),
}

impl ProcessError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessError::Crawl(e) => e.is_retryable(),
            ProcessError::Llm(e) => e.is_retryable(),
            // Schema violations retry within the attempt budget; the cap
            // turns a repeatedly-invalid response into a terminal failure.
            ProcessError::Output(_) => true,
            ProcessError::Embedding(e) => e.is_retryable(),
            ProcessError::Store(_) => true,
            ProcessError::PublisherMissing(_) => false,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ProcessError::Crawl(e) => e.error_type(),
            ProcessError::Llm(_) => "LLM_ERROR",
            ProcessError::Output(_) => "LLM_OUTPUT_INVALID",
            ProcessError::Embedding(_) => "EMBEDDING_ERROR",
            ProcessError::Store(_) => "STORE_ERROR",
            ProcessError::PublisherMissing(_) => "PUBLISHER_MISSING",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_client_error_is_fatal() {
        let err = ProcessError::Crawl(CrawlError::Status {
            status: 404,
            url: "https://example.com/gone".into(),
        });
        assert!(!err.is_retryable());
        assert_eq!(err.error_type(), "CRAWL_CLIENT_ERROR");
    }

    #[test]
    fn crawl_server_error_is_retryable() {
        let err = ProcessError::Crawl(CrawlError::Status {
            status: 503,
            url: "https://example.com/busy".into(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn output_violations_are_retryable() {
        let err = ProcessError::Output(OutputError::NoJson);
        assert!(err.is_retryable());
        assert_eq!(err.error_type(), "LLM_OUTPUT_INVALID");
    }

    #[test]
    fn llm_rate_limit_is_retryable_but_refusal_is_not() {
        let rate = ProcessError::Llm(LlmError::ApiError {
            status: 429,
            body: "slow down".into(),
        });
        assert!(rate.is_retryable());

        let refusal = ProcessError::Llm(LlmError::ApiError {
            status: 400,
            body: "content policy".into(),
        });
        assert!(!refusal.is_retryable());
    }

    #[test]
    fn missing_publisher_is_fatal() {
        let err = ProcessError::PublisherMissing(Uuid::new_v4());
        assert!(!err.is_retryable());
    }
}
