use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedder not configured: {0}")]
    NotConfigured(String),
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // The API variant carries the formatted status line; rate limits
            // and server errors are the common transient cases.
            EmbeddingError::Api(msg) => {
                msg.starts_with("429") || msg.starts_with("5") || msg.starts_with("408")
            }
            EmbeddingError::DimensionMismatch { .. } => false,
            EmbeddingError::NotConfigured(_) => false,
        }
    }
}

/// Reject vectors whose width differs from the configured dimensionality
/// before they reach storage.
pub(crate) fn ensure_dimensions(expected: usize, vector: &[f32]) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input text (in order).
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Api("empty embedding response".into()))
    }

    /// The dimensionality of the output vectors.
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_retryability_by_status_prefix() {
        assert!(EmbeddingError::Api("429 Too Many Requests: slow down".into()).is_retryable());
        assert!(EmbeddingError::Api("503 Service Unavailable: busy".into()).is_retryable());
        assert!(!EmbeddingError::Api("400 Bad Request: bad input".into()).is_retryable());
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let err = EmbeddingError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn dimension_check_accepts_exact_width_only() {
        assert!(ensure_dimensions(3, &[0.1, 0.2, 0.3]).is_ok());
        let err = ensure_dimensions(3, &[0.1, 0.2]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }
}
