use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("extracted content too short ({word_count} words, minimum {minimum})")]
    EmptyContent { word_count: usize, minimum: usize },
}

impl CrawlError {
    /// 4xx responses will fail the same way forever; everything else is a
    /// transient network or server condition.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrawlError::Http(_) => true,
            CrawlError::Status { status, .. } => *status >= 500,
            CrawlError::EmptyContent { .. } => true,
        }
    }

    /// Machine-readable error type recorded on queue entries and audit rows.
    pub fn error_type(&self) -> &'static str {
        match self {
            CrawlError::Http(_) => "CRAWL_NETWORK_ERROR",
            CrawlError::Status { status, .. } if *status >= 500 => "CRAWL_SERVER_ERROR",
            CrawlError::Status { .. } => "CRAWL_CLIENT_ERROR",
            CrawlError::EmptyContent { .. } => "CRAWL_EMPTY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_fatal() {
        let err = CrawlError::Status {
            status: 404,
            url: "https://example.com/gone".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.error_type(), "CRAWL_CLIENT_ERROR");
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = CrawlError::Status {
            status: 503,
            url: "https://example.com/busy".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.error_type(), "CRAWL_SERVER_ERROR");
    }

    #[test]
    fn empty_content_is_retryable() {
        let err = CrawlError::EmptyContent {
            word_count: 3,
            minimum: 50,
        };
        assert!(err.is_retryable());
        assert_eq!(err.error_type(), "CRAWL_EMPTY");
    }
}
