use std::time::Duration;

use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors surfaced by remote calls and the fetcher built on top of them.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("local store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, FetchError::InvalidInput(_))
    }

    /// HTTP status carried by the error, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status } => Some(*status),
            FetchError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(FetchError::Http { status: 500 }.status(), Some(500));
        assert_eq!(FetchError::NotFound("product 1".into()).status(), Some(404));
        assert_eq!(FetchError::Network("refused".into()).status(), None);
    }

    #[test]
    fn test_timeout_display() {
        let err = FetchError::Timeout(Duration::from_millis(5000));
        assert_eq!(err.to_string(), "request timed out after 5000ms");
    }
}
