//! Error handling for control-plane and throughput requests

use thiserror::Error;

/// Result type for control-plane operations
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (connection refused, reset, TLS, body decoding)
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("unexpected status {code}: {body}")]
    Status { code: u16, body: String },

    /// The per-call deadline elapsed
    #[error("request timed out")]
    Timeout,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// None of the candidate endpoints answered
    #[error("no control plane reachable at {host} on ports {ports:?}")]
    Unavailable { host: String, ports: Vec<u16> },
}

impl ApiError {
    pub fn status(code: u16, body: impl Into<String>) -> Self {
        Self::Status {
            code,
            body: body.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Http(e)
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::InvalidUrl(e.to_string())
    }
}
