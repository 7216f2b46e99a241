use std::time::Duration;
use thiserror::Error;

/// Why a single upstream source did not produce a payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Unavailable(String),

    #[error("Upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UpstreamUnavailable,
    UpstreamTimeout,
}

impl SourceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Timeout(_) => ErrorKind::UpstreamTimeout,
            _ => ErrorKind::UpstreamUnavailable,
        }
    }
}

impl From<reqwest_middleware::Error> for SourceError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => SourceError::Unavailable(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            SourceError::Timeout(Duration::from_secs(2)).kind(),
            ErrorKind::UpstreamTimeout
        );
        assert_eq!(
            SourceError::Http { status: 503, message: "busy".into() }.kind(),
            ErrorKind::UpstreamUnavailable
        );
        assert_eq!(
            SourceError::Malformed("bad json".into()).kind(),
            ErrorKind::UpstreamUnavailable
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            SourceError::Timeout(Duration::from_millis(1500)).to_string(),
            "Timed out after 1500ms"
        );
        assert_eq!(
            SourceError::Http { status: 401, message: "invalid key".into() }.to_string(),
            "Upstream returned HTTP 401: invalid key"
        );
    }
}
