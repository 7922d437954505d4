//! Error types for the request layer.

use thiserror::Error;

/// Result type alias for request operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while carrying a request to a backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Server failure {status}: {body}")]
    ServerFailure { status: u16, body: String },

    #[error("Request rejected with status {status}: {body}")]
    ClientRejected { status: u16, body: String },

    #[error("Invalid response shape: {0}")]
    InvalidResponseShape(String),

    /// The request body could not be encoded; nothing was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Build the error for a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if (500..600).contains(&status) {
            Self::ServerFailure { status, body }
        } else {
            Self::ClientRejected { status, body }
        }
    }

    /// Network-level failures are worth another attempt; rejections and
    /// unusable payloads are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectionFailure(_) | Self::ServerFailure { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerFailure { status, .. } | Self::ClientRejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ClientError::from_status(503, "busy"),
            ClientError::ServerFailure { status: 503, .. }
        ));
        assert!(matches!(
            ClientError::from_status(404, "missing"),
            ClientError::ClientRejected { status: 404, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout { after_ms: 10 }.is_retryable());
        assert!(ClientError::ConnectionFailure("reset".into()).is_retryable());
        assert!(ClientError::from_status(500, "").is_retryable());
        assert!(!ClientError::from_status(422, "").is_retryable());
        assert!(!ClientError::InvalidResponseShape("empty".into()).is_retryable());
        assert!(!ClientError::InvalidRequest("unencodable".into()).is_retryable());
    }
}
