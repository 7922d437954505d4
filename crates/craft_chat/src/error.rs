//! Error types for the chat system.

use craft_client::ClientError;
use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat system errors
#[derive(Error, Debug)]
pub enum ChatError {
    /// A backend call failed (after retries, when retryable)
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Another turn is still waiting on the backend
    #[error("A turn is already in flight")]
    TurnInFlight,

    /// The stored conversation has not been loaded into the session yet
    #[error("Stored conversation not loaded")]
    HistoryNotLoaded,

    /// Approve was requested with nothing (or something else) pending
    #[error("No pending preview to approve")]
    NoPendingPreview,

    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// One-line message suitable for showing in the chat transcript.
    pub fn user_notice(&self) -> String {
        match self {
            Self::Client(ClientError::Timeout { after_ms }) => format!(
                "The assistant did not answer within {} seconds. Please try again.",
                after_ms / 1000
            ),
            Self::Client(ClientError::ConnectionFailure(_))
            | Self::Client(ClientError::ServerFailure { .. }) => {
                "Could not reach the server. Please try again in a moment.".to_string()
            }
            Self::Client(ClientError::ClientRejected { status, .. }) => {
                format!("The request was rejected by the server (status {}).", status)
            }
            Self::Client(ClientError::InvalidRequest(_)) => {
                "The request could not be prepared.".to_string()
            }
            Self::Client(ClientError::InvalidResponseShape(_)) => {
                "Received an unexpected response from the server.".to_string()
            }
            Self::TurnInFlight => "Please wait for the current reply to finish.".to_string(),
            Self::HistoryNotLoaded => {
                "The saved conversation has not been loaded yet. Please try again.".to_string()
            }
            Self::NoPendingPreview => "There is no preview waiting for approval.".to_string(),
            other => format!("Something went wrong: {}", other),
        }
    }
}
