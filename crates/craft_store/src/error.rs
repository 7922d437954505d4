//! Error types for the project store.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Project store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Session identifiers become directory names and must be plain
    #[error("Invalid user id: '{0}'")]
    InvalidUserId(String),

    #[error("Corrupt document {path}: {message}")]
    CorruptDocument { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// HTTP status the storage contract answers with for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidUserId(_) => 400,
            Self::CorruptDocument { .. } | Self::Io(_) | Self::Json(_) => 500,
        }
    }
}
