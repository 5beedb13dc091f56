use crate::api::ApiError;
use crate::board::BoardError;
use crate::persist::SaveFileError;
use thiserror::Error;

/// Failures of operations that mix network calls with client-side checks.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Board(#[from] BoardError),
    /// Malformed input, blocked before any request.
    #[error("{0}")]
    Validation(String),
    /// The signed-in user's role does not allow this.
    #[error("{0}")]
    Forbidden(String),
    #[error("credential file: {0}")]
    SaveFile(#[from] SaveFileError),
    #[error("settings: {0}")]
    Settings(String),
}

impl ClientError {
    /// Text for an inline message.
    pub fn message(&self) -> String {
        match self {
            ClientError::Api(e) => e.message(),
            other => other.to_string(),
        }
    }
}
