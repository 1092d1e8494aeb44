//! Error types for the Mergin provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Mergin provider errors
#[derive(Error, Debug)]
pub enum MerginError {
    /// Login rejected or session no longer valid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error status
    #[error("Mergin API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Project name is not of the form `<namespace>/<name>`
    #[error("Invalid project name: {0}")]
    InvalidProjectName(String),

    /// Local working copy is missing, corrupt or in an unexpected state
    #[error("Working copy error: {0}")]
    WorkingCopy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Mergin operations
pub type Result<T> = std::result::Result<T, MerginError>;

impl From<MerginError> for BridgeError {
    fn from(error: MerginError) -> Self {
        match error {
            MerginError::AuthenticationFailed(msg) => BridgeError::Authentication(msg),
            MerginError::WorkingCopy(msg) => BridgeError::WorkingCopy(msg),
            MerginError::Io(e) => BridgeError::Io(e),
            MerginError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
