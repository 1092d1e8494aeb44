//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Service account could not obtain an access token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<AuthError> for GoogleDriveError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Http(e) => GoogleDriveError::BridgeError(e),
            other => GoogleDriveError::AuthenticationFailed(other.to_string()),
        }
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::BridgeError(e) => e,
            other => BridgeError::Backend(format!("GoogleDrive driver error: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 404,
            message: "File not found".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 404): File not found"
        );
    }

    #[test]
    fn test_error_conversion() {
        let error = GoogleDriveError::AuthenticationFailed("invalid_grant".to_string());
        let bridge_error: BridgeError = error.into();

        assert!(matches!(
            bridge_error,
            BridgeError::Backend(msg) if msg == "GoogleDrive driver error: Authentication failed: invalid_grant"
        ));
    }

    #[test]
    fn test_auth_error_conversion() {
        let error: GoogleDriveError = AuthError::InvalidCredentials("bad key".to_string()).into();
        assert!(matches!(error, GoogleDriveError::AuthenticationFailed(msg) if msg.contains("bad key")));
    }
}
