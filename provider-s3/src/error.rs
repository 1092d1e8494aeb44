//! Error types for the S3 provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// S3-compatible object store errors
#[derive(Error, Debug)]
pub enum S3Error {
    /// Bucket request rejected by the object store
    #[error("S3 API error: {0}")]
    Api(String),

    /// Credentials do not grant access to the bucket
    #[error("Access denied to bucket {0}")]
    AccessDenied(String),

    /// Endpoint or bucket settings cannot be used
    #[error("Invalid object store settings: {0}")]
    InvalidConfig(String),

    /// Object write failed
    #[error("Object store error: {0}")]
    Storage(#[from] opendal::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, S3Error>;

impl From<S3Error> for BridgeError {
    fn from(error: S3Error) -> Self {
        BridgeError::Backend(format!("MinIO driver error: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_keeps_message() {
        let bridge: BridgeError = S3Error::Api("SignatureDoesNotMatch".to_string()).into();

        assert!(matches!(bridge, BridgeError::Backend(msg)
            if msg == "MinIO driver error: S3 API error: SignatureDoesNotMatch"));
    }

    #[test]
    fn test_write_errors_are_backend_errors() {
        let error = opendal::Error::new(opendal::ErrorKind::PermissionDenied, "write denied");
        let bridge: BridgeError = S3Error::from(error).into();

        assert!(matches!(bridge, BridgeError::Backend(msg)
            if msg.starts_with("MinIO driver error: Object store error:") && msg.contains("write denied")));
    }
}
