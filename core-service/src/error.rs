use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("{0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Driver error: {0}")]
    Backend(String),

    #[error("{0}")]
    Sync(#[from] core_sync::SyncError),
}

impl From<provider_s3::S3Error> for CoreError {
    fn from(error: provider_s3::S3Error) -> Self {
        BridgeError::from(error).into()
    }
}

impl From<provider_google_drive::GoogleDriveError> for CoreError {
    fn from(error: provider_google_drive::GoogleDriveError) -> Self {
        BridgeError::from(error).into()
    }
}

impl From<BridgeError> for CoreError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Backend(msg) => CoreError::Backend(msg),
            other => CoreError::InitializationFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
