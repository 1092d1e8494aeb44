use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    Config(String),

    #[error("Mergin client error: {0}")]
    VersionControl(String),

    #[error("Driver error: {0}")]
    Backend(String),

    #[error("There are pending changes in the local directory - please review and push manually! {0}")]
    PendingChanges(String),

    #[error("There are changes to be added - it should never happen: {}", .0.join(", "))]
    UnexpectedAdditions(Vec<String>),

    #[error("The project working directory does not exist: {0}")]
    MissingWorkingDir(String),

    #[error("The project working directory does not seem to contain Mergin project: {0}")]
    NotAProject(String),

    #[error("SQLITE error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cycle state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Backend(msg) => SyncError::Backend(msg),
            BridgeError::Io(e) => SyncError::Io(e),
            other => SyncError::VersionControl(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(error: sqlx::Error) -> Self {
        SyncError::Database(error.to_string())
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(error: core_runtime::Error) -> Self {
        SyncError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_messages() {
        assert_eq!(
            SyncError::UnexpectedAdditions(vec!["new.png".into(), "other.jpg".into()]).to_string(),
            "There are changes to be added - it should never happen: new.png, other.jpg"
        );
        assert!(SyncError::PendingChanges("updated: survey.gpkg".into())
            .to_string()
            .starts_with("There are pending changes in the local directory"));
    }

    #[test]
    fn test_bridge_error_mapping() {
        assert!(matches!(
            SyncError::from(BridgeError::Backend("bucket gone".into())),
            SyncError::Backend(_)
        ));
        assert!(matches!(
            SyncError::from(BridgeError::Authentication("expired".into())),
            SyncError::VersionControl(msg) if msg.contains("expired")
        ));
    }
}
