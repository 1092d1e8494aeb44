//! Storage backend selected from the driver settings

use async_trait::async_trait;
use bridge_desktop::LocalBackend;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::HttpClient;
use bridge_traits::storage::{BackendKind, StorageBackend};
use bridge_traits::time::Clock;
use core_auth::{ServiceAccountAuthenticator, ServiceAccountKey};
use core_runtime::config::DriverSettings;
use provider_google_drive::{GoogleDriveBackend, DRIVE_FILE_SCOPE};
use provider_s3::S3Backend;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::Result;

/// One of the supported destinations, fully initialized.
pub enum Backend {
    Local(LocalBackend),
    ObjectStore(S3Backend),
    CloudDrive(GoogleDriveBackend),
}

impl Backend {
    /// Initialize the backend for `driver`.
    ///
    /// Bucket verification, folder lookup and destination creation happen
    /// here, so failures surface before any cycle starts.
    pub async fn connect(
        driver: &DriverSettings,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        info!(driver = driver.name(), "Initializing storage backend");

        let backend = match driver {
            DriverSettings::Local(settings) => Backend::Local(LocalBackend::new(&settings.dest).await?),
            DriverSettings::Minio(settings) => Backend::ObjectStore(S3Backend::connect(settings).await?),
            DriverSettings::GoogleDrive(settings) => {
                let key = ServiceAccountKey::from_file(&settings.service_account_file).await?;
                let tokens = Arc::new(ServiceAccountAuthenticator::new(
                    Arc::clone(&http_client),
                    clock,
                    key,
                    DRIVE_FILE_SCOPE,
                ));
                Backend::CloudDrive(GoogleDriveBackend::connect(http_client, tokens, settings).await?)
            }
        };

        Ok(backend)
    }
}

#[async_trait]
impl StorageBackend for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Local(backend) => backend.kind(),
            Backend::ObjectStore(backend) => backend.kind(),
            Backend::CloudDrive(backend) => backend.kind(),
        }
    }

    async fn upload(&self, local_path: &Path, logical_path: &str) -> BridgeResult<String> {
        match self {
            Backend::Local(backend) => backend.upload(local_path, logical_path).await,
            Backend::ObjectStore(backend) => backend.upload(local_path, logical_path).await,
            Backend::CloudDrive(backend) => backend.upload(local_path, logical_path).await,
        }
    }
}
