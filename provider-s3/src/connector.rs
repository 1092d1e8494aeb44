//! S3-compatible object store backend
//!
//! Talks to MinIO (or any S3-compatible service) with path-style URLs.
//! Uploads stream from disk through an `opendal` writer, so memory use is
//! bounded by the chunk size rather than the file size.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::storage::{BackendKind, StorageBackend};
use core_runtime::config::MinioSettings;
use opendal::services::S3;
use opendal::Operator;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use crate::bucket::{ensure_bucket, BucketAdmin, SdkBucketAdmin};
use crate::error::{Result, S3Error};

/// Region assumed when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Part size for multipart uploads (S3 requires at least 5 MiB)
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Bytes read from disk per write call
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Endpoint, bucket and key layout derived from the driver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub scheme: &'static str,
    /// Host and optional port, without scheme
    pub endpoint: String,
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: String,
}

impl ObjectLocation {
    pub fn from_settings(settings: &MinioSettings) -> Result<Self> {
        // A scheme in the endpoint is tolerated; `secure` decides the one used.
        let endpoint = settings
            .endpoint
            .rsplit("//")
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        if endpoint.is_empty() {
            return Err(S3Error::InvalidConfig("endpoint is empty".to_string()));
        }
        if settings.bucket.is_empty() {
            return Err(S3Error::InvalidConfig("bucket is empty".to_string()));
        }

        Ok(Self {
            scheme: if settings.secure { "https" } else { "http" },
            endpoint,
            bucket: settings.bucket.clone(),
            prefix: settings
                .bucket_subpath
                .as_deref()
                .map(|p| p.trim_matches('/'))
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            region: settings
                .region
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_REGION)
                .to_string(),
        })
    }

    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.scheme, self.endpoint)
    }

    /// Object key for a project path, under the configured prefix
    pub fn object_key(&self, logical_path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, logical_path),
            None => logical_path.to_string(),
        }
    }

    /// Locator returned to callers for an uploaded object
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint_url(), self.bucket, key)
    }
}

/// Operator writing into the bucket root
fn object_operator(location: &ObjectLocation, settings: &MinioSettings) -> Result<Operator> {
    let builder = S3::default()
        .endpoint(&location.endpoint_url())
        .region(&location.region)
        .bucket(&location.bucket)
        .access_key_id(&settings.access_key)
        .secret_access_key(&settings.secret_key)
        .disable_config_load()
        .disable_ec2_metadata();

    Ok(Operator::new(builder)?.finish())
}

/// Object store backend bound to one bucket
///
/// # Example
///
/// ```ignore
/// use provider_s3::S3Backend;
///
/// let backend = S3Backend::connect(&settings.minio).await?;
/// let url = backend.upload(&path, "images/img2.jpg").await?;
/// ```
pub struct S3Backend {
    operator: Operator,
    location: ObjectLocation,
}

impl S3Backend {
    /// Build the backend and make sure the bucket exists, creating it if needed.
    #[instrument(skip(settings), fields(endpoint = %settings.endpoint, bucket = %settings.bucket))]
    pub async fn connect(settings: &MinioSettings) -> Result<Self> {
        let location = ObjectLocation::from_settings(settings)?;
        let admin = SdkBucketAdmin::new(&location, &settings.access_key, &settings.secret_key);
        let operator = object_operator(&location, settings)?;
        Self::connect_with(&admin, operator, location).await
    }

    /// Verify the bucket through `admin`, then write through `operator`.
    pub async fn connect_with(
        admin: &dyn BucketAdmin,
        operator: Operator,
        location: ObjectLocation,
    ) -> Result<Self> {
        ensure_bucket(admin, &location.bucket).await?;
        Ok(Self { operator, location })
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    async fn put_object(&self, local_path: &Path, logical_path: &str) -> Result<String> {
        let mut source = tokio::fs::File::open(local_path).await?;
        let key = self.location.object_key(logical_path);
        let content_type = mime_guess::from_path(local_path).first_or_octet_stream();

        let mut writer = self
            .operator
            .writer_with(&key)
            .content_type(content_type.as_ref())
            .chunk(UPLOAD_CHUNK_SIZE)
            .await?;

        let mut written = 0u64;
        loop {
            let mut buffer = vec![0u8; READ_BUFFER_SIZE];
            let read = match source.read(&mut buffer).await {
                Ok(read) => read,
                Err(e) => {
                    writer.abort().await?;
                    return Err(e.into());
                }
            };
            if read == 0 {
                break;
            }
            buffer.truncate(read);
            writer.write(buffer).await?;
            written += read as u64;
        }
        writer.close().await?;

        debug!(%key, bytes = written, "Uploaded object");
        Ok(self.location.public_url(&key))
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn upload(&self, local_path: &Path, logical_path: &str) -> BridgeResult<String> {
        Ok(self.put_object(local_path, logical_path).await?)
    }
}
