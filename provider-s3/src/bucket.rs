//! Bucket verification and creation

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use tracing::{debug, info, instrument};

use crate::connector::{ObjectLocation, DEFAULT_REGION};
use crate::error::{Result, S3Error};

/// Bucket-level operations needed before objects can be written
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BucketAdmin: Send + Sync {
    /// Whether the bucket exists; denied access is an error.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str) -> Result<()>;
}

/// Make sure `bucket` exists, creating it when missing.
#[instrument(skip(admin))]
pub async fn ensure_bucket(admin: &dyn BucketAdmin, bucket: &str) -> Result<()> {
    if admin.bucket_exists(bucket).await? {
        debug!("Bucket exists");
        return Ok(());
    }

    admin.create_bucket(bucket).await?;
    info!("Created bucket");
    Ok(())
}

/// `LocationConstraint` sent with CreateBucket; omitted for the default region.
pub fn location_constraint(region: &str) -> Option<BucketLocationConstraint> {
    (region != DEFAULT_REGION).then(|| BucketLocationConstraint::from(region))
}

/// [`BucketAdmin`] backed by the AWS SDK, using path-style requests
pub struct SdkBucketAdmin {
    client: Client,
    region: String,
}

impl SdkBucketAdmin {
    pub fn new(location: &ObjectLocation, access_key: &str, secret_key: &str) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(location.endpoint_url())
            .region(Region::new(location.region.clone()))
            .credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "media-sync",
            ))
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            region: location.region.clone(),
        }
    }
}

#[async_trait]
impl BucketAdmin for SdkBucketAdmin {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => match err.raw_response().map(|response| response.status().as_u16()) {
                Some(404) => Ok(false),
                Some(403) => Err(S3Error::AccessDenied(bucket.to_string())),
                _ => Err(S3Error::Api(DisplayErrorContext(&err).to_string())),
            },
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(constraint) = location_constraint(&self.region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|err| S3Error::Api(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }
}
