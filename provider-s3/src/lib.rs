//! # S3 Provider
//!
//! Storage backend for MinIO and other S3-compatible object stores.
//! Objects are written through an `opendal` operator; the bucket is
//! verified (and created when missing) with the AWS SDK at connect time.

pub mod bucket;
pub mod connector;
pub mod error;

pub use bucket::{BucketAdmin, SdkBucketAdmin};
pub use connector::{ObjectLocation, S3Backend, DEFAULT_REGION};
pub use error::{Result, S3Error};
