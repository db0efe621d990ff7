//! Error types for bucket operations

use aws_sdk_s3::{
    error::{DisplayErrorContext, SdkError},
    operation::{
        delete_object::DeleteObjectError, get_object::GetObjectError,
        head_object::HeadObjectError, list_objects_v2::ListObjectsV2Error,
        put_object::PutObjectError,
    },
};
use thiserror::Error;

/// Result type for bucket operations
pub type BucketResult<T> = Result<T, BucketError>;

/// Errors that can occur during bucket operations
#[derive(Error, Debug)]
pub enum BucketError {
    /// Access key or secret key is empty
    #[error("S3 credentials not configured")]
    MissingCredentials,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Put object request failed
    #[error("Failed to upload file to S3: {0}")]
    PutObject(String),

    /// Delete object request failed
    #[error("Failed to delete file from S3: {0}")]
    DeleteObject(String),

    /// Head object request failed for a reason other than absence
    #[error("Failed to check object in S3: {0}")]
    HeadObject(String),

    /// Head object reported that the key does not exist
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Upstream service error (5xx from S3)
    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    /// List objects request failed
    #[error("Failed to list objects: {0}")]
    ListObjects(String),

    /// Presigned URL generation failed
    #[error("Failed to generate presigned URL: {0}")]
    Presign(String),

    /// No listed object produced a URL matching the one searched for
    #[error("Object not found for the given presigned URL")]
    KeyNotFound,

    /// Every presign request of a batch failed; carries the first failure
    #[error("Failed to get presigned URLs: {0}")]
    AllPresignsFailed(#[source] Box<BucketError>),
}

impl BucketError {
    /// Whether the error reports an absent object rather than a failed call
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_) | Self::KeyNotFound)
    }
}

impl From<SdkError<PutObjectError>> for BucketError {
    fn from(error: SdkError<PutObjectError>) -> Self {
        Self::PutObject(DisplayErrorContext(&error).to_string())
    }
}

impl From<SdkError<DeleteObjectError>> for BucketError {
    fn from(error: SdkError<DeleteObjectError>) -> Self {
        Self::DeleteObject(DisplayErrorContext(&error).to_string())
    }
}

impl From<SdkError<HeadObjectError>> for BucketError {
    fn from(error: SdkError<HeadObjectError>) -> Self {
        Self::HeadObject(DisplayErrorContext(&error).to_string())
    }
}

impl From<SdkError<ListObjectsV2Error>> for BucketError {
    fn from(error: SdkError<ListObjectsV2Error>) -> Self {
        Self::ListObjects(DisplayErrorContext(&error).to_string())
    }
}

impl From<SdkError<GetObjectError>> for BucketError {
    fn from(error: SdkError<GetObjectError>) -> Self {
        Self::Presign(DisplayErrorContext(&error).to_string())
    }
}
