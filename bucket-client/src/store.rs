//! Object store backends

use std::time::Duration;

use aws_sdk_s3::{
    error::{DisplayErrorContext, SdkError},
    operation::head_object::HeadObjectError,
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client as S3Client,
};
use tracing::{debug, error};

use crate::{BucketError, BucketResult};

/// One page of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Object keys in the order the store returned them
    pub keys: Vec<String>,
    /// Token for the next page, if the listing was truncated
    pub next_continuation_token: Option<String>,
}

/// The object storage calls the client is built from.
///
/// Each method maps to exactly one request against the bucket the store was
/// created for. Implementations must be safe to share across tasks.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `body` under `key`
    async fn put_object(&self, key: &str, body: ByteStream, content_type: &str)
        -> BucketResult<()>;

    /// Removes `key`
    async fn delete_object(&self, key: &str) -> BucketResult<()>;

    /// Fetches the metadata of `key`.
    ///
    /// Absence must be reported as `BucketError::ObjectNotFound`.
    async fn head_object(&self, key: &str) -> BucketResult<()>;

    /// Lists one page of keys under `prefix`
    async fn list_objects(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> BucketResult<ObjectListing>;

    /// Presigns a GET request for `key`
    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> BucketResult<String>;
}

/// [`ObjectStore`] backed by the AWS S3 SDK
#[derive(Debug, Clone)]
pub struct S3Store {
    client: S3Client,
    bucket_name: String,
}

impl S3Store {
    /// Creates a store for `bucket_name` on a pre-configured S3 client
    #[must_use]
    pub const fn new(client: S3Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> BucketResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> BucketResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await?;

        Ok(())
    }

    async fn head_object(&self, key: &str) -> BucketResult<()> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(ref service_err) = e {
                    if matches!(service_err.err(), HeadObjectError::NotFound(_)) {
                        return Err(BucketError::ObjectNotFound(key.to_string()));
                    }

                    if service_err.raw().status().as_u16() >= 500 {
                        error!(key, "Upstream error checking object existence: {}", e);
                        return Err(BucketError::UpstreamError(
                            DisplayErrorContext(&e).to_string(),
                        ));
                    }
                }

                Err(BucketError::from(e))
            }
        }
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> BucketResult<ObjectListing> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .send()
            .await?;

        let keys: Vec<String> = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        debug!(prefix, count = keys.len(), "Listed objects");

        Ok(ObjectListing {
            keys,
            next_continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> BucketResult<String> {
        let presigned_config = PresigningConfig::expires_in(expires_in).map_err(|e| {
            BucketError::ConfigError(format!("Failed to create presigning config: {e}"))
        })?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(presigned_config)
            .await?;

        Ok(presigned_request.uri().to_string())
    }
}
