//! S3 bucket client implementation

use std::sync::Arc;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::{
    batch::{self, BatchOutcome},
    presign::{normalize_url, validate_presign_expiry, PresignedUrl, DEFAULT_PRESIGN_EXPIRY},
    store::{ObjectStore, S3Store},
    BucketConfig, BucketError, BucketResult,
};

/// Provider name reported for the static credentials
const CREDENTIALS_PROVIDER_NAME: &str = "bucket-client";

/// Builds the key an upload is stored under
#[must_use]
pub fn object_key(object_id: &str, key: &str) -> String {
    format!("{object_id}/{key}")
}

/// Client for one S3 or S3-compatible bucket.
///
/// Holds no mutable state after construction; share it behind an `Arc`.
/// Dropping the future of any operation cancels its in-flight request.
#[derive(Clone)]
pub struct BucketClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    endpoint: String,
    presign_expiry: Duration,
    paginate_listings: bool,
}

impl BucketClient {
    /// Creates a client backed by the AWS S3 SDK
    ///
    /// The SDK client uses the static credentials from `config`, its region and
    /// endpoint when they are non-empty, and path-style addressing.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::MissingCredentials` if the access key or secret key is empty
    /// Returns `BucketError::ConfigError` if the presign expiry is out of range
    pub async fn new(config: BucketConfig) -> BucketResult<Self> {
        config.validate()?;

        let presign_expiry = config.presign_expiry();
        validate_presign_expiry(presign_expiry)?;

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).credentials_provider(credentials);
        if !config.region.is_empty() {
            loader = loader.region(Region::new(config.region.clone()));
        }
        if !config.endpoint.is_empty() {
            loader = loader.endpoint_url(&config.endpoint);
        }
        let sdk_config = loader.load().await;

        // Virtual-hosted addressing does not work against most S3-compatible endpoints
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        let store = S3Store::new(S3Client::from_conf(s3_config), config.bucket_name.clone());

        info!(
            bucket = %config.bucket_name,
            endpoint = %config.endpoint,
            region = %config.region,
            "Initialized S3 bucket client"
        );

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket_name,
            endpoint: config.endpoint,
            presign_expiry,
            paginate_listings: config.paginate_listings,
        })
    }

    /// Creates a client from `S3_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns the errors of [`BucketConfig::from_env`] and [`BucketClient::new`]
    pub async fn from_env() -> BucketResult<Self> {
        Self::new(BucketConfig::from_env()?).await
    }

    /// Creates a client on top of any [`ObjectStore`]
    ///
    /// Uses the default presign expiry and single-page listings.
    #[must_use]
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            endpoint: endpoint.into(),
            presign_expiry: DEFAULT_PRESIGN_EXPIRY,
            paginate_listings: false,
        }
    }

    /// Overrides the expiry of URLs the client presigns on its own
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ConfigError` if the expiry is out of range
    pub fn with_presign_expiry(mut self, expiry: Duration) -> BucketResult<Self> {
        validate_presign_expiry(expiry)?;
        self.presign_expiry = expiry;
        Ok(self)
    }

    /// Enables or disables continuation-token pagination for prefix listings
    #[must_use]
    pub fn with_paginated_listings(mut self, paginate: bool) -> Self {
        self.paginate_listings = paginate;
        self
    }

    /// Bucket every operation targets
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Endpoint the client was configured with
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Expiry of URLs the client presigns on its own
    #[must_use]
    pub const fn presign_expiry(&self) -> Duration {
        self.presign_expiry
    }

    /// Uploads `body` under `{object_id}/{key}` and returns a presigned GET URL for it
    ///
    /// # Errors
    ///
    /// Returns `BucketError::PutObject` if the upload fails
    /// Returns `BucketError::Presign` if the upload succeeded but presigning failed;
    /// the object is left in the bucket
    pub async fn upload(
        &self,
        object_id: &str,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> BucketResult<String> {
        let (_, presigned) = self
            .upload_with_presigned(object_id, key, body, content_type)
            .await?;
        Ok(presigned.url)
    }

    /// Like [`BucketClient::upload`], but also returns the object key and the URL's expiry
    ///
    /// # Errors
    ///
    /// Same as [`BucketClient::upload`]
    #[instrument(skip(self, body), fields(bucket = %self.bucket))]
    pub async fn upload_with_presigned(
        &self,
        object_id: &str,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> BucketResult<(String, PresignedUrl)> {
        let object_key = object_key(object_id, key);

        self.store
            .put_object(&object_key, body, content_type)
            .await?;

        info!(key = %object_key, content_type, "Uploaded object");

        let presigned = self.presign(&object_key, self.presign_expiry).await?;
        Ok((object_key, presigned))
    }

    /// Deletes the object stored under the literal `key`
    ///
    /// # Errors
    ///
    /// Returns `BucketError::DeleteObject` if the request fails
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete(&self, key: &str) -> BucketResult<()> {
        self.store.delete_object(key).await?;
        info!(key, "Deleted object");
        Ok(())
    }

    /// Generates a presigned GET URL for `key`
    ///
    /// # Errors
    ///
    /// Returns `BucketError::Presign` if signing fails
    /// Returns `BucketError::ConfigError` if `expiration` is out of range
    pub async fn presigned_url(&self, key: &str, expiration: Duration) -> BucketResult<String> {
        Ok(self.presign(key, expiration).await?.url)
    }

    /// Generates a presigned GET URL for `key` together with its expiry timestamp
    ///
    /// # Errors
    ///
    /// Same as [`BucketClient::presigned_url`]
    pub async fn presign(&self, key: &str, expiration: Duration) -> BucketResult<PresignedUrl> {
        validate_presign_expiry(expiration)?;

        let url = self.store.presign_get_object(key, expiration).await?;
        let expires_at = Utc::now() + expiration;

        debug!(key, %expires_at, "Generated presigned URL");

        Ok(PresignedUrl { url, expires_at })
    }

    /// Checks whether `key` exists.
    ///
    /// Any failure of the check, not only absence, is reported as `false`. Use
    /// [`BucketClient::try_exists`] to tell the two apart.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn exists(&self, key: &str) -> bool {
        match self.store.head_object(key).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => {
                debug!(key, "Object does not exist");
                false
            }
            Err(e) => {
                warn!(key, error = %e, "Existence check failed, reporting object as absent");
                false
            }
        }
    }

    /// Checks whether `key` exists, surfacing failures of the check
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if object exists
    /// * `Ok(false)` if object does not exist
    /// * `Err(BucketError)` if the S3 operation fails
    ///
    /// # Errors
    ///
    /// Returns `BucketError::HeadObject` for S3 service errors
    /// Returns `BucketError::UpstreamError` for 5xx errors
    pub async fn try_exists(&self, key: &str) -> BucketResult<bool> {
        match self.store.head_object(key).await {
            Ok(()) => Ok(true),
            Err(BucketError::ObjectNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lists the keys under `prefix`.
    ///
    /// Only the first page the store returns is read unless paginated listings
    /// are enabled.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ListObjects` if a listing request fails
    pub async fn list_keys(&self, prefix: &str) -> BucketResult<Vec<String>> {
        let mut listing = self.store.list_objects(prefix, None).await?;
        let mut keys = std::mem::take(&mut listing.keys);

        if !self.paginate_listings {
            if listing.next_continuation_token.is_some() {
                debug!(prefix, count = keys.len(), "Listing truncated to first page");
            }
            return Ok(keys);
        }

        while let Some(token) = listing.next_continuation_token.take() {
            listing = self.store.list_objects(prefix, Some(token)).await?;
            keys.append(&mut listing.keys);
        }

        Ok(keys)
    }

    /// Finds the key under `prefix` that a presigned URL was generated for.
    ///
    /// Presigns every listed key again and compares the URLs with query string
    /// and fragment removed, which leaves the path that identifies the object.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ListObjects` if listing fails
    /// Returns `BucketError::KeyNotFound` if no listed key matches
    #[instrument(skip(self, presigned_url), fields(bucket = %self.bucket))]
    pub async fn find_key_by_presigned_url(
        &self,
        presigned_url: &str,
        prefix: &str,
    ) -> BucketResult<String> {
        let keys = self.list_keys(prefix).await?;
        let target = normalize_url(presigned_url);

        for key in keys {
            match self.presigned_url(&key, self.presign_expiry).await {
                Ok(url) if normalize_url(&url) == target => return Ok(key),
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "Skipping object that failed to presign"),
            }
        }

        Err(BucketError::KeyNotFound)
    }

    /// Presigns every object under `prefix` concurrently
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ListObjects` if listing fails; presign failures are
    /// reported through the returned [`BatchOutcome`]
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn presign_prefix(&self, prefix: &str) -> BucketResult<BatchOutcome> {
        let keys = self.list_keys(prefix).await?;
        debug!(count = keys.len(), "Presigning listed objects");

        Ok(batch::presign_all(Arc::clone(&self.store), keys, self.presign_expiry).await)
    }

    /// Presigned GET URLs for every object under `prefix`, in listing order.
    ///
    /// Objects that fail to presign are logged and left out, so the result can
    /// be shorter than the listing.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ListObjects` if listing fails
    /// Returns `BucketError::AllPresignsFailed` if no object could be presigned
    pub async fn list_presigned_urls(&self, prefix: &str) -> BucketResult<Vec<String>> {
        self.presign_prefix(prefix).await?.into_urls()
    }
}
