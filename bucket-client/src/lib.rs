//! Convenience client for AWS S3 and S3-compatible object storage
//!
//! Wraps the AWS SDK behind a handful of bucket operations: upload with an
//! immediately usable presigned URL, delete, existence checks, presigned GET
//! URLs, reverse lookup of a key from a presigned URL, and concurrent
//! presigning of everything under a prefix.
//!
//! ```no_run
//! use bucket_client::{BucketClient, BucketConfig, ByteStream};
//!
//! # async fn run() -> bucket_client::BucketResult<()> {
//! let client = BucketClient::new(BucketConfig::new(
//!     "https://fsn1.your-objectstorage.com",
//!     "access-key",
//!     "secret-key",
//!     "media",
//!     "fsn1",
//! ))
//! .await?;
//!
//! let url = client
//!     .upload("chat-42", "photo.png", ByteStream::from_static(b"..."), "image/png")
//!     .await?;
//! let urls = client.list_presigned_urls("chat-42/").await?;
//! # let _ = (url, urls);
//! # Ok(())
//! # }
//! ```

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

mod batch;
mod client;
mod config;
mod error;
mod presign;
mod store;

/// In-memory [`ObjectStore`] with failure injection
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use aws_sdk_s3::primitives::ByteStream;
pub use batch::{BatchFailure, BatchOutcome};
pub use client::{object_key, BucketClient};
pub use config::BucketConfig;
pub use error::{BucketError, BucketResult};
pub use presign::{
    normalize_url, validate_presign_expiry, PresignedUrl, DEFAULT_PRESIGN_EXPIRY,
    MAX_PRESIGN_EXPIRY,
};
pub use store::{ObjectListing, ObjectStore, S3Store};
