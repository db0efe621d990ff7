//! Presigned URL types and helpers

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{BucketError, BucketResult};

/// Expiry applied to every URL the client presigns on its own
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Longest expiry SigV4 query signing accepts
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Presigned URL with expiration information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    /// The presigned URL for GET operations
    pub url: String,
    /// UTC timestamp when the URL expires
    pub expires_at: DateTime<Utc>,
}

/// Strips the query string and fragment from a URL.
///
/// The signature, credential scope and timestamp of a presigned URL all live
/// in the query, so two URLs presigned for the same object at different times
/// normalize to the same string.
///
/// ```
/// use bucket_client::normalize_url;
///
/// assert_eq!(normalize_url("https://h/k?X=1#frag"), "https://h/k");
/// assert_eq!(normalize_url("https://h/k"), "https://h/k");
/// ```
#[must_use]
pub fn normalize_url(url: &str) -> &str {
    url.find(['?', '#']).map_or(url, |end| &url[..end])
}

/// Checks that an expiry is usable for query signing
///
/// # Errors
///
/// Returns `BucketError::ConfigError` for a zero expiry or one longer than
/// [`MAX_PRESIGN_EXPIRY`]
pub fn validate_presign_expiry(expiry: Duration) -> BucketResult<()> {
    if expiry.is_zero() {
        return Err(BucketError::ConfigError(
            "presigned URL expiry must be greater than zero".to_string(),
        ));
    }
    if expiry > MAX_PRESIGN_EXPIRY {
        return Err(BucketError::ConfigError(format!(
            "presigned URL expiry of {}s exceeds the maximum of {}s",
            expiry.as_secs(),
            MAX_PRESIGN_EXPIRY.as_secs()
        )));
    }
    Ok(())
}
