//! Client configuration

use std::env;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::{presign::DEFAULT_PRESIGN_EXPIRY, BucketError, BucketResult};

/// Connection settings for an S3 or S3-compatible bucket
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct BucketConfig {
    /// Base endpoint URL; empty selects the regular AWS endpoint for the region
    pub endpoint: String,
    /// Static access key ID
    pub access_key_id: String,
    /// Static secret access key
    pub secret_access_key: String,
    /// Bucket every operation targets
    pub bucket_name: String,
    /// Signing region; empty leaves the region unset
    pub region: String,
    /// Expiry of URLs the client presigns on its own, in seconds (defaults to 15 minutes)
    #[serde(default)]
    pub presign_expiry_secs: Option<u64>,
    /// Follow continuation tokens when listing a prefix instead of reading the first page only
    #[serde(default)]
    pub paginate_listings: bool,
}

impl BucketConfig {
    /// Creates a config with the default presign expiry and single-page listings
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket_name: bucket_name.into(),
            region: region.into(),
            presign_expiry_secs: None,
            paginate_listings: false,
        }
    }

    /// Reads the config from `S3_*` environment variables
    ///
    /// `S3_ENDPOINT`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY`, `S3_BUCKET_NAME` and
    /// `S3_REGION` default to empty strings when unset. `S3_PRESIGNED_URL_EXPIRY_SECS`
    /// and `S3_PAGINATE_LISTINGS` are optional.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ConfigError` if an optional variable is set but cannot be parsed
    pub fn from_env() -> BucketResult<Self> {
        let presign_expiry_secs = match non_empty_var("S3_PRESIGNED_URL_EXPIRY_SECS") {
            Some(value) => Some(value.parse::<u64>().map_err(|e| {
                BucketError::ConfigError(format!(
                    "S3_PRESIGNED_URL_EXPIRY_SECS must be a number of seconds: {e}"
                ))
            })?),
            None => None,
        };

        let paginate_listings = match non_empty_var("S3_PAGINATE_LISTINGS") {
            Some(value) => value.to_lowercase().parse::<bool>().map_err(|e| {
                BucketError::ConfigError(format!(
                    "S3_PAGINATE_LISTINGS must be true or false: {e}"
                ))
            })?,
            None => false,
        };

        Ok(Self {
            endpoint: var_or_empty("S3_ENDPOINT"),
            access_key_id: var_or_empty("S3_ACCESS_KEY_ID"),
            secret_access_key: var_or_empty("S3_SECRET_ACCESS_KEY"),
            bucket_name: var_or_empty("S3_BUCKET_NAME"),
            region: var_or_empty("S3_REGION"),
            presign_expiry_secs,
            paginate_listings,
        })
    }

    /// Overrides the default presign expiry
    #[must_use]
    pub fn with_presign_expiry_secs(mut self, secs: u64) -> Self {
        self.presign_expiry_secs = Some(secs);
        self
    }

    /// Enables or disables continuation-token pagination for prefix listings
    #[must_use]
    pub fn with_paginated_listings(mut self, paginate: bool) -> Self {
        self.paginate_listings = paginate;
        self
    }

    /// Expiry applied to URLs the client presigns on its own
    #[must_use]
    pub fn presign_expiry(&self) -> Duration {
        self.presign_expiry_secs
            .map_or(DEFAULT_PRESIGN_EXPIRY, Duration::from_secs)
    }

    /// Checks that both credentials are present
    ///
    /// # Errors
    ///
    /// Returns `BucketError::MissingCredentials` if the access key or secret key is empty
    pub fn validate(&self) -> BucketResult<()> {
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(BucketError::MissingCredentials);
        }
        Ok(())
    }
}

impl fmt::Debug for BucketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .field("presign_expiry_secs", &self.presign_expiry_secs)
            .field("paginate_listings", &self.paginate_listings)
            .finish()
    }
}

fn var_or_empty(name: &str) -> String {
    env::var(name).map(|value| value.trim().to_string()).unwrap_or_default()
}

fn non_empty_var(name: &str) -> Option<String> {
    Some(var_or_empty(name)).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;

    const ENV_VARS: [&str; 7] = [
        "S3_ENDPOINT",
        "S3_ACCESS_KEY_ID",
        "S3_SECRET_ACCESS_KEY",
        "S3_BUCKET_NAME",
        "S3_REGION",
        "S3_PRESIGNED_URL_EXPIRY_SECS",
        "S3_PAGINATE_LISTINGS",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_validate_requires_both_credentials() {
        let endpoints = ["", "http://localhost:9000"];
        let buckets = ["", "media"];
        let regions = ["", "us-east-1"];
        let credentials = [("", ""), ("key", ""), ("", "secret")];

        for endpoint in endpoints {
            for bucket in buckets {
                for region in regions {
                    for (access_key, secret_key) in credentials {
                        let config =
                            BucketConfig::new(endpoint, access_key, secret_key, bucket, region);
                        assert!(
                            matches!(config.validate(), Err(BucketError::MissingCredentials)),
                            "accepted {config:?}"
                        );
                    }
                }
            }
        }

        assert!(BucketConfig::new("", "key", "secret", "", "")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_presign_expiry_defaults_to_fifteen_minutes() {
        let config = BucketConfig::new("http://localhost:9000", "key", "secret", "b", "auto");
        assert_eq!(config.presign_expiry(), Duration::from_secs(900));
        assert_eq!(
            config.with_presign_expiry_secs(60).presign_expiry(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = BucketConfig::new("http://localhost:9000", "AKIDEXAMPLE", "s3cr3t", "b", "");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn test_deserialize_with_optional_fields() {
        let config: BucketConfig = serde_json::from_value(serde_json::json!({
            "endpoint": "https://fsn1.your-objectstorage.com",
            "access_key_id": "key",
            "secret_access_key": "secret",
            "bucket_name": "media",
            "region": "fsn1",
        }))
        .unwrap();

        assert_eq!(
            config,
            BucketConfig::new(
                "https://fsn1.your-objectstorage.com",
                "key",
                "secret",
                "media",
                "fsn1"
            )
        );

        let config: BucketConfig = serde_json::from_value(serde_json::json!({
            "endpoint": "",
            "access_key_id": "key",
            "secret_access_key": "secret",
            "bucket_name": "media",
            "region": "eu-west-1",
            "presign_expiry_secs": 120,
            "paginate_listings": true,
        }))
        .unwrap();

        assert_eq!(config.presign_expiry(), Duration::from_secs(120));
        assert!(config.paginate_listings);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_all_variables() {
        clear_env();
        env::set_var("S3_ENDPOINT", "http://localhost:4566");
        env::set_var("S3_ACCESS_KEY_ID", "test");
        env::set_var("S3_SECRET_ACCESS_KEY", "test-secret");
        env::set_var("S3_BUCKET_NAME", "media");
        env::set_var("S3_REGION", "us-east-1");
        env::set_var("S3_PRESIGNED_URL_EXPIRY_SECS", "300");
        env::set_var("S3_PAGINATE_LISTINGS", "TRUE");

        let config = BucketConfig::from_env().unwrap();
        clear_env();

        assert_eq!(
            config,
            BucketConfig::new(
                "http://localhost:4566",
                "test",
                "test-secret",
                "media",
                "us-east-1"
            )
            .with_presign_expiry_secs(300)
            .with_paginated_listings(true)
        );
    }

    #[test]
    #[serial]
    fn test_from_env_leaves_missing_credentials_to_validation() {
        clear_env();
        env::set_var("S3_BUCKET_NAME", "media");

        let config = BucketConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.bucket_name, "media");
        assert!(matches!(
            config.validate(),
            Err(BucketError::MissingCredentials)
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_invalid_expiry() {
        clear_env();
        env::set_var("S3_PRESIGNED_URL_EXPIRY_SECS", "fifteen minutes");

        let result = BucketConfig::from_env();
        clear_env();

        assert!(matches!(result, Err(BucketError::ConfigError(_))));
    }
}
