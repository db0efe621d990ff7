//! In-memory object store for tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use tokio::sync::RwLock;

use crate::{
    presign::validate_presign_expiry,
    store::{ObjectListing, ObjectStore},
    BucketError, BucketResult,
};

/// Page size S3 applies when a listing request does not set one
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object held by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object bytes
    pub body: Vec<u8>,
    /// Content type given on upload
    pub content_type: String,
}

/// [`ObjectStore`] that keeps objects in memory and can inject failures.
///
/// Keys list in lexicographic order like S3. Presigned URLs are path-style
/// (`{endpoint}/{bucket}/{key}`) with a query whose signature changes on
/// every call.
pub struct MemoryStore {
    endpoint: String,
    bucket_name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    signatures: AtomicU64,
    page_size: usize,
    presign_failures: HashSet<String>,
    presign_delays: HashMap<String, Duration>,
    fail_put: bool,
    fail_delete: bool,
    fail_head: bool,
    fail_list: bool,
}

impl MemoryStore {
    /// Creates an empty store that behaves like a healthy bucket
    #[must_use]
    pub fn new(endpoint: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket_name: bucket_name.into(),
            objects: RwLock::new(BTreeMap::new()),
            signatures: AtomicU64::new(0),
            page_size: DEFAULT_PAGE_SIZE,
            presign_failures: HashSet::new(),
            presign_delays: HashMap::new(),
            fail_put: false,
            fail_delete: false,
            fail_head: false,
            fail_list: false,
        }
    }

    /// Limits how many keys a single listing page returns
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes presigning `key` fail
    #[must_use]
    pub fn with_presign_failure(mut self, key: impl Into<String>) -> Self {
        self.presign_failures.insert(key.into());
        self
    }

    /// Delays presigning `key` by `delay`
    #[must_use]
    pub fn with_presign_delay(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.presign_delays.insert(key.into(), delay);
        self
    }

    /// Makes every put fail
    #[must_use]
    pub fn with_put_failure(mut self) -> Self {
        self.fail_put = true;
        self
    }

    /// Makes every delete fail
    #[must_use]
    pub fn with_delete_failure(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Makes every head request fail with an upstream error
    #[must_use]
    pub fn with_head_failure(mut self) -> Self {
        self.fail_head = true;
        self
    }

    /// Makes every listing fail
    #[must_use]
    pub fn with_list_failure(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Stores an object directly, bypassing failure injection
    pub async fn insert(
        &self,
        key: impl Into<String>,
        body: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
    ) {
        self.objects.write().await.insert(
            key.into(),
            StoredObject {
                body: body.into(),
                content_type: content_type.into(),
            },
        );
    }

    /// Returns a copy of the object under `key`
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> BucketResult<()> {
        if self.fail_put {
            return Err(BucketError::PutObject(format!("injected failure for {key}")));
        }

        let body = body
            .collect()
            .await
            .map_err(|e| BucketError::PutObject(e.to_string()))?
            .into_bytes()
            .to_vec();

        self.insert(key, body, content_type).await;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> BucketResult<()> {
        if self.fail_delete {
            return Err(BucketError::DeleteObject(format!(
                "injected failure for {key}"
            )));
        }

        // S3 deletes are idempotent
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn head_object(&self, key: &str) -> BucketResult<()> {
        if self.fail_head {
            return Err(BucketError::UpstreamError(format!(
                "injected failure for {key}"
            )));
        }

        if self.objects.read().await.contains_key(key) {
            Ok(())
        } else {
            Err(BucketError::ObjectNotFound(key.to_string()))
        }
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> BucketResult<ObjectListing> {
        if self.fail_list {
            return Err(BucketError::ListObjects(format!(
                "injected failure for prefix {prefix}"
            )));
        }

        let objects = self.objects.read().await;
        let mut matching = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| {
                continuation_token
                    .as_deref()
                    .is_none_or(|after| key.as_str() > after)
            });

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next_continuation_token = if matching.next().is_some() {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ObjectListing {
            keys,
            next_continuation_token,
        })
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> BucketResult<String> {
        validate_presign_expiry(expires_in)?;

        if let Some(delay) = self.presign_delays.get(key) {
            tokio::time::sleep(*delay).await;
        }

        if self.presign_failures.contains(key) {
            return Err(BucketError::Presign(format!("injected failure for {key}")));
        }

        let signature = self.signatures.fetch_add(1, Ordering::Relaxed);
        Ok(format!(
            "{}/{}/{}?X-Amz-Expires={}&X-Amz-Signature={signature:016x}",
            self.endpoint.trim_end_matches('/'),
            self.bucket_name,
            key,
            expires_in.as_secs(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_listing_pages_follow_continuation_tokens() {
        let store = MemoryStore::new("http://mock.local", "media").with_page_size(2);
        for key in ["a/1", "a/2", "a/3", "b/1"] {
            store.insert(key, "x", "text/plain").await;
        }

        let first = store.list_objects("a/", None).await.unwrap();
        assert_eq!(first.keys, vec!["a/1".to_string(), "a/2".to_string()]);
        assert_eq!(first.next_continuation_token.as_deref(), Some("a/2"));

        let second = store
            .list_objects("a/", first.next_continuation_token)
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["a/3".to_string()]);
        assert_eq!(second.next_continuation_token, None);
    }

    #[tokio::test]
    async fn test_presigned_urls_differ_only_in_query() {
        let store = MemoryStore::new("http://mock.local/", "media");

        let first = store
            .presign_get_object("k", Duration::from_secs(60))
            .await
            .unwrap();
        let second = store
            .presign_get_object("k", Duration::from_secs(60))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("http://mock.local/media/k?X-Amz-Expires=60&"));
    }
}
