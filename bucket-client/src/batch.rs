//! Concurrent presigning of listed objects

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::{store::ObjectStore, BucketError, BucketResult};

/// A presign request of a batch that did not produce a URL
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the object in the listing
    pub index: usize,
    /// Key of the object
    pub key: String,
    /// Why presigning failed
    pub error: BucketError,
}

/// Result of presigning every object under a prefix
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every object produced a URL, in listing order
    Complete(Vec<String>),
    /// Some objects failed; `urls` holds the successes in listing order
    Partial {
        /// URLs of the objects that were presigned
        urls: Vec<String>,
        /// Objects that were not, ordered by arrival
        failures: Vec<BatchFailure>,
    },
    /// Every object failed; carries the first failure that arrived
    Failed(BucketError),
}

impl BatchOutcome {
    /// URLs produced by the batch, empty when it failed
    #[must_use]
    pub fn urls(&self) -> &[String] {
        match self {
            Self::Complete(urls) | Self::Partial { urls, .. } => urls,
            Self::Failed(_) => &[],
        }
    }

    /// Whether some but not all objects failed
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }

    /// Collapses the outcome into the URLs, treating a partial batch as success
    ///
    /// # Errors
    ///
    /// Returns `BucketError::AllPresignsFailed` wrapping the first failure when
    /// no object could be presigned
    pub fn into_urls(self) -> BucketResult<Vec<String>> {
        match self {
            Self::Complete(urls) | Self::Partial { urls, .. } => Ok(urls),
            Self::Failed(error) => Err(BucketError::AllPresignsFailed(Box::new(error))),
        }
    }
}

struct PresignResult {
    index: usize,
    key: String,
    result: BucketResult<String>,
}

/// Presigns every key on its own task and reassembles the URLs in key order.
///
/// Each task reports its index with the result, so completion order does not
/// affect the output. Must be called from within a tokio runtime.
pub(crate) async fn presign_all(
    store: Arc<dyn ObjectStore>,
    keys: Vec<String>,
    expires_in: Duration,
) -> BatchOutcome {
    let total = keys.len();
    if total == 0 {
        return BatchOutcome::Complete(Vec::new());
    }

    let (tx, mut rx) = mpsc::channel::<PresignResult>(total);

    for (index, key) in keys.iter().cloned().enumerate() {
        let tx = tx.clone();
        let store = Arc::clone(&store);

        tokio::spawn(async move {
            let result = store.presign_get_object(&key, expires_in).await;
            // Fails only once the receiver is dropped, i.e. the caller went away
            let _ = tx.send(PresignResult { index, key, result }).await;
        });
    }

    // The channel closes once the last task drops its sender
    drop(tx);

    let mut slots: Vec<Option<String>> = vec![None; total];
    let mut reported = vec![false; total];
    let mut failures = Vec::new();

    while let Some(PresignResult { index, key, result }) = rx.recv().await {
        reported[index] = true;
        match result {
            Ok(url) => slots[index] = Some(url),
            Err(e) => {
                error!(
                    index,
                    key = %key,
                    error = %e,
                    "Failed to get presigned URL"
                );
                failures.push(BatchFailure {
                    index,
                    key,
                    error: e,
                });
            }
        }
    }

    // A task that panicked never reports back
    for (index, key) in keys.into_iter().enumerate() {
        if !reported[index] {
            error!(index, key = %key, "Presign task ended without reporting");
            failures.push(BatchFailure {
                index,
                key,
                error: BucketError::Presign("presign task ended without reporting".to_string()),
            });
        }
    }

    let urls: Vec<String> = slots.into_iter().flatten().collect();

    if failures.is_empty() {
        return BatchOutcome::Complete(urls);
    }

    if urls.is_empty() {
        let first = failures.swap_remove(0);
        return BatchOutcome::Failed(first.error);
    }

    warn!(
        "{} out of {} presigned URLs failed to generate",
        failures.len(),
        total
    );

    BatchOutcome::Partial { urls, failures }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{mock::MemoryStore, normalize_url};

    const ENDPOINT: &str = "http://mock.local";
    const BUCKET: &str = "media";

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn normalized(urls: &[String]) -> Vec<&str> {
        urls.iter().map(|url| normalize_url(url)).collect()
    }

    #[tokio::test]
    async fn test_empty_key_list_is_complete() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new(ENDPOINT, BUCKET));

        let outcome = presign_all(store, Vec::new(), Duration::from_secs(900)).await;

        assert!(matches!(&outcome, BatchOutcome::Complete(urls) if urls.is_empty()));
        assert_eq!(outcome.into_urls().unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_order_follows_keys_not_completion() {
        let store: Arc<dyn ObjectStore> = Arc::new(
            MemoryStore::new(ENDPOINT, BUCKET)
                .with_presign_delay("obj/b", Duration::from_millis(150))
                .with_presign_delay("obj/a", Duration::from_millis(50)),
        );

        let outcome = presign_all(
            store,
            keys(&["obj/a", "obj/b", "obj/c"]),
            Duration::from_secs(900),
        )
        .await;

        assert!(matches!(outcome, BatchOutcome::Complete(_)));
        assert_eq!(
            normalized(outcome.urls()),
            vec![
                "http://mock.local/media/obj/a",
                "http://mock.local/media/obj/b",
                "http://mock.local/media/obj/c",
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes_in_order() {
        let store: Arc<dyn ObjectStore> = Arc::new(
            MemoryStore::new(ENDPOINT, BUCKET)
                .with_presign_failure("p/2")
                .with_presign_failure("p/4"),
        );

        let outcome = presign_all(
            store,
            keys(&["p/1", "p/2", "p/3", "p/4", "p/5"]),
            Duration::from_secs(900),
        )
        .await;

        assert!(outcome.is_degraded());
        let BatchOutcome::Partial { urls, failures } = outcome else {
            panic!("expected a partial outcome");
        };

        assert_eq!(
            normalized(&urls),
            vec![
                "http://mock.local/media/p/1",
                "http://mock.local/media/p/3",
                "http://mock.local/media/p/5",
            ]
        );

        let mut failed: Vec<(usize, String)> = failures
            .into_iter()
            .map(|failure| (failure.index, failure.key))
            .collect();
        failed.sort();
        assert_eq!(failed, vec![(1, "p/2".to_string()), (3, "p/4".to_string())]);
    }

    #[tokio::test]
    async fn test_total_failure_reports_first_error() {
        let store: Arc<dyn ObjectStore> = Arc::new(
            MemoryStore::new(ENDPOINT, BUCKET)
                .with_presign_failure("x")
                .with_presign_failure("y"),
        );

        let outcome = presign_all(store, keys(&["x", "y"]), Duration::from_secs(900)).await;

        assert!(outcome.urls().is_empty());
        assert!(!outcome.is_degraded());
        match outcome.into_urls() {
            Err(BucketError::AllPresignsFailed(first)) => {
                assert!(matches!(*first, BucketError::Presign(_)));
            }
            other => panic!("expected AllPresignsFailed, got {other:?}"),
        }
    }
}
