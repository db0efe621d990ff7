use std::sync::Arc;

use bucket_client::{mock::MemoryStore, BucketClient};

pub const MOCK_ENDPOINT: &str = "http://mock.local";
pub const MOCK_BUCKET: &str = "media";

/// Setup test environment variables and tracing
pub fn setup_test_env() {
    // Load test environment variables
    dotenvy::from_path(".env.example").ok();

    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// Client over an in-memory store, with the store kept for inspection
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub client: BucketClient,
}

impl TestContext {
    pub fn new(store: MemoryStore) -> Self {
        setup_test_env();

        let store = Arc::new(store);
        let client = BucketClient::with_store(store.clone(), MOCK_BUCKET, MOCK_ENDPOINT);

        Self { store, client }
    }

    pub fn healthy() -> Self {
        Self::new(MemoryStore::new(MOCK_ENDPOINT, MOCK_BUCKET))
    }

    /// Seeds `keys` with placeholder content
    pub async fn seed(&self, keys: &[&str]) {
        for key in keys {
            self.store.insert(*key, key.as_bytes(), "text/plain").await;
        }
    }
}
