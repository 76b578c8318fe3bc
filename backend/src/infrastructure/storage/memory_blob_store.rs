use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::application::ports::BlobStore;

/// Blob store kept in process memory
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.lock().await.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Blob not found: {}", key))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let store = InMemoryBlobStore::new();
        store.put("k", b"bytes").await.unwrap();
        assert!(store.contains("k").await);
        assert_eq!(store.fetch("k").await.unwrap(), b"bytes");

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.fetch("k").await.is_err());
    }
}
