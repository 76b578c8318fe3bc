use anyhow::Result;
use async_trait::async_trait;

/// Raw document bytes addressed by a stable storage key
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}
