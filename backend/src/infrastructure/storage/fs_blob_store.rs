/// Blob store backed by a local directory tree
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::application::ports::BlobStore;

/// Stores each blob at `<root>/<key>`; keys are relative, slash-separated paths
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key below the root, rejecting anything that could escape it
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let mut resolved = self.root.clone();
        let mut parts = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    parts += 1;
                }
                Component::CurDir => {}
                _ => anyhow::bail!("Invalid blob key: {}", key),
            }
        }

        anyhow::ensure!(parts > 0, "Invalid blob key: {:?}", key);
        Ok(resolved)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        debug!("Reading blob {}", path.display());
        fs::read(&path)
            .await
            .with_context(|| format!("Failed to read blob {}", key))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory for blob {}", key))?;
        }
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write blob {}", key))?;
        debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete blob {}", key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_fetch_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());
        let key = "agents/agent-1/doc-1/pricing.txt";

        store.put(key, b"Enterprise plan: $40/seat").await.unwrap();
        assert!(temp_dir.path().join(key).is_file());
        assert_eq!(store.fetch(key).await.unwrap(), b"Enterprise plan: $40/seat");

        store.delete(key).await.unwrap();
        assert!(store.fetch(key).await.is_err());
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        assert!(store.put("../outside.txt", b"x").await.is_err());
        assert!(store.put("agents/../../outside.txt", b"x").await.is_err());
        assert!(store.put("/etc/passwd", b"x").await.is_err());
        assert!(store.put("", b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_blob_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());
        let err = store.fetch("agents/a/missing.pdf").await.unwrap_err();
        assert!(format!("{:#}", err).contains("agents/a/missing.pdf"));
    }
}
