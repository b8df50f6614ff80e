//! Content-addressed storage for submission bodies and bounty metadata

pub mod ipfs;

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{BountyError, Result};

pub use ipfs::IpfsContentStore;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes`, returning the handle they can be fetched by.
    async fn put(&self, bytes: Vec<u8>) -> Result<String>;

    async fn get(&self, handle: &str) -> Result<Vec<u8>>;

    /// External reference for a handle
    fn uri(&self, handle: &str) -> String {
        handle.to_string()
    }
}

/// Handles are the hex SHA-256 of the content.
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    blobs: Arc<DashMap<String, Vec<u8>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a simulated outage for every put and get.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BountyError::Content("content store unavailable".to_string()));
        }
        Ok(())
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String> {
        self.check()?;
        let handle = content_hash(&bytes);
        self.blobs.insert(handle.clone(), bytes);
        Ok(handle)
    }

    async fn get(&self, handle: &str) -> Result<Vec<u8>> {
        self.check()?;
        self.blobs
            .get(handle)
            .map(|b| b.value().clone())
            .ok_or_else(|| BountyError::not_found("content", handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryContentStore::new();
        let handle = store.put(b"hello".to_vec()).await.unwrap();
        assert_eq!(
            handle,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(store.get(&handle).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_outage() {
        let store = MemoryContentStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.put(b"x".to_vec()).await,
            Err(BountyError::Content(_))
        ));
        store.set_unavailable(false);
        assert!(store.put(b"x".to_vec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_handle() {
        let store = MemoryContentStore::new();
        assert!(matches!(
            store.get("deadbeef").await,
            Err(BountyError::NotFound { .. })
        ));
    }
}
