//! In-memory cache backend.
//!
//! [`MemoryBackend`] implements [`CacheBackend`] on top of a
//! [`moka::future::Cache`] with a per-entry expiry policy, so each value
//! lives exactly as long as the TTL it was written with.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use kratos_guard_storage::{CacheBackend, MemoryBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend
//!         .set_with_ttl(b"greeting".to_vec(), b"hello".to_vec(), Duration::from_secs(30))
//!         .await
//!         .unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is process-local; sessions cached by one replica are invisible to others
//! - Capacity-bounded with LRU-style eviction, so a full cache simply misses more

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;

use crate::{
    backend::CacheBackend,
    error::{StorageError, StorageResult},
};

/// Default maximum number of cached entries.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
struct Entry {
    value: Bytes,
    ttl: Duration,
    expires_at: Instant,
}

/// Expiry policy that reads the TTL stored alongside each value.
///
/// Updates reset the expiry so an overwrite behaves like a fresh insert.
struct EntryExpiry;

impl moka::Expiry<Vec<u8>, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &Vec<u8>,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &Vec<u8>,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache backend with per-entry TTL.
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable. All clones share the same entries.
#[derive(Clone)]
pub struct MemoryBackend {
    entries: Cache<Vec<u8>, Entry>,
}

impl MemoryBackend {
    /// Creates a backend bounded to [`DEFAULT_MAX_ENTRIES`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Creates a backend bounded to `max_entries`.
    #[must_use]
    pub fn with_capacity(max_entries: u64) -> Self {
        let entries = Cache::builder().max_capacity(max_entries).expire_after(EntryExpiry).build();
        Self { entries }
    }

    /// Returns the current entry count.
    ///
    /// Eventually consistent; call [`run_pending_tasks`](Self::run_pending_tasks)
    /// first when an exact number matters.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Applies pending evictions and expirations.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    #[tracing::instrument(skip(self, key), fields(key_len = key.len()))]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let Some(entry) = self.entries.get(key).await else {
            return Ok(None);
        };

        // moka expires lazily; never hand out an entry past its deadline.
        if entry.expires_at <= Instant::now() {
            self.entries.invalidate(key).await;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    #[tracing::instrument(
        skip(self, key, value),
        fields(key_len = key.len(), value_len = value.len())
    )]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return Err(StorageError::internal(format!("TTL {ttl:?} is not representable")));
        };
        let entry = Entry { value: Bytes::from(value), ttl, expires_at };
        self.entries.insert(key, entry).await;
        Ok(())
    }

    #[tracing::instrument(skip(self, key), fields(key_len = key.len()))]
    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get(b"missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"key".to_vec(), b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("value")));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"temp".to_vec(), b"value".to_vec(), Duration::from_millis(100))
            .await
            .unwrap();

        assert!(backend.get(b"temp").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(backend.get(b"temp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"key".to_vec(), b"short".to_vec(), Duration::from_millis(100))
            .await
            .unwrap();
        backend
            .set_with_ttl(b"key".to_vec(), b"long".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("long")));
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_rejected() {
        let backend = MemoryBackend::new();
        let err = backend
            .set_with_ttl(b"key".to_vec(), b"value".to_vec(), Duration::MAX)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Internal { .. }));
        assert!(backend.get(b"key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"key".to_vec(), b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        backend.delete(b"key").await.unwrap();

        assert!(backend.get(b"key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let backend = MemoryBackend::new();
        assert!(backend.delete(b"never-set").await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend
            .set_with_ttl(b"shared".to_vec(), b"1".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(clone.get(b"shared").await.unwrap(), Some(Bytes::from("1")));

        clone.run_pending_tasks().await;
        assert_eq!(clone.entry_count(), 1);
    }
}
