//! Cache backend trait definition.
//!
//! [`CacheBackend`] is the minimal key/value surface the session guard needs
//! from a cache: point reads, writes with a per-entry TTL, and deletes.
//! Keys and values are bytes; the guard owns serialization.
//!
//! # Implementing a Backend
//!
//! 1. Implement [`CacheBackend`] (all methods are async and must be `Send`)
//! 2. Map backend-specific errors to [`StorageError`](crate::StorageError)
//! 3. Never return an entry whose TTL has elapsed
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Abstract key/value cache with per-entry expiration.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations. Concurrent writers to the same key are allowed
/// to race; last write wins.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use bytes::Bytes;
/// use kratos_guard_storage::{CacheBackend, MemoryBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend
///     .set_with_ttl(b"key".to_vec(), b"value".to_vec(), Duration::from_secs(60))
///     .await
///     .unwrap();
/// let value = backend.get(b"key").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("value")));
/// # });
/// ```
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists and has not expired
    /// - `Ok(None)` if the key doesn't exist or has expired
    /// - `Err(...)` on backend errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair that expires after `ttl`.
    ///
    /// Overwrites any existing value and resets its expiration.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()>;

    /// Removes a key. Deleting a missing key is not an error.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;
}

#[async_trait]
impl<T: CacheBackend + ?Sized> CacheBackend for Arc<T> {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        (**self).set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        (**self).delete(key).await
    }
}
