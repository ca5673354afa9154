//! Shared test utilities for cache backend testing.
//!
//! Feature-gated behind `testutil` to keep fault injection out of
//! production builds.
//!
//! ```toml
//! [dev-dependencies]
//! kratos-guard-storage = { path = "../storage", features = ["testutil"] }
//! ```

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    backend::CacheBackend,
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
};

/// Which operation a [`FaultyBackend`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail `get`.
    Get,
    /// Fail `set_with_ttl`.
    Set,
    /// Fail `delete`.
    Delete,
}

/// A [`MemoryBackend`] wrapper with switchable failures and call counters.
///
/// Failing operations return [`StorageError::Connection`], the same error a
/// real networked cache produces when it is unreachable. Hanging operations
/// never complete, like a cache that accepted the connection and went silent.
#[derive(Default)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
    hang_get: AtomicBool,
    hang_set: AtomicBool,
    hang_delete: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
}

impl FaultyBackend {
    /// Creates a backend with no faults enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with every operation failing.
    #[must_use]
    pub fn unavailable() -> Self {
        let backend = Self::new();
        backend.fail(Fault::Get);
        backend.fail(Fault::Set);
        backend.fail(Fault::Delete);
        backend
    }

    /// Enables a fault.
    pub fn fail(&self, fault: Fault) {
        self.flag(fault).store(true, Ordering::SeqCst);
    }

    /// Makes an operation never complete.
    pub fn hang(&self, fault: Fault) {
        self.hang_flag(fault).store(true, Ordering::SeqCst);
    }

    /// Disables a fault, including a hang.
    pub fn heal(&self, fault: Fault) {
        self.flag(fault).store(false, Ordering::SeqCst);
        self.hang_flag(fault).store(false, Ordering::SeqCst);
    }

    /// Number of `get` calls, including failed ones.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set_with_ttl` calls, including failed ones.
    #[must_use]
    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls, including failed ones.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// The wrapped backend, for seeding or inspecting entries directly.
    #[must_use]
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    fn flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::Get => &self.fail_get,
            Fault::Set => &self.fail_set,
            Fault::Delete => &self.fail_delete,
        }
    }

    fn hang_flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::Get => &self.hang_get,
            Fault::Set => &self.hang_set,
            Fault::Delete => &self.hang_delete,
        }
    }

    async fn check(&self, fault: Fault) -> StorageResult<()> {
        if self.hang_flag(fault).load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.flag(fault).load(Ordering::SeqCst) {
            return Err(StorageError::connection(format!("injected {fault:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FaultyBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(Fault::Get).await?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check(Fault::Set).await?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check(Fault::Delete).await?;
        self.inner.delete(key).await
    }
}

/// Assert that a [`StorageResult`] is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}
