//! Cache backend abstraction for the Kratos session guard.
//!
//! The guard caches resolved sessions so that most requests skip the
//! identity-provider round-trip. This crate provides the storage side of
//! that: the [`CacheBackend`] trait, its error types, and an in-memory
//! implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        kratos-guard-authn (SessionCache)    │
//! │   HMAC-derived keys, JSON-encoded sessions  │
//! ├─────────────────────────────────────────────┤
//! │          kratos-guard-storage               │
//! │   CacheBackend trait (get, set_with_ttl,    │
//! │                       delete)               │
//! ├──────────────┬──────────────────────────────┤
//! │ MemoryBackend│   your backend (Redis, ...)  │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use kratos_guard_storage::{CacheBackend, MemoryBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set_with_ttl(b"session".to_vec(), b"{}".to_vec(), Duration::from_secs(300)).await?;
//!     assert!(backend.get(b"session").await?.is_some());
//!
//!     backend.delete(b"session").await?;
//!     assert!(backend.get(b"session").await?.is_none());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with [`FaultyBackend`](testutil::FaultyBackend)
//!   for fault-injection tests.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;

pub use backend::CacheBackend;
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use memory::{DEFAULT_MAX_ENTRIES, MemoryBackend};
