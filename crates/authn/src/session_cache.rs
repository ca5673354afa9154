//! Session cache.
//!
//! Resolved sessions are stored in a [`CacheBackend`] under a key derived
//! from the cookie:
//!
//! ```text
//! kratos:cookie:{hex(HMAC-SHA256(key = app_secret, msg = cookie_value))}
//! ```
//!
//! The raw cookie never becomes part of a key, so a leaked cache cannot be
//! replayed as session credentials. Values are JSON-encoded [`Session`]s.
//!
//! # TTL
//!
//! Entries live for the configured TTL, capped at the session's own
//! remaining lifetime. A cached session whose `expires_at` has passed is
//! treated as a miss.
//!
//! # Deadlines
//!
//! Every backend call is bounded by the cache timeout (see
//! [`with_timeout`](SessionCache::with_timeout)). A call that overruns fails
//! with [`StorageError::Timeout`], so a stalled backend degrades to a cache
//! failure instead of holding the request.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use hmac::{Hmac, Mac};
use kratos_guard_storage::{CacheBackend, ConfigError, StorageError, StorageResult};
use sha2::Sha256;

use crate::{config::DEFAULT_CACHE_TIMEOUT, session::Session};

/// Prefix shared by every session cache key.
pub const CACHE_KEY_PREFIX: &str = "kratos:cookie:";

/// Caches resolved sessions keyed by an HMAC of the session cookie.
#[derive(Clone)]
pub struct SessionCache {
    backend: Arc<dyn CacheBackend>,
    mac: Hmac<Sha256>,
    ttl: Duration,
    timeout: Duration,
}

impl SessionCache {
    /// Creates a session cache over `backend`, with backend calls bounded by
    /// [`DEFAULT_CACHE_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `app_secret` is empty.
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        app_secret: &str,
        ttl: Duration,
    ) -> Result<Self, ConfigError> {
        if app_secret.is_empty() {
            return Err(ConfigError::missing("app_secret"));
        }
        let mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
            .map_err(|e| ConfigError::invalid("app_secret", e.to_string()))?;
        Ok(Self { backend, mac, ttl, timeout: DEFAULT_CACHE_TIMEOUT })
    }

    /// Replaces the deadline applied to each backend call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Derives the cache key for a cookie value.
    #[must_use]
    pub fn cache_key(&self, cookie_value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(cookie_value.as_bytes());
        format!("{CACHE_KEY_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Configured TTL, before capping at session expiry.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Deadline applied to each backend call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(&self, op: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
        tokio::time::timeout(self.timeout, op).await.map_err(|_| StorageError::timeout())?
    }

    /// Looks up a cached session.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, [`StorageError::Timeout`] if the backend
    /// overruns, or [`StorageError::Serialization`] if the stored payload is
    /// not a session.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Session>> {
        let Some(bytes) = self.bounded(self.backend.get(key.as_bytes())).await? else {
            return Ok(None);
        };

        let session: Session = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::serialization_with_source("corrupt cached session", e))?;

        if session.is_expired_at(Utc::now()) {
            tracing::debug!("cached session past its expiry");
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Stores a session.
    ///
    /// Sessions that have already expired are not stored.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, [`StorageError::Timeout`] if the backend
    /// overruns, or [`StorageError::Serialization`] if the session cannot be
    /// encoded.
    pub async fn put(&self, key: &str, session: &Session) -> StorageResult<()> {
        let ttl = match session.remaining_lifetime(Utc::now()) {
            Some(Duration::ZERO) => {
                tracing::debug!("not caching expired session");
                return Ok(());
            },
            Some(remaining) => self.ttl.min(remaining),
            None => self.ttl,
        };

        let value = serde_json::to_vec(session)
            .map_err(|e| StorageError::serialization_with_source("failed to encode session", e))?;

        self.bounded(self.backend.set_with_ttl(key.as_bytes().to_vec(), value, ttl)).await
    }

    /// Removes a cached session.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or [`StorageError::Timeout`] if the
    /// backend overruns.
    pub async fn forget(&self, key: &str) -> StorageResult<()> {
        self.bounded(self.backend.delete(key.as_bytes())).await
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("ttl", &self.ttl)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
