//! Storage and configuration error types.
//!
//! Every [`CacheBackend`](crate::CacheBackend) implementation maps its
//! internal failures to [`StorageError`]. Callers in the guard never
//! surface these to end users: a failing cache degrades to a direct
//! identity-provider lookup.
//!
//! # Example
//!
//! ```
//! use kratos_guard_storage::{StorageError, StorageResult};
//!
//! fn lookup(_key: &[u8]) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::connection("redis unreachable"))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during cache backend operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// debugging tools to display the full error context.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Connection or network error talking to the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// A cached value could not be encoded or decoded.
    ///
    /// Usually indicates a corrupt entry or a schema change between
    /// deployments sharing one cache.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Catch-all for backend-specific errors.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,

    /// The caller abandoned the operation before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl StorageError {
    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Cancelled` error.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    /// Returns `true` for errors that may succeed on retry (connection, timeout).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

/// Validation errors raised while building configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {field}")]
    Missing {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A numeric or duration field is below its allowed minimum.
    #[error("{field} is below minimum: {value} < {min}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// The supplied value, rendered for display.
        value: String,
        /// The minimum allowed value, rendered for display.
        min: String,
    },

    /// A numeric or duration field is above its allowed maximum.
    #[error("{field} is above maximum: {value} > {max}")]
    AboveMaximum {
        /// Name of the offending field.
        field: &'static str,
        /// The supplied value, rendered for display.
        value: String,
        /// The maximum allowed value, rendered for display.
        max: String,
    },

    /// A field has a value that cannot be used.
    #[error("Invalid value for {field}: {message}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

impl ConfigError {
    /// Creates a new `Missing` error.
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::Missing { field }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { field, message: message.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            StorageError::connection("connection refused").to_string(),
            "Connection error: connection refused"
        );
        assert_eq!(
            StorageError::serialization("bad json").to_string(),
            "Serialization error: bad json"
        );
        assert_eq!(StorageError::internal("boom").to_string(), "Internal error: boom");
        assert_eq!(StorageError::timeout().to_string(), "Operation timeout");
        assert_eq!(StorageError::cancelled().to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_transient() {
        assert!(StorageError::connection("down").is_transient());
        assert!(StorageError::timeout().is_transient());
        assert!(!StorageError::serialization("bad").is_transient());
        assert!(!StorageError::internal("bad").is_transient());
        assert!(!StorageError::cancelled().is_transient());
    }

    #[test]
    fn test_source_chain_preserved() {
        let err = StorageError::connection_with_source("dial failed", StorageError::Timeout);
        let source = err.source().expect("source exists");
        assert_eq!(source.to_string(), "Operation timeout");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::missing("app_secret").to_string(),
            "Missing required field: app_secret"
        );

        let err = ConfigError::BelowMinimum {
            field: "ttl",
            value: "500ms".to_owned(),
            min: "1s".to_owned(),
        };
        assert_eq!(err.to_string(), "ttl is below minimum: 500ms < 1s");

        let err = ConfigError::AboveMaximum {
            field: "ttl",
            value: "400days".to_owned(),
            max: "1day".to_owned(),
        };
        assert_eq!(err.to_string(), "ttl is above maximum: 400days > 1day");

        let err = ConfigError::invalid("url", "relative URL without a base");
        assert_eq!(err.to_string(), "Invalid value for url: relative URL without a base");
    }
}
