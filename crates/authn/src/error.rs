//! Guard error types.
//!
//! [`GuardError`] is the single error type returned by the guard. Its
//! variants follow the guard's error taxonomy:
//!
//! - [`GuardError::Unauthenticated`]: missing, invalid or expired session. Expected and silent.
//! - [`GuardError::InvalidUserScaffold`]: the user mapping is missing or produced an
//!   unidentified user. A configuration bug, not a per-request outcome.
//! - [`GuardError::Infrastructure`]: the identity provider or cache failed for a reason other
//!   than rejecting the session. Reported once per request, then propagated.
//! - [`GuardError::Config`]: invalid configuration detected at build time.

use http::StatusCode;
use kratos_guard_storage::{ConfigError, StorageError};
use thiserror::Error;

use crate::client::ClientError;

/// Operational failures that are neither the caller's fault nor an
/// authentication decision.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfrastructureError {
    /// The identity provider call failed.
    #[error("identity provider: {0}")]
    Provider(#[source] ClientError),

    /// The session cache backend failed.
    #[error("session cache: {0}")]
    Cache(#[source] StorageError),
}

/// Errors returned by the session guard.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuardError {
    /// No valid session accompanies the request.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The configured user factory is missing or produced an unusable user.
    #[error("Invalid user scaffold: {0}")]
    InvalidUserScaffold(String),

    /// The identity provider or cache failed.
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] InfrastructureError),

    /// Configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GuardError {
    /// Creates a new `InvalidUserScaffold` error.
    #[must_use]
    pub fn invalid_user_scaffold(message: impl Into<String>) -> Self {
        Self::InvalidUserScaffold(message.into())
    }

    /// Wraps an identity provider failure as an infrastructure error.
    #[must_use]
    pub fn provider(error: ClientError) -> Self {
        Self::Infrastructure(InfrastructureError::Provider(error))
    }

    /// Wraps a cache failure as an infrastructure error.
    #[must_use]
    pub fn cache(error: StorageError) -> Self {
        Self::Infrastructure(InfrastructureError::Cache(error))
    }

    /// Returns `true` for authentication denials.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Returns `true` for provider or cache failures.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }

    /// Suggested HTTP status for surfacing this error to a client.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Infrastructure(InfrastructureError::Provider(_)) => StatusCode::BAD_GATEWAY,
            Self::Infrastructure(_) | Self::InvalidUserScaffold(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Short, stable label used as a structured logging field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidUserScaffold(_) => "invalid_user_scaffold",
            Self::Infrastructure(InfrastructureError::Provider(_)) => "provider",
            Self::Infrastructure(InfrastructureError::Cache(_)) => "cache",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias for guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
