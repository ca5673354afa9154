//! Failure classification.
//!
//! The identity provider answers 401 or 403 when a session is missing,
//! expired or insufficient. Those are ordinary authentication outcomes. Any
//! other failure (5xx, transport, decode, timeout, cancellation, cache) means
//! the guard could not reach a decision and must be surfaced as
//! infrastructure, reported once per request.

use std::sync::Arc;

use kratos_guard_storage::StorageError;

use crate::{
    client::ClientError,
    error::GuardError,
    report::{ReportScope, Reporter},
};

/// How a provider failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The provider rejected the session.
    Unauthenticated,
    /// The provider could not answer.
    Infrastructure,
}

/// Returns `true` for statuses that mean "no valid session".
#[must_use]
pub fn is_authentication_status(status: u16) -> bool {
    matches!(status, 401 | 403)
}

/// Turns collaborator failures into [`GuardError`]s and reports the
/// infrastructure ones.
#[derive(Clone)]
pub struct ErrorClassifier {
    reporter: Arc<dyn Reporter>,
}

impl ErrorClassifier {
    /// Creates a classifier reporting to `reporter`.
    #[must_use]
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }

    /// Classifies a provider failure without side effects.
    #[must_use]
    pub fn classify(error: &ClientError) -> Classification {
        match error.status_code() {
            Some(status) if is_authentication_status(status) => Classification::Unauthenticated,
            _ => Classification::Infrastructure,
        }
    }

    /// Converts a provider failure, reporting it if it is infrastructure.
    pub fn provider_error(&self, error: ClientError, scope: &mut ReportScope) -> GuardError {
        match Self::classify(&error) {
            Classification::Unauthenticated => {
                tracing::debug!(status = error.status_code(), "identity provider rejected session");
                GuardError::Unauthenticated
            },
            Classification::Infrastructure => {
                let error = GuardError::provider(error);
                scope.report(self.reporter.as_ref(), &error);
                error
            },
        }
    }

    /// Converts a cache failure and reports it.
    pub fn cache_error(&self, error: StorageError, scope: &mut ReportScope) -> GuardError {
        let error = GuardError::cache(error);
        scope.report(self.reporter.as_ref(), &error);
        error
    }

    /// Reports an already-built error.
    pub fn report(&self, error: &GuardError, scope: &mut ReportScope) {
        scope.report(self.reporter.as_ref(), error);
    }
}

impl std::fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorClassifier").finish_non_exhaustive()
    }
}
