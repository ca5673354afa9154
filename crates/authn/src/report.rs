//! Error reporting sink and per-request deduplication.

use crate::error::GuardError;

/// Receives infrastructure errors worth an operator's attention.
///
/// Authentication denials never reach a reporter.
pub trait Reporter: Send + Sync {
    /// Records one error.
    fn report(&self, error: &GuardError);
}

impl<F> Reporter for F
where
    F: Fn(&GuardError) + Send + Sync,
{
    fn report(&self, error: &GuardError) {
        self(error);
    }
}

/// Default reporter: emits each error as a `tracing` error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, error: &GuardError) {
        tracing::error!(
            error = %error,
            kind = error.kind(),
            "session guard infrastructure failure"
        );
    }
}

/// Tracks whether the current request has already reported an error.
///
/// One scope lives inside each guard. Every failure on the request funnels
/// through [`report`](Self::report), so the sink sees at most one error per
/// request no matter how many operations retry against a failing provider.
#[derive(Debug, Default)]
pub struct ReportScope {
    reported: bool,
}

impl ReportScope {
    /// Creates a fresh scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards `error` to `reporter` unless this scope already reported.
    ///
    /// Returns `true` if the error was forwarded.
    pub fn report(&mut self, reporter: &dyn Reporter, error: &GuardError) -> bool {
        if self.reported {
            tracing::debug!(kind = error.kind(), "error already reported for this request");
            return false;
        }
        self.reported = true;
        reporter.report(error);
        true
    }

    /// Returns `true` once an error has been reported.
    #[must_use]
    pub fn has_reported(&self) -> bool {
        self.reported
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kratos_guard_storage::StorageError;

    use super::*;

    #[test]
    fn test_scope_reports_once() {
        let count = AtomicUsize::new(0);
        let reporter = |_: &GuardError| {
            count.fetch_add(1, Ordering::SeqCst);
        };
        let mut scope = ReportScope::new();
        let err = GuardError::cache(StorageError::timeout());

        assert!(!scope.has_reported());
        assert!(scope.report(&reporter, &err));
        assert!(!scope.report(&reporter, &err));
        assert!(!scope.report(&reporter, &GuardError::invalid_user_scaffold("x")));

        assert!(scope.has_reported());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_separate_scopes_report_independently() {
        let count = AtomicUsize::new(0);
        let reporter = |_: &GuardError| {
            count.fetch_add(1, Ordering::SeqCst);
        };
        let err = GuardError::cache(StorageError::timeout());

        ReportScope::new().report(&reporter, &err);
        ReportScope::new().report(&reporter, &err);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tracing_reporter_does_not_panic() {
        TracingReporter.report(&GuardError::cache(StorageError::connection("down")));
    }
}
