//! Cookie-to-session resolution, through the cache when one is configured.

use std::{future::Future, sync::Arc};

use kratos_guard_storage::{StorageError, StorageResult};
use tokio_util::sync::CancellationToken;

use crate::{
    classify::ErrorClassifier,
    client::{ClientError, IdentityClient},
    error::Result,
    report::ReportScope,
    session::{LogoutFlow, Session},
    session_cache::SessionCache,
};

/// Builds the `Cookie` header forwarded to the identity provider.
pub(crate) fn cookie_header(name: &str, value: &str) -> String {
    format!("{name}={value}")
}

/// Awaits `fut`, giving up with `cancelled()` if `cancel` fires first.
async fn until_cancelled<T, E, F>(
    cancel: Option<&CancellationToken>,
    cancelled: fn() -> E,
    fut: F,
) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    match cancel {
        None => fut.await,
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(cancelled()),
            result = fut => result,
        },
    }
}

/// Awaits a provider call, giving up with [`ClientError::Cancelled`] if `cancel` fires first.
pub(crate) async fn cancellable<T, F>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> std::result::Result<T, ClientError>
where
    F: Future<Output = std::result::Result<T, ClientError>>,
{
    until_cancelled(cancel, || ClientError::Cancelled, fut).await
}

/// Awaits a cache call, giving up with [`StorageError::Cancelled`] if `cancel` fires first.
pub(crate) async fn cancellable_cache<T, F>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    until_cancelled(cancel, StorageError::cancelled, fut).await
}

pub(crate) struct SessionResolver {
    client: Arc<dyn IdentityClient>,
    cache: Option<SessionCache>,
    classifier: ErrorClassifier,
}

impl SessionResolver {
    pub(crate) fn new(
        client: Arc<dyn IdentityClient>,
        cache: Option<SessionCache>,
        classifier: ErrorClassifier,
    ) -> Self {
        Self { client, cache, classifier }
    }

    pub(crate) fn cache(&self) -> Option<&SessionCache> {
        self.cache.as_ref()
    }

    pub(crate) async fn resolve(
        &self,
        cookie_name: &str,
        cookie_value: &str,
        scope: &mut ReportScope,
        cancel: Option<&CancellationToken>,
    ) -> Result<Session> {
        let header = cookie_header(cookie_name, cookie_value);

        let Some(cache) = &self.cache else {
            return self.fetch(&header, scope, cancel).await;
        };

        let key = cache.cache_key(cookie_value);
        match cancellable_cache(cancel, cache.get(&key)).await {
            Ok(Some(session)) => {
                tracing::debug!(cache = "session", "cache hit");
                return Ok(session);
            },
            Ok(None) => tracing::debug!(cache = "session", "cache miss"),
            Err(err @ StorageError::Cancelled) => {
                return Err(self.classifier.cache_error(err, scope));
            },
            Err(err) => {
                let error = self.classifier.cache_error(err, scope);
                tracing::warn!(error = %error, "session cache read failed, resolving directly");
                return self.fetch(&header, scope, cancel).await;
            },
        }

        let session = self.fetch(&header, scope, cancel).await?;

        if let Err(err) = cancellable_cache(cancel, cache.put(&key, &session)).await {
            let error = self.classifier.cache_error(err, scope);
            tracing::warn!(error = %error, "session cache write failed");
        }

        Ok(session)
    }

    pub(crate) async fn logout_flow(
        &self,
        cookie_header: &str,
        return_to: Option<&str>,
        scope: &mut ReportScope,
        cancel: Option<&CancellationToken>,
    ) -> Result<LogoutFlow> {
        cancellable(cancel, self.client.create_logout_flow(cookie_header, return_to))
            .await
            .map_err(|err| self.classifier.provider_error(err, scope))
    }

    /// Drops the cached session for `cookie_value`. Failures are reported, never returned.
    pub(crate) async fn forget(
        &self,
        cookie_value: &str,
        scope: &mut ReportScope,
        cancel: Option<&CancellationToken>,
    ) {
        let Some(cache) = &self.cache else {
            return;
        };
        let key = cache.cache_key(cookie_value);
        if let Err(err) = cancellable_cache(cancel, cache.forget(&key)).await {
            let error = self.classifier.cache_error(err, scope);
            tracing::warn!(error = %error, "session cache invalidation failed");
        }
    }

    async fn fetch(
        &self,
        cookie_header: &str,
        scope: &mut ReportScope,
        cancel: Option<&CancellationToken>,
    ) -> Result<Session> {
        cancellable(cancel, self.client.resolve_session(cookie_header))
            .await
            .map_err(|err| self.classifier.provider_error(err, scope))
    }
}
