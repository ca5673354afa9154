//! Shared guard factory.
//!
//! [`KratosAuth`] holds the long-lived collaborators (identity client,
//! session cache, reporter, user factory) and hands out a fresh
//! [`SessionGuard`] per request. Everything that can be checked up front is
//! checked in [`KratosAuth::builder`]'s `build()`, so a misconfigured
//! deployment fails at startup rather than on the first request.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::HeaderMap;
//! use kratos_guard_authn::{DefaultUserFactory, GuardConfig, KratosAuth};
//!
//! # async fn example(headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let auth = KratosAuth::builder()
//!     .config(GuardConfig::from_env()?)
//!     .user_factory(Arc::new(DefaultUserFactory))
//!     .build()?;
//!
//! let mut guard = auth.guard(headers);
//! if guard.check().await? {
//!     println!("hello {:?}", guard.user().await?.id());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use kratos_guard_storage::{CacheBackend, ConfigError};

use crate::{
    classify::ErrorClassifier,
    client::{ClientError, HttpIdentityClient, IdentityClient},
    config::GuardConfig,
    cookie::CookieSource,
    error::{GuardError, Result},
    guard::SessionGuard,
    report::{Reporter, TracingReporter},
    resolver::SessionResolver,
    session_cache::SessionCache,
    user::UserFactory,
};

fn default_reporter() -> Arc<dyn Reporter> {
    Arc::new(TracingReporter)
}

/// State shared by every guard built from one [`KratosAuth`].
pub(crate) struct AuthContext {
    pub(crate) config: GuardConfig,
    pub(crate) resolver: SessionResolver,
    pub(crate) user_factory: Arc<dyn UserFactory>,
}

/// Builds per-request [`SessionGuard`]s.
///
/// # Cloning
///
/// Cheap; clones share the same collaborators.
#[derive(Clone)]
pub struct KratosAuth {
    context: Arc<AuthContext>,
}

#[bon::bon]
impl KratosAuth {
    /// Creates a guard factory.
    ///
    /// When `client` is omitted an [`HttpIdentityClient`] is built from
    /// `config`. When caching is enabled, `cache_backend` is required.
    ///
    /// # Errors
    ///
    /// - [`GuardError::InvalidUserScaffold`] if `user_factory` is missing
    /// - [`GuardError::Config`] if `config` is invalid, its URLs do not parse, or caching is
    ///   enabled without a `cache_backend`
    /// - [`GuardError::Infrastructure`] if the default HTTP client cannot be built
    #[builder]
    pub fn new(
        config: GuardConfig,
        client: Option<Arc<dyn IdentityClient>>,
        cache_backend: Option<Arc<dyn CacheBackend>>,
        #[builder(default = default_reporter())] reporter: Arc<dyn Reporter>,
        user_factory: Option<Arc<dyn UserFactory>>,
    ) -> Result<Self> {
        let Some(user_factory) = user_factory else {
            return Err(GuardError::invalid_user_scaffold("no user factory configured"));
        };

        config.validate()?;

        let client: Arc<dyn IdentityClient> = match client {
            Some(client) => client,
            None => Arc::new(HttpIdentityClient::from_config(&config).map_err(|err| match err {
                ClientError::InvalidUrl(message) => {
                    GuardError::from(ConfigError::invalid("url", message))
                },
                other => GuardError::provider(other),
            })?),
        };

        let cache = if config.cache().is_enabled() {
            let backend = cache_backend.ok_or(ConfigError::missing("cache_backend"))?;
            let secret = config.app_secret().ok_or(ConfigError::missing("app_secret"))?;
            Some(
                SessionCache::new(backend, secret, config.cache().ttl())?
                    .with_timeout(config.cache().timeout()),
            )
        } else {
            if cache_backend.is_some() {
                tracing::debug!("cache backend supplied but caching is disabled");
            }
            None
        };

        tracing::info!(
            cookie = config.session_cookie_name(),
            cache_enabled = cache.is_some(),
            "session guard configured"
        );

        let resolver = SessionResolver::new(client, cache, ErrorClassifier::new(reporter));
        Ok(Self { context: Arc::new(AuthContext { config, resolver, user_factory }) })
    }

    /// Creates a guard bound to `request`.
    #[must_use]
    pub fn guard<R: CookieSource>(&self, request: R) -> SessionGuard<R> {
        SessionGuard::new(Arc::clone(&self.context), request)
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.context.config
    }

    /// The session cache, when caching is enabled.
    #[must_use]
    pub fn session_cache(&self) -> Option<&SessionCache> {
        self.context.resolver.cache()
    }
}

impl std::fmt::Debug for KratosAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KratosAuth")
            .field("config", &self.context.config)
            .field("cache", &self.context.resolver.cache())
            .finish_non_exhaustive()
    }
}
