//! Per-request session guard.
//!
//! A [`SessionGuard`] is created for one inbound request by
//! [`KratosAuth::guard`](crate::KratosAuth::guard). It resolves the request's
//! session cookie at most once and answers every later question from that
//! outcome.
//!
//! # State machine
//!
//! ```text
//!              ┌─────────────── resolve ok ──────────────▶ Resolved(User)
//! Unresolved ──┤
//!              └── no cookie / 401 / 403 ────────────────▶ Denied
//! ```
//!
//! Infrastructure failures leave the guard `Unresolved`: the error is
//! reported once for the request and returned to the caller.
//!
//! Logout does not change the state. The redirect it returns ends the
//! request, and the next request resolves its cookie afresh.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::AuthContext,
    cookie::CookieSource,
    error::{GuardError, Result},
    redirect::Redirect,
    report::ReportScope,
    resolver::cookie_header,
    user::User,
};

/// Memoized resolution outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    /// Not resolved yet.
    Unresolved,
    /// A session was resolved into this user.
    Resolved(User),
    /// No valid session; every call answers `Unauthenticated`.
    Denied,
}

/// Framework-facing guard contract.
#[async_trait]
pub trait Guard: Send {
    /// Returns `true` if the request carries a valid session.
    async fn check(&mut self) -> Result<bool>;

    /// Returns the authenticated user.
    async fn user(&mut self) -> Result<&User>;

    /// Same as [`check`](Self::check); the cookie is the credential.
    async fn validate(&mut self, credentials: &HashMap<String, String>) -> Result<bool>;

    /// Starts a provider logout and returns where to send the browser.
    async fn logout(&mut self) -> Result<Redirect>;
}

/// Resolves one request's session cookie into a [`User`].
pub struct SessionGuard<R> {
    context: Arc<AuthContext>,
    request: R,
    state: GuardState,
    scope: ReportScope,
    cancel: Option<CancellationToken>,
}

impl<R: CookieSource> SessionGuard<R> {
    pub(crate) fn new(context: Arc<AuthContext>, request: R) -> Self {
        Self {
            context,
            request,
            state: GuardState::Unresolved,
            scope: ReportScope::new(),
            cancel: None,
        }
    }

    /// Aborts pending provider calls with an infrastructure error once
    /// `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Current memoized state.
    #[must_use]
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// The request this guard is bound to.
    #[must_use]
    pub fn request(&self) -> &R {
        &self.request
    }

    /// Returns `true` once this request has reported an infrastructure error.
    #[must_use]
    pub fn has_reported(&self) -> bool {
        self.scope.has_reported()
    }

    /// Returns `true` if the request carries a valid session.
    ///
    /// Authentication failures yield `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Propagates infrastructure and user-scaffold errors.
    #[tracing::instrument(skip(self))]
    pub async fn check(&mut self) -> Result<bool> {
        match self.user().await {
            Ok(user) => Ok(!user.is_empty()),
            Err(GuardError::Unauthenticated) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns the authenticated user, resolving the session on first call.
    ///
    /// # Errors
    ///
    /// - [`GuardError::Unauthenticated`] if the cookie is absent, empty or rejected
    /// - [`GuardError::Infrastructure`] if the provider could not answer
    /// - [`GuardError::InvalidUserScaffold`] if the user factory produced no id
    #[tracing::instrument(skip(self))]
    pub async fn user(&mut self) -> Result<&User> {
        if matches!(self.state, GuardState::Unresolved) {
            self.state = self.resolve_state().await?;
        }

        match &self.state {
            GuardState::Resolved(user) => Ok(user),
            GuardState::Denied | GuardState::Unresolved => Err(GuardError::Unauthenticated),
        }
    }

    /// Same as [`check`](Self::check); `credentials` are ignored.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub async fn validate(&mut self, _credentials: &HashMap<String, String>) -> Result<bool> {
        self.check().await
    }

    /// Creates a provider logout flow for the request's session.
    ///
    /// On success the cached session is dropped (best-effort, bounded by the
    /// cache timeout and the guard's cancellation token). The guard's state
    /// is left as it was.
    ///
    /// # Errors
    ///
    /// - [`GuardError::Unauthenticated`] if there is no cookie or the provider rejects it
    /// - [`GuardError::Infrastructure`] if the provider could not answer
    #[tracing::instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<Redirect> {
        let context = Arc::clone(&self.context);
        let cookie_name = context.config.session_cookie_name();
        let Some(cookie) = self.request.cookie(cookie_name) else {
            tracing::debug!("logout without session cookie");
            return Err(GuardError::Unauthenticated);
        };

        let flow = context
            .resolver
            .logout_flow(
                &cookie_header(cookie_name, &cookie),
                context.config.logout_return_to(),
                &mut self.scope,
                self.cancel.as_ref(),
            )
            .await?;

        context.resolver.forget(&cookie, &mut self.scope, self.cancel.as_ref()).await;

        let user_id = match &self.state {
            GuardState::Resolved(user) => user.id().map(str::to_owned),
            GuardState::Unresolved | GuardState::Denied => None,
        };

        tracing::info!(audit.action = "logout", user_id = ?user_id, "session logged out");
        Ok(Redirect::to(flow.logout_url))
    }

    async fn resolve_state(&mut self) -> Result<GuardState> {
        let context = Arc::clone(&self.context);
        let cookie_name = context.config.session_cookie_name();
        let Some(cookie) = self.request.cookie(cookie_name) else {
            tracing::debug!("no session cookie");
            return Ok(GuardState::Denied);
        };

        let session = match context
            .resolver
            .resolve(cookie_name, &cookie, &mut self.scope, self.cancel.as_ref())
            .await
        {
            Ok(session) => session,
            Err(GuardError::Unauthenticated) => return Ok(GuardState::Denied),
            Err(err) => return Err(err),
        };

        let user = context.user_factory.make_user(&session);
        if !user.is_identified() {
            tracing::error!(session_id = %session.id, "user factory returned a user without an id");
            return Err(GuardError::invalid_user_scaffold(
                "user factory returned a user without an id",
            ));
        }

        Ok(GuardState::Resolved(user))
    }
}

#[async_trait]
impl<R: CookieSource + Send + Sync> Guard for SessionGuard<R> {
    async fn check(&mut self) -> Result<bool> {
        SessionGuard::check(self).await
    }

    async fn user(&mut self) -> Result<&User> {
        SessionGuard::user(self).await
    }

    async fn validate(&mut self, credentials: &HashMap<String, String>) -> Result<bool> {
        SessionGuard::validate(self, credentials).await
    }

    async fn logout(&mut self) -> Result<Redirect> {
        SessionGuard::logout(self).await
    }
}

impl<R> std::fmt::Debug for SessionGuard<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("state", &self.state)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
