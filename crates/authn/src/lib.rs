//! # Kratos Session Guard
//!
//! Authenticates HTTP requests by resolving an Ory Kratos session cookie
//! into an application user.
//!
//! This crate provides:
//! - **Session guard**: per-request resolution with memoization ([`SessionGuard`])
//! - **Identity client**: Kratos frontend API over `reqwest` ([`HttpIdentityClient`])
//! - **Session cache**: HMAC-keyed cache over any [`CacheBackend`] ([`SessionCache`])
//! - **Error classification**: 401/403 are denials, everything else is infrastructure
//!
//! ## Flow
//!
//! ```text
//! request ─▶ cookie ─▶ cache hit? ──yes──────────────────────┐
//!                          │ no                              ▼
//!                          └─▶ GET /sessions/whoami ─▶ Session ─▶ UserFactory ─▶ User
//!                                     │ 401/403                 (memoized per request)
//!                                     └─▶ Unauthenticated
//! ```
//!
//! Infrastructure failures (provider 5xx, timeouts, cache outages) are
//! reported once per request through the configured [`Reporter`]. Cache
//! failures never fail a request: the guard falls back to the provider.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::{HeaderMap, HeaderValue, header::COOKIE};
//! use kratos_guard_authn::{CacheSettings, GuardConfig, KratosAuth, MemoryBackend, Session, User};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GuardConfig::builder()
//!     .url("http://kratos:4433/")
//!     .cache(CacheSettings::builder().enabled(true).build()?)
//!     .app_secret("app-key")
//!     .logout_return_to("https://app.example.com/")
//!     .build()?;
//!
//! let auth = KratosAuth::builder()
//!     .config(config)
//!     .cache_backend(Arc::new(MemoryBackend::new()))
//!     .user_factory(Arc::new(|session: &Session| {
//!         let aal = session.authenticator_assurance_level.clone();
//!         User::with_id(session.identity_id()).with("aal", aal)
//!     }))
//!     .build()?;
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(COOKIE, HeaderValue::from_static("ory_kratos_session=MTcw..."));
//!
//! let mut guard = auth.guard(headers);
//! match guard.user().await {
//!     Ok(user) => println!("authenticated as {:?}", user.id()),
//!     Err(err) if err.is_authentication() => println!("please log in"),
//!     Err(err) => return Err(err.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the [`testutil`] module with [`MockIdentityClient`](testutil::MockIdentityClient)
//!   and [`RecordingReporter`](testutil::RecordingReporter).

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Guard factory.
pub mod auth;
/// Failure classification.
pub mod classify;
/// Identity provider client.
pub mod client;
/// Guard configuration.
pub mod config;
/// Cookie extraction.
pub mod cookie;
/// Guard error types.
pub mod error;
/// Per-request guard.
pub mod guard;
/// Logout redirect.
pub mod redirect;
/// Error reporting.
pub mod report;
mod resolver;
/// Session data model.
pub mod session;
/// HMAC-keyed session cache.
pub mod session_cache;
/// Shared test utilities (mocks, fixtures, assertion macros).
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Application user model.
pub mod user;

pub use auth::KratosAuth;
pub use classify::{Classification, ErrorClassifier};
pub use client::{ClientError, HttpIdentityClient, IdentityClient};
pub use config::{
    CacheSettings, DEFAULT_CACHE_TIMEOUT, DEFAULT_CACHE_TTL, DEFAULT_SESSION_COOKIE_NAME,
    GuardConfig, MAX_CACHE_TTL,
};
pub use cookie::CookieSource;
pub use error::{GuardError, InfrastructureError, Result};
pub use guard::{Guard, GuardState, SessionGuard};
pub use kratos_guard_storage::{CacheBackend, MemoryBackend};
pub use redirect::Redirect;
pub use report::{ReportScope, Reporter, TracingReporter};
pub use session::{AuthenticationMethod, Identity, LogoutFlow, Session};
pub use session_cache::SessionCache;
pub use user::{DefaultUserFactory, User, UserFactory};
