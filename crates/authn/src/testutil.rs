//! Shared test utilities for session guard testing.
//!
//! Provides a scriptable [`MockIdentityClient`], a [`RecordingReporter`]
//! that counts reports, and helpers for building sessions and requests.
//! Feature-gated behind `testutil` to keep mocks out of production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! kratos-guard-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use kratos_guard_authn::testutil::{MockIdentityClient, sample_session};
//!
//! let client = MockIdentityClient::with_session(sample_session("identity-1"));
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use http::{HeaderMap, HeaderValue, header::COOKIE};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::{
    client::{ClientError, IdentityClient},
    error::GuardError,
    report::Reporter,
    session::{LogoutFlow, Session},
};

/// Logout URL returned by a fresh [`MockIdentityClient`].
pub const MOCK_LOGOUT_URL: &str = "https://kratos.test/self-service/logout?token=mock-logout-token";

/// What a [`MockIdentityClient`] call does.
#[derive(Debug, Clone)]
pub enum Behavior<T> {
    /// Succeed with this value.
    Respond(T),
    /// Fail with this error.
    Fail(ClientError),
    /// Never complete.
    Hang,
}

impl<T: Clone> Behavior<T> {
    async fn run(&self) -> Result<T, ClientError> {
        match self {
            Self::Respond(value) => Ok(value.clone()),
            Self::Fail(error) => Err(error.clone()),
            Self::Hang => std::future::pending().await,
        }
    }
}

/// Scriptable [`IdentityClient`] that counts calls.
///
/// A fresh client rejects every session with 401 and answers logout with
/// [`MOCK_LOGOUT_URL`].
pub struct MockIdentityClient {
    resolve: Mutex<Behavior<Session>>,
    logout: Mutex<Behavior<LogoutFlow>>,
    resolve_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    last_cookie_header: Mutex<Option<String>>,
    last_return_to: Mutex<Option<String>>,
}

impl MockIdentityClient {
    /// Creates a client that rejects every session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolve: Mutex::new(Behavior::Fail(ClientError::status(401, "Unauthorized"))),
            logout: Mutex::new(Behavior::Respond(LogoutFlow {
                logout_url: MOCK_LOGOUT_URL.to_owned(),
                logout_token: Some("mock-logout-token".to_owned()),
            })),
            resolve_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            last_cookie_header: Mutex::new(None),
            last_return_to: Mutex::new(None),
        }
    }

    /// Creates a client that resolves every cookie to `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let client = Self::new();
        client.respond_with(session);
        client
    }

    /// Resolve calls succeed with `session`.
    pub fn respond_with(&self, session: Session) {
        *self.resolve.lock() = Behavior::Respond(session);
    }

    /// Resolve calls fail with `error`.
    pub fn fail_with(&self, error: ClientError) {
        *self.resolve.lock() = Behavior::Fail(error);
    }

    /// Resolve calls fail with an HTTP status.
    pub fn fail_status(&self, status: u16) {
        self.fail_with(ClientError::status(status, format!("mock status {status}")));
    }

    /// Resolve calls never complete.
    pub fn hang(&self) {
        *self.resolve.lock() = Behavior::Hang;
    }

    /// Logout calls follow `behavior`.
    pub fn set_logout(&self, behavior: Behavior<LogoutFlow>) {
        *self.logout.lock() = behavior;
    }

    /// Logout calls fail with an HTTP status.
    pub fn fail_logout_status(&self, status: u16) {
        let error = ClientError::status(status, format!("mock status {status}"));
        self.set_logout(Behavior::Fail(error));
    }

    /// Number of `resolve_session` calls.
    #[must_use]
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Number of `create_logout_flow` calls.
    #[must_use]
    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    /// The `Cookie` header of the most recent call.
    #[must_use]
    pub fn last_cookie_header(&self) -> Option<String> {
        self.last_cookie_header.lock().clone()
    }

    /// The `return_to` of the most recent logout call.
    #[must_use]
    pub fn last_return_to(&self) -> Option<String> {
        self.last_return_to.lock().clone()
    }
}

impl Default for MockIdentityClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityClient for MockIdentityClient {
    async fn resolve_session(&self, cookie_header: &str) -> Result<Session, ClientError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cookie_header.lock() = Some(cookie_header.to_owned());
        let behavior = self.resolve.lock().clone();
        behavior.run().await
    }

    async fn create_logout_flow(
        &self,
        cookie_header: &str,
        return_to: Option<&str>,
    ) -> Result<LogoutFlow, ClientError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cookie_header.lock() = Some(cookie_header.to_owned());
        *self.last_return_to.lock() = return_to.map(str::to_owned);
        let behavior = self.logout.lock().clone();
        behavior.run().await
    }
}

/// [`Reporter`] that keeps every report it receives.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reports received.
    #[must_use]
    pub fn count(&self) -> usize {
        self.reports.lock().len()
    }

    /// The [`GuardError::kind`] of each report, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(kind, _)| kind.clone()).collect()
    }

    /// The display message of each report, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(_, message)| message.clone()).collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, error: &GuardError) {
        self.reports.lock().push((error.kind().to_owned(), error.to_string()));
    }
}

/// A Kratos `/sessions/whoami` body for `identity_id`, expiring in one hour.
#[must_use]
pub fn sample_whoami_json(identity_id: &str) -> Value {
    let now = Utc::now();
    json!({
        "id": format!("session-{identity_id}"),
        "active": true,
        "expires_at": (now + Duration::hours(1)).to_rfc3339(),
        "authenticated_at": now.to_rfc3339(),
        "issued_at": now.to_rfc3339(),
        "authenticator_assurance_level": "aal1",
        "authentication_methods": [
            {"method": "password", "aal": "aal1", "completed_at": now.to_rfc3339()}
        ],
        "identity": {
            "id": identity_id,
            "schema_id": "default",
            "state": "active",
            "traits": {"email": format!("{identity_id}@example.com")}
        }
    })
}

/// A session for `identity_id`, expiring in one hour.
///
/// # Panics
///
/// Never in practice; the fixture always deserializes.
#[must_use]
pub fn sample_session(identity_id: &str) -> Session {
    serde_json::from_value(sample_whoami_json(identity_id)).expect("sample session deserializes")
}

/// A header map carrying one `Cookie: {name}={value}` header.
///
/// # Panics
///
/// Panics if the cookie is not a valid header value.
#[must_use]
pub fn request_with_cookie(name: &str, value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{name}={value}")).expect("valid cookie header"),
    );
    headers
}

/// Assert that an expression is `Err` matching a [`GuardError`] pattern.
#[macro_export]
macro_rules! assert_guard_error {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err(ref e) if matches!(e, $pattern) => {},
            Err(e) => panic!("expected {}, got {e:?}", stringify!($pattern)),
            Ok(_) => panic!("expected {}, got Ok", stringify!($pattern)),
        }
    };
}
