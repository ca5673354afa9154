//! Identity provider client.
//!
//! [`IdentityClient`] is the RPC boundary between the guard and Ory Kratos.
//! The guard only needs two calls: resolve the session behind a cookie, and
//! create a browser logout flow for it. [`HttpIdentityClient`] implements
//! both against the Kratos frontend API using `reqwest`.
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | [`resolve_session`](IdentityClient::resolve_session) | `GET {url}/sessions/whoami` |
//! | [`create_logout_flow`](IdentityClient::create_logout_flow) | `GET {url}/self-service/logout/browser?return_to=...` |
//! | [`check_ready`](HttpIdentityClient::check_ready) | `GET {admin_url}/health/ready` |
//!
//! The `Cookie` header is forwarded verbatim and is never logged.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use kratos_guard_storage::BoxError;
use reqwest::{StatusCode, Url, header};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    config::GuardConfig,
    session::{LogoutFlow, Session},
};

/// Errors returned by an [`IdentityClient`].
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The provider answered with a non-success status.
    #[error("Identity provider responded with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, or the canonical reason.
        message: String,
    },

    /// The request never produced a response.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The request exceeded its deadline.
    #[error("Identity provider request timed out")]
    Timeout,

    /// The request was cancelled by the caller.
    #[error("Identity provider request cancelled")]
    Cancelled,

    /// The provider is reachable but reports itself as not ready.
    #[error("Identity provider not ready: {0}")]
    NotReady(String),

    /// A configured URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    /// Creates a new `Transport` error with a source.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Decode` error with a source.
    #[must_use]
    pub fn decode_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Decode { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// The HTTP status carried by this error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout;
        }
        if error.is_decode() {
            return Self::decode_with_source("invalid response body", error);
        }
        if let Some(status) = error.status() {
            return Self::status(status.as_u16(), error.to_string());
        }
        Self::transport_with_source("request failed", error)
    }
}

/// The identity provider operations the guard depends on.
///
/// `cookie_header` is a complete `Cookie` header value, e.g.
/// `ory_kratos_session=MTY...`.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Resolves the session the cookie refers to.
    ///
    /// A rejected session must surface as [`ClientError::Status`] with the
    /// provider's 401 or 403 so the guard can tell it apart from outages.
    async fn resolve_session(&self, cookie_header: &str) -> Result<Session, ClientError>;

    /// Creates a browser logout flow for the session the cookie refers to.
    async fn create_logout_flow(
        &self,
        cookie_header: &str,
        return_to: Option<&str>,
    ) -> Result<LogoutFlow, ClientError>;
}

#[async_trait]
impl<T: IdentityClient + ?Sized> IdentityClient for Arc<T> {
    async fn resolve_session(&self, cookie_header: &str) -> Result<Session, ClientError> {
        (**self).resolve_session(cookie_header).await
    }

    async fn create_logout_flow(
        &self,
        cookie_header: &str,
        return_to: Option<&str>,
    ) -> Result<LogoutFlow, ClientError> {
        (**self).create_logout_flow(cookie_header, return_to).await
    }
}

#[derive(Deserialize)]
struct KratosErrorBody {
    error: KratosErrorDetail,
}

#[derive(Deserialize)]
struct KratosErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Extracts a human-readable message from a Kratos error body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<KratosErrorBody>(body)
        .ok()
        .and_then(|body| body.error.message.or(body.error.reason))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status").to_owned())
}

/// Parses a base URL, forcing a trailing slash so relative joins append.
fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(format!("{raw}: not a base URL")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn endpoint(base: &Url, path: &str) -> Result<Url, ClientError> {
    base.join(path).map_err(|e| ClientError::InvalidUrl(format!("{base}{path}: {e}")))
}

/// `reqwest`-backed [`IdentityClient`] for the Kratos frontend API.
///
/// # Cloning
///
/// Cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: Url,
    admin_url: Url,
    debug: bool,
}

impl HttpIdentityClient {
    /// Creates a client for `base_url` with the default request timeout.
    ///
    /// The admin URL defaults to `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if `base_url` does not parse, or
    /// [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = build_http_client(crate::config::DEFAULT_REQUEST_TIMEOUT)?;
        Self::with_http_client(http, base_url, base_url, false)
    }

    /// Creates a client from a [`GuardConfig`], honoring its URLs, request
    /// timeout and debug flag.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_config(config: &GuardConfig) -> Result<Self, ClientError> {
        let http = build_http_client(config.request_timeout())?;
        Self::with_http_client(http, config.url(), config.admin_url(), config.debug())
    }

    /// Creates a client around a caller-supplied `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if either URL does not parse.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: &str,
        admin_url: &str,
        debug: bool,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
            admin_url: parse_base_url(admin_url)?,
            debug,
        })
    }

    /// The frontend API base URL, always ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Checks the admin API readiness endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotReady`] when the provider answers with a
    /// non-success status, or a transport error when it cannot be reached.
    #[tracing::instrument(skip(self))]
    pub async fn check_ready(&self) -> Result<(), ClientError> {
        let url = endpoint(&self.admin_url, "health/ready")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("Unknown status").to_owned()
        } else {
            body.trim().to_owned()
        };
        tracing::warn!(status = status.as_u16(), "identity provider not ready");
        Err(ClientError::NotReady(detail))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        cookie_header: &str,
    ) -> Result<T, ClientError> {
        let path = url.path().to_owned();
        let response = self
            .http
            .get(url)
            .header(header::COOKIE, cookie_header)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if self.debug {
            tracing::debug!(
                path = %path,
                status = status.as_u16(),
                bytes = body.len(),
                "kratos response"
            );
        }

        if !status.is_success() {
            return Err(ClientError::status(status.as_u16(), error_message(status, &body)));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ClientError::decode_with_source(format!("unexpected body from {path}"), e))
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::transport_with_source("failed to build HTTP client", e))
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn resolve_session(&self, cookie_header: &str) -> Result<Session, ClientError> {
        let url = endpoint(&self.base_url, "sessions/whoami")?;
        self.get_json(url, cookie_header).await
    }

    async fn create_logout_flow(
        &self,
        cookie_header: &str,
        return_to: Option<&str>,
    ) -> Result<LogoutFlow, ClientError> {
        let mut url = endpoint(&self.base_url, "self-service/logout/browser")?;
        if let Some(return_to) = return_to {
            url.query_pairs_mut().append_pair("return_to", return_to);
        }
        self.get_json(url, cookie_header).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        let err = ClientError::status(401, "No valid session credentials found in the request.");
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(ClientError::Timeout.status_code(), None);
        assert_eq!(ClientError::Cancelled.status_code(), None);
    }

    #[test]
    fn test_error_message_from_kratos_body() {
        let body = br#"{"error":{"code":401,"status":"Unauthorized","reason":"No session","message":"No valid session credentials found in the request."}}"#;
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, body),
            "No valid session credentials found in the request."
        );

        let body = br#"{"error":{"code":403,"reason":"aal2 required"}}"#;
        assert_eq!(error_message(StatusCode::FORBIDDEN, body), "aal2 required");
    }

    #[test]
    fn test_error_message_falls_back_to_reason_phrase() {
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, b"<html>oops</html>"),
            "Internal Server Error"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, b""), "Bad Gateway");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("http://kratos:4433/public").unwrap();
        assert_eq!(url.as_str(), "http://kratos:4433/public/");
        assert_eq!(
            endpoint(&url, "sessions/whoami").unwrap().as_str(),
            "http://kratos:4433/public/sessions/whoami"
        );

        let url = parse_base_url("http://localhost:4434/").unwrap();
        assert_eq!(
            endpoint(&url, "health/ready").unwrap().as_str(),
            "http://localhost:4434/health/ready"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(parse_base_url("not a url"), Err(ClientError::InvalidUrl(_))));
        assert!(matches!(
            parse_base_url("mailto:kratos@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(HttpIdentityClient::new("::"), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_client_error_is_clone_and_keeps_source() {
        use std::error::Error;

        let json_err = serde_json::from_str::<Session>("{").unwrap_err();
        let err = ClientError::decode_with_source("bad body", json_err);
        let cloned = err.clone();

        assert_eq!(cloned.to_string(), "Decode error: bad body");
        assert!(cloned.source().is_some());
    }
}
