//! Guard configuration.
//!
//! [`GuardConfig`] can be built three ways, all of which validate:
//!
//! - [`GuardConfig::builder`] for programmatic setup
//! - serde deserialization (durations use `humantime`, e.g. `"5m"`), followed by
//!   [`GuardConfig::validate`]
//! - [`GuardConfig::from_env`] for the `KRATOS_*` / `APP_KEY` environment variables
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use kratos_guard_authn::{CacheSettings, GuardConfig};
//!
//! let config = GuardConfig::builder()
//!     .url("http://kratos:4433/")
//!     .cache(CacheSettings::builder().enabled(true).ttl(Duration::from_secs(60)).build()?)
//!     .app_secret("base64:c2VjcmV0")
//!     .build()?;
//!
//! assert_eq!(config.session_cookie_name(), "ory_kratos_session");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fmt, time::Duration};

use kratos_guard_storage::ConfigError;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Default session cookie name set by Kratos.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "ory_kratos_session";

/// Default Kratos URL for both the frontend and admin APIs.
pub const DEFAULT_KRATOS_URL: &str = "http://localhost:4434/";

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Smallest accepted cache TTL.
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(1);

/// Largest accepted cache TTL (24 hours).
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default deadline for a single cache backend operation.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default per-request deadline for identity provider calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable names read by [`GuardConfig::from_env`].
pub mod env {
    /// Frontend API URL.
    pub const URL: &str = "KRATOS_URL";
    /// Admin API URL.
    pub const ADMIN_URL: &str = "KRATOS_ADMIN_URL";
    /// Session cookie name.
    pub const SESSION_COOKIE_NAME: &str = "KRATOS_SESSION_COOKIE_NAME";
    /// Debug logging toggle.
    pub const DEBUG: &str = "KRATOS_DEBUG";
    /// Post-logout return URL.
    pub const LOGOUT_RETURN_TO: &str = "KRATOS_LOGOUT_RETURN_TO";
    /// Session cache toggle.
    pub const CACHE_ENABLED: &str = "KRATOS_CACHE_ENABLED";
    /// Session cache TTL, in seconds or humantime format.
    pub const CACHE_TTL: &str = "KRATOS_CACHE_TTL";
    /// Cache operation timeout, in seconds or humantime format.
    pub const CACHE_TIMEOUT: &str = "KRATOS_CACHE_TIMEOUT";
    /// Provider request timeout, in seconds or humantime format.
    pub const REQUEST_TIMEOUT: &str = "KRATOS_REQUEST_TIMEOUT";
    /// Application secret used to key cache entries.
    pub const APP_KEY: &str = "APP_KEY";
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_cache_timeout() -> Duration {
    DEFAULT_CACHE_TIMEOUT
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_url() -> String {
    DEFAULT_KRATOS_URL.to_owned()
}

fn default_session_cookie_name() -> String {
    DEFAULT_SESSION_COOKIE_NAME.to_owned()
}

/// Session cache settings.
///
/// # Validation
///
/// - `ttl` must be between [`MIN_CACHE_TTL`] and [`MAX_CACHE_TTL`]
/// - `timeout` must be non-zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Whether resolved sessions are cached.
    #[serde(default)]
    pub(crate) enabled: bool,

    /// How long a resolved session stays cached.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub(crate) ttl: Duration,

    /// Deadline for each cache backend call. An expired call counts as a
    /// cache failure.
    #[serde(with = "humantime_serde", default = "default_cache_timeout")]
    pub(crate) timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: false, ttl: DEFAULT_CACHE_TTL, timeout: DEFAULT_CACHE_TIMEOUT }
    }
}

#[bon::bon]
impl CacheSettings {
    /// Creates cache settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails; see [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(default)] enabled: bool,
        #[builder(default = DEFAULT_CACHE_TTL)] ttl: Duration,
        #[builder(default = DEFAULT_CACHE_TIMEOUT)] timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let settings = Self { enabled, ttl, timeout };
        settings.validate()?;
        Ok(settings)
    }

    /// Returns whether caching is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the cache TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the deadline for a single cache backend call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::BelowMinimum`] if `ttl` is below [`MIN_CACHE_TTL`] or `timeout`
    ///   is zero
    /// - [`ConfigError::AboveMaximum`] if `ttl` is above [`MAX_CACHE_TTL`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl < MIN_CACHE_TTL {
            return Err(ConfigError::BelowMinimum {
                field: "cache.ttl",
                value: format!("{:?}", self.ttl),
                min: format!("{MIN_CACHE_TTL:?}"),
            });
        }
        if self.ttl > MAX_CACHE_TTL {
            return Err(ConfigError::AboveMaximum {
                field: "cache.ttl",
                value: format!("{:?}", self.ttl),
                max: format!("{MAX_CACHE_TTL:?}"),
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "cache.timeout",
                value: format!("{:?}", self.timeout),
                min: "1ms".into(),
            });
        }
        Ok(())
    }
}

/// Configuration for the session guard.
///
/// The application secret is held in [`Zeroizing`] memory, is never
/// serialized, and is redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Kratos frontend API URL.
    #[serde(default = "default_url")]
    pub(crate) url: String,

    /// Kratos admin API URL; falls back to `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) admin_url: Option<String>,

    /// Name of the session cookie.
    #[serde(default = "default_session_cookie_name")]
    pub(crate) session_cookie_name: String,

    /// Log provider responses at debug level.
    #[serde(default)]
    pub(crate) debug: bool,

    /// Where the provider sends the browser after logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) logout_return_to: Option<String>,

    /// Session cache settings.
    #[serde(default)]
    pub(crate) cache: CacheSettings,

    /// Deadline for each provider request.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub(crate) request_timeout: Duration,

    /// Secret keying the cache-key HMAC.
    #[serde(default, skip_serializing)]
    pub(crate) app_secret: Option<Zeroizing<String>>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            admin_url: None,
            session_cookie_name: default_session_cookie_name(),
            debug: false,
            logout_return_to: None,
            cache: CacheSettings::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            app_secret: None,
        }
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("url", &self.url)
            .field("admin_url", &self.admin_url)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("debug", &self.debug)
            .field("logout_return_to", &self.logout_return_to)
            .field("cache", &self.cache)
            .field("request_timeout", &self.request_timeout)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[bon::bon]
impl GuardConfig {
    /// Creates a guard configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails; see [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into, default = default_url())] url: String,
        #[builder(into)] admin_url: Option<String>,
        #[builder(into, default = default_session_cookie_name())] session_cookie_name: String,
        #[builder(default)] debug: bool,
        #[builder(into)] logout_return_to: Option<String>,
        #[builder(default)] cache: CacheSettings,
        #[builder(default = DEFAULT_REQUEST_TIMEOUT)] request_timeout: Duration,
        #[builder(into)] app_secret: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            url,
            admin_url,
            session_cookie_name,
            debug,
            logout_return_to,
            cache,
            request_timeout,
            app_secret: app_secret.map(Zeroizing::new),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from the process environment.
    ///
    /// Unset or empty variables keep their defaults. See [`env`] for the
    /// variable names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unparseable values, or any
    /// [`validate`](Self::validate) error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, using the [`env`] variable names.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(env::URL) {
            config.url = url;
        }
        config.admin_url = get(env::ADMIN_URL);
        if let Some(name) = get(env::SESSION_COOKIE_NAME) {
            config.session_cookie_name = name;
        }
        if let Some(debug) = get(env::DEBUG) {
            config.debug = parse_bool("debug", &debug)?;
        }
        config.logout_return_to = get(env::LOGOUT_RETURN_TO);
        if let Some(enabled) = get(env::CACHE_ENABLED) {
            config.cache.enabled = parse_bool("cache.enabled", &enabled)?;
        }
        if let Some(ttl) = get(env::CACHE_TTL) {
            config.cache.ttl = parse_duration("cache.ttl", &ttl)?;
        }
        if let Some(timeout) = get(env::CACHE_TIMEOUT) {
            config.cache.timeout = parse_duration("cache.timeout", &timeout)?;
        }
        if let Some(timeout) = get(env::REQUEST_TIMEOUT) {
            config.request_timeout = parse_duration("request_timeout", &timeout)?;
        }
        config.app_secret = get(env::APP_KEY).map(Zeroizing::new);

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] if `url` is empty, or if caching is enabled without an
    ///   `app_secret`
    /// - [`ConfigError::Invalid`] if `session_cookie_name` is empty
    /// - [`ConfigError::BelowMinimum`] if `cache.ttl` is below [`MIN_CACHE_TTL`], or
    ///   `cache.timeout` or `request_timeout` is zero
    /// - [`ConfigError::AboveMaximum`] if `cache.ttl` is above [`MAX_CACHE_TTL`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::missing("url"));
        }
        if self.session_cookie_name.trim().is_empty() {
            return Err(ConfigError::invalid("session_cookie_name", "must not be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "request_timeout",
                value: format!("{:?}", self.request_timeout),
                min: "1ms".into(),
            });
        }
        self.cache.validate()?;
        if self.cache.enabled && self.app_secret().is_none() {
            return Err(ConfigError::missing("app_secret"));
        }
        Ok(())
    }

    /// Returns the frontend API URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the admin API URL.
    #[must_use]
    pub fn admin_url(&self) -> &str {
        self.admin_url.as_deref().unwrap_or(&self.url)
    }

    /// Returns the session cookie name.
    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    /// Returns whether debug logging is enabled.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the post-logout return URL.
    #[must_use]
    pub fn logout_return_to(&self) -> Option<&str> {
        self.logout_return_to.as_deref()
    }

    /// Returns the cache settings.
    #[must_use]
    pub fn cache(&self) -> &CacheSettings {
        &self.cache
    }

    /// Returns the provider request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the application secret, if set and non-empty.
    #[must_use]
    pub fn app_secret(&self) -> Option<&str> {
        self.app_secret.as_deref().map(String::as_str).filter(|secret| !secret.is_empty())
    }
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(field, format!("expected a boolean, got {other:?}"))),
    }
}

/// Accepts bare seconds (`"300"`) or humantime (`"5m"`).
fn parse_duration(field: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    humantime_serde::re::humantime::parse_duration(raw)
        .map_err(|e| ConfigError::invalid(field, format!("{raw:?}: {e}")))
}
