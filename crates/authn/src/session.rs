//! Session data model.
//!
//! These types mirror the subset of the Kratos `/sessions/whoami` response
//! the guard relies on. Unknown fields are ignored so provider upgrades do
//! not break deserialization, and the same types round-trip through the
//! session cache.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An authenticated session, as resolved by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: String,

    /// The subject this session belongs to.
    pub identity: Identity,

    /// Whether the provider considers the session active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    /// When the session stops being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// When the subject authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated_at: Option<DateTime<Utc>>,

    /// When the session was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,

    /// Authentication methods completed for this session, in order.
    #[serde(default)]
    pub authentication_methods: Vec<AuthenticationMethod>,

    /// Authenticator assurance level (`aal1`, `aal2`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_assurance_level: Option<String>,
}

impl Session {
    /// The identifier of the session's identity.
    #[must_use]
    pub fn identity_id(&self) -> &str {
        &self.identity.id
    }

    /// Returns `true` if the session carries an expiry at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Time left until expiry, measured from `now`.
    ///
    /// `None` when the provider did not send an expiry; `Some(Duration::ZERO)`
    /// once the session has expired.
    #[must_use]
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|expires_at| (expires_at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

/// The subject a session belongs to.
///
/// Owned by the provider; the guard only ever holds a read-only copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Identity identifier.
    pub id: String,

    /// Identity schema the traits conform to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,

    /// Identity state (`active`, `inactive`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Opaque traits payload defined by the identity schema.
    #[serde(default)]
    pub traits: Value,

    /// Public metadata attached by administrators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_public: Option<Value>,
}

impl Identity {
    /// Looks up a top-level trait, e.g. `"email"`.
    #[must_use]
    pub fn trait_value(&self, name: &str) -> Option<&Value> {
        self.traits.get(name)
    }
}

/// One completed authentication step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationMethod {
    /// Method name (`password`, `totp`, `oidc`, ...).
    pub method: String,

    /// Assurance level reached by this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aal: Option<String>,

    /// When the step completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A browser logout flow created by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutFlow {
    /// URL the browser must visit to finish logging out.
    pub logout_url: String,

    /// Token embedded in `logout_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_token: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    use super::*;

    fn whoami_body() -> Value {
        json!({
            "id": "8f6a2c3e-0000-4000-8000-000000000001",
            "active": true,
            "expires_at": "2030-01-01T00:00:00Z",
            "authenticated_at": "2024-01-01T00:00:00Z",
            "authenticator_assurance_level": "aal1",
            "authentication_methods": [
                {"method": "password", "aal": "aal1", "completed_at": "2024-01-01T00:00:00Z"}
            ],
            "issued_at": "2024-01-01T00:00:00Z",
            "identity": {
                "id": "5b6f3a1c-0000-4000-8000-000000000002",
                "schema_id": "default",
                "schema_url": "http://localhost:4433/schemas/ZGVmYXVsdA",
                "state": "active",
                "traits": {"email": "jane@example.com", "name": {"first": "Jane"}},
                "verifiable_addresses": [],
                "recovery_addresses": [],
                "metadata_public": null
            },
            "devices": [{"id": "device-1", "ip_address": "127.0.0.1"}]
        })
    }

    #[test]
    fn test_deserialize_whoami_response() {
        let session: Session = serde_json::from_value(whoami_body()).unwrap();

        assert_eq!(session.id, "8f6a2c3e-0000-4000-8000-000000000001");
        assert_eq!(session.identity_id(), "5b6f3a1c-0000-4000-8000-000000000002");
        assert_eq!(session.active, Some(true));
        assert_eq!(session.authenticator_assurance_level.as_deref(), Some("aal1"));
        assert_eq!(session.authentication_methods.len(), 1);
        assert_eq!(session.authentication_methods[0].method, "password");
        assert_eq!(session.identity.trait_value("email"), Some(&json!("jane@example.com")));
        assert!(session.identity.metadata_public.is_none());
    }

    #[test]
    fn test_deserialize_minimal_session() {
        let session: Session =
            serde_json::from_value(json!({"id": "s", "identity": {"id": "i"}})).unwrap();

        assert_eq!(session.identity_id(), "i");
        assert!(session.expires_at.is_none());
        assert!(session.authentication_methods.is_empty());
        assert_eq!(session.identity.traits, Value::Null);
    }

    #[test]
    fn test_expiry_helpers() {
        let mut session: Session =
            serde_json::from_value(json!({"id": "s", "identity": {"id": "i"}})).unwrap();
        let now = Utc::now();

        assert!(!session.is_expired_at(now));
        assert_eq!(session.remaining_lifetime(now), None);

        session.expires_at = Some(now + ChronoDuration::seconds(90));
        assert!(!session.is_expired_at(now));
        assert_eq!(session.remaining_lifetime(now), Some(Duration::from_secs(90)));

        session.expires_at = Some(now - ChronoDuration::seconds(1));
        assert!(session.is_expired_at(now));
        assert_eq!(session.remaining_lifetime(now), Some(Duration::ZERO));
    }

    #[test]
    fn test_logout_flow_deserialize() {
        let flow: LogoutFlow = serde_json::from_value(json!({
            "logout_token": "tok",
            "logout_url": "https://auth.example.com/self-service/logout?token=tok"
        }))
        .unwrap();

        assert_eq!(flow.logout_url, "https://auth.example.com/self-service/logout?token=tok");
        assert_eq!(flow.logout_token.as_deref(), Some("tok"));
    }
}
