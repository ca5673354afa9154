//! Application user model and the session-to-user mapping.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::Session;

/// Attribute holding the user identifier.
pub const USER_ID_KEY: &str = "id";

/// A generic application user: a map of attribute names to JSON values.
///
/// The guard only requires the `"id"` attribute; everything else is up to
/// the [`UserFactory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct User {
    attributes: Map<String, Value>,
}

impl User {
    /// Creates a user carrying only an identifier.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::default().with(USER_ID_KEY, Value::String(id.into()))
    }

    /// Sets an attribute, returning the updated user.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Reads an attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// The user identifier, when present as a non-empty string.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attributes.get(USER_ID_KEY).and_then(Value::as_str).filter(|id| !id.is_empty())
    }

    /// Returns `true` if the user carries a usable identifier.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.id().is_some()
    }

    /// Returns `true` if the user has no attributes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// All attributes.
    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

impl From<Map<String, Value>> for User {
    fn from(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }
}

/// Builds the application user for a resolved session.
///
/// Called only after the provider (or the cache) has positively resolved
/// the session.
pub trait UserFactory: Send + Sync {
    /// Maps a session to a user. The result must carry an `"id"`.
    fn make_user(&self, session: &Session) -> User;
}

impl<F> UserFactory for F
where
    F: Fn(&Session) -> User + Send + Sync,
{
    fn make_user(&self, session: &Session) -> User {
        self(session)
    }
}

/// Maps a session to `{"id": <identity id>}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUserFactory;

impl UserFactory for DefaultUserFactory {
    fn make_user(&self, session: &Session) -> User {
        User::with_id(session.identity_id())
    }
}
