//! The session state visible to strategies during one login.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

/// The client's session as seen while handling one successful
/// authentication.
///
/// Storage of sessions is external; this is the slice of it the strategy
/// chain reads and changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionExchange {
    session_id: Option<String>,
    attributes: BTreeMap<String, JsonValue>,
}

impl SessionExchange {
    /// An exchange without a session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An exchange carrying an existing session.
    #[must_use]
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// Add a session attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// The current session id, if a session exists.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Session attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, JsonValue> {
        &self.attributes
    }

    /// Set a session attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: JsonValue) {
        self.attributes.insert(key.into(), value);
    }

    /// The current session id, creating a session if there is none.
    pub fn ensure_session(&mut self) -> &str {
        self.session_id.get_or_insert_with(new_session_id)
    }

    /// Give the session a fresh id. Attributes are kept if `migrate` is set
    /// and dropped otherwise. Returns the old id, or `None` (and does
    /// nothing) if there is no session.
    pub fn rotate_session_id(&mut self, migrate: bool) -> Option<String> {
        let old = self.session_id.take()?;
        self.session_id = Some(new_session_id());
        if !migrate {
            self.attributes.clear();
        }
        Some(old)
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}
