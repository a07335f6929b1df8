//! Session registry abstraction and an in-memory implementation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// What the registry knows about one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInformation {
    /// Session id.
    pub session_id: String,
    /// Name of the principal owning the session.
    pub principal: String,
    /// Wall-clock time of the last request.
    pub last_request: DateTime<Utc>,
    /// Monotonic use counter; larger means more recently used.
    pub last_use: u64,
    /// Whether the session was expired by concurrency control.
    pub expired: bool,
}

/// Tracks live sessions per principal.
pub trait SessionRegistry: Send + Sync {
    /// Sessions of `principal`, optionally including expired ones.
    fn all_sessions(&self, principal: &str, include_expired: bool) -> Vec<SessionInformation>;

    /// Information about one session.
    fn session_information(&self, session_id: &str) -> Option<SessionInformation>;

    /// Register a new session for `principal`. Re-registering an id replaces
    /// the previous entry.
    fn register_new_session(&self, session_id: &str, principal: &str);

    /// Forget a session.
    fn remove_session(&self, session_id: &str);

    /// Mark a session as used now.
    fn refresh_last_request(&self, session_id: &str);

    /// Mark a session as expired.
    fn expire_now(&self, session_id: &str);

    /// Carry the entry for `old_id` over to `new_id` after the id was
    /// rotated. Unknown ids are ignored.
    fn session_id_changed(&self, old_id: &str, new_id: &str) {
        let Some(info) = self.session_information(old_id) else {
            return;
        };
        self.remove_session(old_id);
        self.register_new_session(new_id, &info.principal);
        if info.expired {
            self.expire_now(new_id);
        }
    }
}

/// Session registry backed by concurrent maps.
#[derive(Debug, Default)]
pub struct InMemorySessionRegistry {
    sessions: DashMap<String, SessionInformation>,
    principals: DashMap<String, BTreeSet<String>>,
    clock: AtomicU64,
}

impl InMemorySessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered sessions, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    fn all_sessions(&self, principal: &str, include_expired: bool) -> Vec<SessionInformation> {
        let Some(ids) = self.principals.get(principal) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.sessions.get(id).map(|info| info.clone()))
            .filter(|info| include_expired || !info.expired)
            .collect()
    }

    fn session_information(&self, session_id: &str) -> Option<SessionInformation> {
        self.sessions.get(session_id).map(|info| info.clone())
    }

    fn register_new_session(&self, session_id: &str, principal: &str) {
        self.remove_session(session_id);
        let info = SessionInformation {
            session_id: session_id.to_owned(),
            principal: principal.to_owned(),
            last_request: Utc::now(),
            last_use: self.tick(),
            expired: false,
        };
        self.sessions.insert(session_id.to_owned(), info);
        self.principals
            .entry(principal.to_owned())
            .or_default()
            .insert(session_id.to_owned());
        debug!(session_id, principal, "registered session");
    }

    fn remove_session(&self, session_id: &str) {
        let Some((_, info)) = self.sessions.remove(session_id) else {
            return;
        };
        self.principals
            .remove_if_mut(&info.principal, |_, ids| {
                ids.remove(session_id);
                ids.is_empty()
            });
        debug!(session_id, principal = %info.principal, "removed session");
    }

    fn refresh_last_request(&self, session_id: &str) {
        let tick = self.tick();
        if let Some(mut info) = self.sessions.get_mut(session_id) {
            info.last_request = Utc::now();
            info.last_use = tick;
        }
    }

    fn expire_now(&self, session_id: &str) {
        if let Some(mut info) = self.sessions.get_mut(session_id) {
            info.expired = true;
            debug!(session_id, principal = %info.principal, "expired session");
        }
    }

    fn session_id_changed(&self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        let Some((_, mut info)) = self.sessions.remove(old_id) else {
            return;
        };
        info.session_id = new_id.to_owned();
        info.last_request = Utc::now();
        info.last_use = self.tick();
        if let Some(mut ids) = self.principals.get_mut(&info.principal) {
            ids.remove(old_id);
            ids.insert(new_id.to_owned());
        }
        debug!(old_id, new_id, principal = %info.principal, "session id changed");
        self.sessions.insert(new_id.to_owned(), info);
    }
}
