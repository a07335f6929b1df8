//! Concrete session steps.
//!
//! Chain them in this order: [`ConcurrentSessionControl`] sees the sessions
//! that existed before the login, [`SessionFixationProtection`] gives the
//! client a fresh session id, and [`RegisterSession`] records that id.

use std::sync::Arc;
use tracing::{debug, info};

use warden_core::Principal;

use crate::error::{SessionError, SessionResult};
use crate::exchange::SessionExchange;
use crate::registry::SessionRegistry;
use crate::strategy::SessionAuthenticationStrategy;

/// Limits how many sessions a principal may hold at once.
///
/// When the limit is reached, either the login is rejected or the least
/// recently used sessions are expired to make room.
pub struct ConcurrentSessionControl {
    registry: Arc<dyn SessionRegistry>,
    max_sessions: usize,
    prevent_login: bool,
}

impl ConcurrentSessionControl {
    /// Allow `max_sessions` per principal; `0` means unlimited. Expires the
    /// least recently used session by default.
    #[must_use]
    pub fn new(registry: Arc<dyn SessionRegistry>, max_sessions: usize) -> Self {
        Self {
            registry,
            max_sessions,
            prevent_login: false,
        }
    }

    /// Reject logins beyond the limit instead of expiring old sessions.
    #[must_use]
    pub fn prevent_login_when_exceeded(mut self, prevent: bool) -> Self {
        self.prevent_login = prevent;
        self
    }
}

impl SessionAuthenticationStrategy for ConcurrentSessionControl {
    fn on_authentication(
        &self,
        principal: &Principal,
        exchange: &mut SessionExchange,
    ) -> SessionResult<()> {
        if self.max_sessions == 0 {
            return Ok(());
        }
        let mut sessions = self.registry.all_sessions(&principal.name, false);
        if sessions.len() < self.max_sessions {
            return Ok(());
        }
        if sessions.len() == self.max_sessions
            && let Some(current) = exchange.session_id()
            && sessions.iter().any(|s| s.session_id == current)
        {
            return Ok(());
        }

        if self.prevent_login {
            info!(principal = %principal.name, max = self.max_sessions, "login rejected: session limit reached");
            return Err(SessionError::MaximumSessionsExceeded {
                principal: principal.name.clone(),
                max: self.max_sessions,
            });
        }

        sessions.sort_by_key(|s| s.last_use);
        let excess = sessions
            .len()
            .saturating_sub(self.max_sessions)
            .saturating_add(1);
        for session in sessions.iter().take(excess) {
            self.registry.expire_now(&session.session_id);
        }
        debug!(principal = %principal.name, expired = excess, "expired least recently used sessions");
        Ok(())
    }

    fn name(&self) -> String {
        "concurrency".to_owned()
    }
}

/// Rotates the session id on login so an id planted before authentication
/// cannot be reused afterwards.
///
/// With a registry attached, the registered entry follows the new id so the
/// old one no longer counts against the session limit.
#[derive(Clone)]
pub struct SessionFixationProtection {
    migrate_attributes: bool,
    registry: Option<Arc<dyn SessionRegistry>>,
}

impl SessionFixationProtection {
    /// Rotate the id, keeping attributes if `migrate_attributes` is set.
    #[must_use]
    pub fn new(migrate_attributes: bool) -> Self {
        Self {
            migrate_attributes,
            registry: None,
        }
    }

    /// Report each rotation to `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn SessionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl Default for SessionFixationProtection {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for SessionFixationProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFixationProtection")
            .field("migrate_attributes", &self.migrate_attributes)
            .field("registry", &self.registry.is_some())
            .finish()
    }
}

impl SessionAuthenticationStrategy for SessionFixationProtection {
    fn on_authentication(
        &self,
        principal: &Principal,
        exchange: &mut SessionExchange,
    ) -> SessionResult<()> {
        let Some(old) = exchange.rotate_session_id(self.migrate_attributes) else {
            debug!(principal = %principal.name, "no session to protect");
            return Ok(());
        };
        let new = exchange.session_id().unwrap_or_default();
        if let Some(registry) = &self.registry {
            registry.session_id_changed(&old, new);
        }
        debug!(
            principal = %principal.name,
            old_session = %old,
            new_session = new,
            migrated = self.migrate_attributes,
            "rotated session id"
        );
        Ok(())
    }

    fn name(&self) -> String {
        "fixation".to_owned()
    }
}

/// Records the session in the registry, creating one if needed.
pub struct RegisterSession {
    registry: Arc<dyn SessionRegistry>,
}

impl RegisterSession {
    /// Register into `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn SessionRegistry>) -> Self {
        Self { registry }
    }
}

impl SessionAuthenticationStrategy for RegisterSession {
    fn on_authentication(
        &self,
        principal: &Principal,
        exchange: &mut SessionExchange,
    ) -> SessionResult<()> {
        let session_id = exchange.ensure_session();
        self.registry.register_new_session(session_id, &principal.name);
        Ok(())
    }

    fn name(&self) -> String {
        "register".to_owned()
    }
}
