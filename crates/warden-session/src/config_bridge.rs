//! Bridge from `warden_config::Config` to the session strategy chain.

use std::sync::Arc;

use tracing::debug;
use warden_config::{Config, SESSION_STEPS};

use crate::error::{SessionError, SessionResult};
use crate::registry::SessionRegistry;
use crate::steps::{ConcurrentSessionControl, RegisterSession, SessionFixationProtection};
use crate::strategy::{CompositeSessionStrategy, SessionAuthenticationStrategy};

/// Build the session chain named by `[sessions].chain`.
///
/// # Errors
///
/// Returns [`SessionError::Configuration`] for an empty chain, an unknown
/// step name, or steps listed out of order.
pub fn to_session_strategy(
    cfg: &Config,
    registry: &Arc<dyn SessionRegistry>,
) -> SessionResult<CompositeSessionStrategy> {
    let sessions = &cfg.sessions;
    let mut steps: Vec<Arc<dyn SessionAuthenticationStrategy>> = Vec::new();
    let mut last: Option<usize> = None;

    for name in &sessions.chain {
        let position = SESSION_STEPS
            .iter()
            .position(|s| *s == name.as_str())
            .ok_or_else(|| SessionError::configuration(format!("unknown session step '{name}'")))?;
        if last.is_some_and(|previous| position <= previous) {
            return Err(SessionError::configuration(format!(
                "session step '{name}' is out of order; steps run in the order: {}",
                SESSION_STEPS.join(", ")
            )));
        }
        last = Some(position);

        let step: Arc<dyn SessionAuthenticationStrategy> = match name.as_str() {
            "concurrency" => Arc::new(
                ConcurrentSessionControl::new(
                    Arc::clone(registry),
                    sessions.max_sessions_per_principal,
                )
                .prevent_login_when_exceeded(sessions.prevent_login_when_exceeded),
            ),
            "fixation" => Arc::new(
                SessionFixationProtection::new(sessions.migrate_attributes)
                    .with_registry(Arc::clone(registry)),
            ),
            _ => Arc::new(RegisterSession::new(Arc::clone(registry))),
        };
        steps.push(step);
    }

    let chain = CompositeSessionStrategy::new(steps)?;
    debug!(steps = ?chain.step_names(), "built session strategy chain");
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemorySessionRegistry;

    fn registry() -> Arc<dyn SessionRegistry> {
        Arc::new(InMemorySessionRegistry::new())
    }

    #[test]
    fn test_default_chain() {
        let chain = to_session_strategy(&Config::default(), &registry()).unwrap();
        assert_eq!(chain.step_names(), vec!["concurrency", "fixation", "register"]);
    }

    #[test]
    fn test_partial_chain() {
        let mut cfg = Config::default();
        cfg.sessions.chain = vec!["fixation".to_owned()];
        let chain = to_session_strategy(&cfg, &registry()).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_invalid_chains() {
        let mut cfg = Config::default();
        cfg.sessions.chain = vec!["register".to_owned(), "fixation".to_owned()];
        assert!(matches!(
            to_session_strategy(&cfg, &registry()),
            Err(SessionError::Configuration(_))
        ));

        cfg.sessions.chain = vec!["bogus".to_owned()];
        assert!(to_session_strategy(&cfg, &registry()).is_err());

        cfg.sessions.chain = Vec::new();
        assert!(to_session_strategy(&cfg, &registry()).is_err());
    }
}
