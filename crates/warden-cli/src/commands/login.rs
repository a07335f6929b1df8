//! `warden login`: run the session strategy chain for one authentication.

use anyhow::Result;
use std::sync::Arc;
use warden_config::Config;
use warden_core::Principal;
use warden_session::{
    InMemorySessionRegistry, SessionAuthenticationStrategy, SessionExchange, SessionRegistry,
};

use crate::config_bridge::to_session_strategy;
use crate::theme::Theme;

/// What happened to the sessions during one simulated login.
#[derive(Debug)]
pub(crate) struct LoginOutcome {
    pub(crate) session_id: Option<String>,
    pub(crate) expired: Vec<String>,
    pub(crate) steps: Vec<String>,
}

/// Simulate a login for `principal` with the configured chain.
///
/// `existing` sessions are registered for the principal beforehand, oldest
/// first; `current` is the session the client arrives with.
pub(crate) fn run_login(
    cfg: &Config,
    principal: &Principal,
    current: Option<&str>,
    existing: &[String],
) -> Result<()> {
    let outcome = login(cfg, principal, current, existing)?;
    println!("{}", Theme::dimmed(&format!("chain: {}", outcome.steps.join(" -> "))));
    match &outcome.session_id {
        Some(id) => println!("{}", Theme::success(&format!("{} logged in with session {id}", principal.name))),
        None => println!("{}", Theme::success(&format!("{} logged in without a session", principal.name))),
    }
    for id in &outcome.expired {
        println!("{}", Theme::info(&format!("expired session {id}")));
    }
    Ok(())
}

fn login(
    cfg: &Config,
    principal: &Principal,
    current: Option<&str>,
    existing: &[String],
) -> Result<LoginOutcome> {
    let registry: Arc<dyn SessionRegistry> = Arc::new(InMemorySessionRegistry::new());
    for id in existing {
        registry.register_new_session(id, &principal.name);
    }
    let chain = to_session_strategy(cfg, &registry)?;

    let mut exchange = match current {
        Some(id) => SessionExchange::with_session(id),
        None => SessionExchange::new(),
    };
    chain.on_authentication(principal, &mut exchange)?;

    let expired = registry
        .all_sessions(&principal.name, true)
        .into_iter()
        .filter(|s| s.expired)
        .map(|s| s.session_id)
        .collect();
    Ok(LoginOutcome {
        session_id: exchange.session_id().map(str::to_owned),
        expired,
        steps: chain.step_names(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_default_chain_expires_oldest() {
        let cfg = Config::default();
        let outcome = login(
            &cfg,
            &Principal::authenticated("alice"),
            None,
            &["s1".to_string()],
        )
        .unwrap();
        assert_eq!(outcome.expired, vec!["s1"]);
        assert!(outcome.session_id.is_some());
        assert_eq!(outcome.steps, vec!["concurrency", "fixation", "register"]);
    }

    #[test]
    fn test_login_rotates_current_session() {
        let cfg = Config::default();
        let outcome = login(&cfg, &Principal::authenticated("alice"), Some("planted"), &[]).unwrap();
        let id = outcome.session_id.unwrap();
        assert_ne!(id, "planted");
        assert!(outcome.expired.is_empty());
    }

    #[test]
    fn test_login_prevented() {
        let cfg = Config::from_toml(
            r#"
            [sessions]
            max_sessions_per_principal = 1
            prevent_login_when_exceeded = true
            "#,
        )
        .unwrap();
        let result = login(
            &cfg,
            &Principal::authenticated("alice"),
            None,
            &["s1".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_login_reuses_slot_of_current_session() {
        let cfg = Config::from_toml(
            r#"
            [sessions]
            max_sessions_per_principal = 1
            prevent_login_when_exceeded = true
            "#,
        )
        .unwrap();
        let outcome = login(
            &cfg,
            &Principal::authenticated("alice"),
            Some("s1"),
            &["s1".to_string()],
        )
        .unwrap();
        assert_ne!(outcome.session_id.as_deref(), Some("s1"));
        assert!(outcome.expired.is_empty());
    }
}
