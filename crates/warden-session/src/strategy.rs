//! Session authentication strategies and the sequential chain.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use warden_core::Principal;

use crate::error::{SessionError, SessionResult};
use crate::exchange::SessionExchange;

/// A step run after a successful authentication to prepare the session.
///
/// Steps have side effects and signal rejection by returning an error.
pub trait SessionAuthenticationStrategy: Send + Sync {
    /// Prepare the session for `principal`.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] to reject the authentication.
    fn on_authentication(
        &self,
        principal: &Principal,
        exchange: &mut SessionExchange,
    ) -> SessionResult<()>;

    /// A short name for logs.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_owned()
    }
}

/// Runs its steps strictly in order and stops at the first failure.
///
/// Steps already applied are not rolled back; each step is responsible for
/// its own atomicity. Order is part of the contract: concurrency control
/// before fixation protection before registration.
pub struct CompositeSessionStrategy {
    steps: Vec<Arc<dyn SessionAuthenticationStrategy>>,
}

impl CompositeSessionStrategy {
    /// Create a chain.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if `steps` is empty.
    pub fn new(steps: Vec<Arc<dyn SessionAuthenticationStrategy>>) -> SessionResult<Self> {
        if steps.is_empty() {
            return Err(SessionError::configuration(
                "session strategy chain requires at least one step",
            ));
        }
        Ok(Self { steps })
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; construction rejects empty chains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names, in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl SessionAuthenticationStrategy for CompositeSessionStrategy {
    fn on_authentication(
        &self,
        principal: &Principal,
        exchange: &mut SessionExchange,
    ) -> SessionResult<()> {
        let total = self.steps.len();
        for (index, step) in self.steps.iter().enumerate() {
            trace!(
                position = index.saturating_add(1),
                total,
                "Preparing session with {} ({}/{total})",
                step.name(),
                index.saturating_add(1)
            );
            if let Err(e) = step.on_authentication(principal, exchange) {
                debug!(step = %step.name(), principal = %principal, error = %e, "session step rejected");
                return Err(e);
            }
        }
        Ok(())
    }

    fn name(&self) -> String {
        format!("composite({})", self.step_names().join(", "))
    }
}

impl fmt::Debug for CompositeSessionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSessionStrategy")
            .field("steps", &self.step_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl SessionAuthenticationStrategy for Recording {
        fn on_authentication(
            &self,
            _principal: &Principal,
            _exchange: &mut SessionExchange,
        ) -> SessionResult<()> {
            self.log.lock().unwrap().push(self.label);
            if self.fail {
                return Err(SessionError::StepFailed {
                    step: self.label.to_owned(),
                    message: "rejected".to_owned(),
                });
            }
            Ok(())
        }

        fn name(&self) -> String {
            self.label.to_owned()
        }
    }

    fn step(
        label: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Arc<dyn SessionAuthenticationStrategy> {
        Arc::new(Recording {
            label,
            log: Arc::clone(log),
            fail,
        })
    }

    #[test]
    fn test_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = CompositeSessionStrategy::new(vec![
            step("a", &log, false),
            step("b", &log, false),
            step("c", &log, false),
        ])
        .unwrap();
        chain
            .on_authentication(&Principal::authenticated("alice"), &mut SessionExchange::new())
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(chain.name(), "composite(a, b, c)");
    }

    #[test]
    fn test_first_failure_aborts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = CompositeSessionStrategy::new(vec![
            step("a", &log, false),
            step("b", &log, true),
            step("c", &log, false),
        ])
        .unwrap();
        let err = chain
            .on_authentication(&Principal::authenticated("alice"), &mut SessionExchange::new())
            .unwrap_err();
        assert!(matches!(err, SessionError::StepFailed { ref step, .. } if step == "b"));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(matches!(
            CompositeSessionStrategy::new(Vec::new()),
            Err(SessionError::Configuration(_))
        ));
    }
}
