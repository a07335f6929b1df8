//! Mock collaborators that count or record how they are called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use warden_core::{
    AuthzError, AuthzResult, Decision, DefaultPathParser, HttpRequest, MethodRef, PathParser,
    Principal, PrincipalSupplier, RequestPath,
};
use warden_policy::{AnnotationScanner, DecisionUnit, PolicyAnnotation, PolicyKind};
use warden_session::{SessionAuthenticationStrategy, SessionError, SessionExchange, SessionResult};

/// Wraps a scanner and counts scans, to assert on resolver caching.
pub struct CountingScanner {
    inner: Arc<dyn AnnotationScanner>,
    calls: AtomicUsize,
}

impl CountingScanner {
    /// Count scans made through `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn AnnotationScanner>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of scans so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AnnotationScanner for CountingScanner {
    fn scan(
        &self,
        method: &MethodRef,
        target_type: &str,
        kind: PolicyKind,
    ) -> AuthzResult<Option<PolicyAnnotation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.scan(method, target_type, kind)
    }
}

/// The default parser, counting parses.
#[derive(Debug, Default)]
pub struct CountingPathParser {
    calls: AtomicUsize,
}

impl CountingPathParser {
    /// Create a parser with a zero count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parses so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PathParser for CountingPathParser {
    fn parse(&self, request: &HttpRequest) -> RequestPath {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DefaultPathParser.parse(request)
    }
}

/// A supplier that fails every lookup and counts attempts.
///
/// Hand it to units that must decide without the identity.
#[derive(Debug, Default)]
pub struct ForbiddenPrincipal {
    calls: AtomicUsize,
}

impl ForbiddenPrincipal {
    /// Create a supplier with a zero count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lookups attempted.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PrincipalSupplier for ForbiddenPrincipal {
    fn get(&self) -> AuthzResult<Arc<Principal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AuthzError::PrincipalUnavailable(
            "principal lookup is forbidden here".to_string(),
        ))
    }
}

/// A supplier that returns a fixed principal and counts lookups.
#[derive(Debug)]
pub struct CountingPrincipal {
    principal: Arc<Principal>,
    calls: AtomicUsize,
}

impl CountingPrincipal {
    /// Supply `principal`.
    #[must_use]
    pub fn new(principal: Arc<Principal>) -> Self {
        Self {
            principal,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of lookups so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PrincipalSupplier for CountingPrincipal {
    fn get(&self) -> AuthzResult<Arc<Principal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.principal))
    }
}

/// Shared, ordered record of labels.
#[derive(Debug, Clone, Default)]
pub struct StepLog(Arc<Mutex<Vec<String>>>);

impl StepLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label.
    pub fn push(&self, label: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(label.into());
    }

    /// Labels recorded so far, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// A decision unit returning a fixed decision and recording each call.
#[derive(Debug)]
pub struct RecordingUnit {
    label: String,
    decision: Decision,
    log: StepLog,
}

impl RecordingUnit {
    /// A unit that always returns `decision`, logging `label` when asked.
    #[must_use]
    pub fn new(label: impl Into<String>, decision: Decision, log: StepLog) -> Self {
        Self {
            label: label.into(),
            decision,
            log,
        }
    }
}

impl<T: ?Sized> DecisionUnit<T> for RecordingUnit {
    fn decide(&self, _principal: &dyn PrincipalSupplier, _target: &T) -> AuthzResult<Decision> {
        self.log.push(self.label.clone());
        Ok(self.decision)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// A session step recording its name, optionally failing.
#[derive(Debug)]
pub struct RecordingStep {
    label: String,
    log: StepLog,
    fail: bool,
}

impl RecordingStep {
    /// A step that succeeds.
    #[must_use]
    pub fn new(label: impl Into<String>, log: StepLog) -> Self {
        Self {
            label: label.into(),
            log,
            fail: false,
        }
    }

    /// A step that records itself and then fails.
    #[must_use]
    pub fn failing(label: impl Into<String>, log: StepLog) -> Self {
        Self {
            fail: true,
            ..Self::new(label, log)
        }
    }
}

impl SessionAuthenticationStrategy for RecordingStep {
    fn on_authentication(
        &self,
        _principal: &Principal,
        _exchange: &mut SessionExchange,
    ) -> SessionResult<()> {
        self.log.push(self.label.clone());
        if self.fail {
            return Err(SessionError::StepFailed {
                step: self.label.clone(),
                message: "rejected by test step".to_string(),
            });
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}
