//! The authenticated identity and its deferred accessor.
//!
//! Decision calls never read the principal from ambient state. Every call
//! takes a [`PrincipalSupplier`], and only units whose policy actually needs
//! the identity call [`PrincipalSupplier::get`]. [`DeferredPrincipal`]
//! memoizes the first resolution so the underlying lookup runs at most once
//! per decision no matter how many units ask.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{AuthzError, AuthzResult};

/// Name used for unauthenticated callers.
pub const ANONYMOUS: &str = "anonymous";

/// An authenticated (or anonymous) identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal name (user name, client id, ...).
    pub name: String,
    /// Granted authorities, e.g. `ROLE_ADMIN` or `document:read`.
    #[serde(default)]
    pub authorities: Vec<String>,
    /// Whether the identity was established by authentication.
    pub authenticated: bool,
    /// Free-form attributes exposed to expressions.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Principal {
    /// Create an authenticated principal with no authorities.
    #[must_use]
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorities: Vec::new(),
            authenticated: true,
            attributes: BTreeMap::new(),
        }
    }

    /// Create the anonymous principal.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS.to_string(),
            authorities: Vec::new(),
            authenticated: false,
            attributes: BTreeMap::new(),
        }
    }

    /// Add an authority.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    /// Add several authorities.
    #[must_use]
    pub fn with_authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities
            .extend(authorities.into_iter().map(Into::into));
        self
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Whether the principal holds the given authority.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    /// Whether this is an anonymous, unauthenticated identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        !self.authenticated
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Deferred accessor for the current principal.
///
/// Implementations must be idempotent: calling [`get`](Self::get) more than
/// once returns the same identity.
pub trait PrincipalSupplier: Send + Sync {
    /// Resolve the principal.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::PrincipalUnavailable`] if the identity cannot be
    /// produced.
    fn get(&self) -> AuthzResult<Arc<Principal>>;
}

impl PrincipalSupplier for Arc<Principal> {
    fn get(&self) -> AuthzResult<Arc<Principal>> {
        Ok(Arc::clone(self))
    }
}

impl<S: PrincipalSupplier + ?Sized> PrincipalSupplier for &S {
    fn get(&self) -> AuthzResult<Arc<Principal>> {
        (**self).get()
    }
}

/// A principal supplier that runs its resolver at most once.
///
/// The first call to [`get`](PrincipalSupplier::get) runs the resolver and
/// caches the outcome, including failures; every later call returns the
/// cached outcome. Constructing a `DeferredPrincipal` never runs the resolver.
pub struct DeferredPrincipal<F> {
    resolver: F,
    resolved: OnceLock<Result<Arc<Principal>, String>>,
}

impl<F> DeferredPrincipal<F>
where
    F: Fn() -> AuthzResult<Principal> + Send + Sync,
{
    /// Wrap a resolver.
    pub fn new(resolver: F) -> Self {
        Self {
            resolver,
            resolved: OnceLock::new(),
        }
    }

    /// Whether the resolver has already run.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl<F> PrincipalSupplier for DeferredPrincipal<F>
where
    F: Fn() -> AuthzResult<Principal> + Send + Sync,
{
    fn get(&self) -> AuthzResult<Arc<Principal>> {
        let outcome = self.resolved.get_or_init(|| {
            tracing::trace!("resolving deferred principal");
            (self.resolver)()
                .map(Arc::new)
                .map_err(failure_message)
        });
        replay(outcome)
    }
}

impl<F> fmt::Debug for DeferredPrincipal<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredPrincipal")
            .field("resolved", &self.resolved.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Per-decision memo over a borrowed supplier.
///
/// Orchestrators wrap the caller's supplier in one of these at their entry
/// point, so every unit consulted during a single decision shares one
/// lookup even when the caller passed a supplier that does not memoize.
pub struct MemoizedPrincipal<'a> {
    inner: &'a dyn PrincipalSupplier,
    resolved: OnceLock<Result<Arc<Principal>, String>>,
}

impl<'a> MemoizedPrincipal<'a> {
    /// Wrap `inner` without resolving it.
    #[must_use]
    pub fn new(inner: &'a dyn PrincipalSupplier) -> Self {
        Self {
            inner,
            resolved: OnceLock::new(),
        }
    }

    /// Whether the wrapped supplier has been asked.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl PrincipalSupplier for MemoizedPrincipal<'_> {
    fn get(&self) -> AuthzResult<Arc<Principal>> {
        replay(
            self.resolved
                .get_or_init(|| self.inner.get().map_err(failure_message)),
        )
    }
}

impl fmt::Debug for MemoizedPrincipal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedPrincipal")
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

fn failure_message(error: AuthzError) -> String {
    match error {
        AuthzError::PrincipalUnavailable(message) => message,
        other => other.to_string(),
    }
}

fn replay(outcome: &Result<Arc<Principal>, String>) -> AuthzResult<Arc<Principal>> {
    match outcome {
        Ok(principal) => Ok(Arc::clone(principal)),
        Err(message) => Err(AuthzError::PrincipalUnavailable(message.clone())),
    }
}
