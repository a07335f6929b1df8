//! Enforcement points.
//!
//! Decision units return tri-state values; enforcement turns them into
//! "proceed" or [`AuthzError::AccessDenied`]. What an abstain means is chosen
//! here, per enforcement point, through [`AbstainPolicy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use warden_core::{
    AuthzError, AuthzResult, Decision, HttpRequest, MemoizedPrincipal, PrincipalSupplier,
};

use crate::unit::DecisionUnit;

/// How an enforcement point treats an abstain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainPolicy {
    /// Abstain rejects the invocation.
    #[default]
    Deny,
    /// Abstain lets the invocation proceed.
    Grant,
}

impl AbstainPolicy {
    /// Whether `decision` lets the invocation proceed under this policy.
    #[must_use]
    pub fn permits(self, decision: Decision) -> bool {
        decision.granted_or(self == Self::Grant)
    }
}

impl fmt::Display for AbstainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deny => f.write_str("deny"),
            Self::Grant => f.write_str("grant"),
        }
    }
}

impl FromStr for AbstainPolicy {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deny" => Ok(Self::Deny),
            "grant" => Ok(Self::Grant),
            other => Err(AuthzError::configuration(format!(
                "abstain policy must be 'deny' or 'grant', got '{other}'"
            ))),
        }
    }
}

/// Request-time enforcement over a decision unit. Deny-by-default unless
/// configured otherwise.
pub struct RequestEnforcer {
    unit: Arc<dyn DecisionUnit<HttpRequest>>,
    on_abstain: AbstainPolicy,
}

impl RequestEnforcer {
    /// Create an enforcer that denies on abstain.
    #[must_use]
    pub fn new(unit: Arc<dyn DecisionUnit<HttpRequest>>) -> Self {
        Self {
            unit,
            on_abstain: AbstainPolicy::Deny,
        }
    }

    /// Set the abstain policy.
    #[must_use]
    pub fn with_abstain_policy(mut self, on_abstain: AbstainPolicy) -> Self {
        self.on_abstain = on_abstain;
        self
    }

    /// The abstain policy in effect.
    #[must_use]
    pub fn abstain_policy(&self) -> AbstainPolicy {
        self.on_abstain
    }

    /// Whether the request may proceed.
    ///
    /// # Errors
    ///
    /// Propagates configuration and evaluation errors; a deny is `Ok(false)`.
    pub fn check(
        &self,
        principal: &dyn PrincipalSupplier,
        request: &HttpRequest,
    ) -> AuthzResult<bool> {
        let principal = MemoizedPrincipal::new(principal);
        let decision = self.unit.decide(&principal, request)?;
        if decision.is_abstain() {
            debug!(
                method = %request.method,
                uri = %request.uri,
                on_abstain = %self.on_abstain,
                "no unit decided; applying abstain policy"
            );
        }
        Ok(self.on_abstain.permits(decision))
    }

    /// Let the request proceed or reject it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::AccessDenied`] if the request is rejected, and
    /// propagates configuration and evaluation errors unchanged.
    pub fn enforce(
        &self,
        principal: &dyn PrincipalSupplier,
        request: &HttpRequest,
    ) -> AuthzResult<()> {
        if self.check(principal, request)? {
            return Ok(());
        }
        warn!(method = %request.method, uri = %request.uri, "request denied");
        Err(AuthzError::access_denied(format!(
            "{} {}",
            request.method, request.uri
        )))
    }
}

impl fmt::Debug for RequestEnforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnforcer")
            .field("unit", &self.unit.describe())
            .field("on_abstain", &self.on_abstain)
            .finish()
    }
}
