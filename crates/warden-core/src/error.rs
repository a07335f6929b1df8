//! Error taxonomy for authorization operations.
//!
//! Three families of failure are kept apart:
//!
//! - **Configuration errors** ([`AuthzError::Configuration`],
//!   [`AuthzError::AmbiguousPolicy`], [`AuthzError::ExpressionCompile`],
//!   [`AuthzError::NonBooleanResult`]) are programming or configuration
//!   defects. They are never retried and never downgraded to an abstain.
//! - **Rejections** ([`AuthzError::AccessDenied`]) are the expected outcome of
//!   a deny at an enforcement point.
//! - **Evaluation failures** ([`AuthzError::Evaluation`],
//!   [`AuthzError::PrincipalUnavailable`]) surface runtime problems instead of
//!   masking them as "access denied".

use thiserror::Error;

/// Errors that can occur while resolving or evaluating authorization policy.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed engine configuration (empty unit lists, unknown references, ...).
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration.
        message: String,
    },

    /// More than one distinct policy annotation governs the same element.
    #[error("ambiguous policy on {element}: found {} distinct candidates [{}]", candidates.len(), candidates.join(", "))]
    AmbiguousPolicy {
        /// The method or type whose declarations conflict.
        element: String,
        /// Human-readable rendering of each distinct candidate.
        candidates: Vec<String>,
    },

    /// An expression could not be compiled.
    #[error("failed to compile expression '{expression}': {message}")]
    ExpressionCompile {
        /// The source text of the expression.
        expression: String,
        /// The compiler's diagnostic.
        message: String,
    },

    /// An authorization expression produced something other than a boolean.
    #[error("expression '{expression}' must evaluate to a boolean, got {found}")]
    NonBooleanResult {
        /// The source text of the expression.
        expression: String,
        /// Description of the value that was produced.
        found: String,
    },

    /// The expression raised an error while being evaluated.
    #[error("failed to evaluate expression '{expression}': {message}")]
    Evaluation {
        /// The source text of the expression.
        expression: String,
        /// The evaluator's diagnostic.
        message: String,
    },

    /// The deferred principal could not be produced.
    #[error("principal unavailable: {0}")]
    PrincipalUnavailable(String),

    /// The invocation was rejected by an enforcement point.
    #[error("access denied: {reason}")]
    AccessDenied {
        /// Why the invocation was rejected.
        reason: String,
    },
}

impl AuthzError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an access-denied rejection.
    #[must_use]
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    /// Whether this error indicates a configuration defect rather than a
    /// runtime condition.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::AmbiguousPolicy { .. }
                | Self::ExpressionCompile { .. }
                | Self::NonBooleanResult { .. }
        )
    }

    /// Whether this error is an ordinary access-denied rejection.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;
