//! Session error types.

use thiserror::Error;

/// Errors raised while preparing a session after authentication.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The principal already holds the maximum number of sessions and
    /// logins beyond the limit are rejected.
    #[error("maximum sessions of {max} for principal '{principal}' exceeded")]
    MaximumSessionsExceeded {
        /// Principal name.
        principal: String,
        /// Configured limit.
        max: usize,
    },

    /// The strategy chain is misconfigured.
    #[error("session configuration error: {0}")]
    Configuration(String),

    /// A step rejected the authentication for its own reason.
    #[error("session step '{step}' failed: {message}")]
    StepFailed {
        /// Name of the failing step.
        step: String,
        /// Failure description.
        message: String,
    },
}

impl SessionError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
