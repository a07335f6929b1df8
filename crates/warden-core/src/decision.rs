//! Tri-state authorization decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single decision unit.
///
/// [`Decision::Abstain`] is distinct from [`Decision::Deny`]: composite
/// units read it as "defer to the next unit", not as a rejection. Whether an
/// abstain is ultimately treated as a grant or a deny is left to the
/// enforcement layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Access is granted.
    Grant,
    /// Access is denied.
    Deny,
    /// The unit has no opinion.
    Abstain,
}

impl Decision {
    /// Map a boolean expression result to a grant or deny.
    #[must_use]
    pub fn from_granted(granted: bool) -> Self {
        if granted { Self::Grant } else { Self::Deny }
    }

    /// Whether this decision grants access.
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Grant)
    }

    /// Whether this decision denies access.
    #[must_use]
    pub fn is_denied(self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Whether this decision carries no opinion.
    #[must_use]
    pub fn is_abstain(self) -> bool {
        matches!(self, Self::Abstain)
    }

    /// Collapse to a boolean, using `on_abstain` when no opinion was given.
    #[must_use]
    pub fn granted_or(self, on_abstain: bool) -> bool {
        match self {
            Self::Grant => true,
            Self::Deny => false,
            Self::Abstain => on_abstain,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grant => write!(f, "grant"),
            Self::Deny => write!(f, "deny"),
            Self::Abstain => write!(f, "abstain"),
        }
    }
}
