//! Composite decision units.
//!
//! Both composites evaluate their children in list order and stop as soon
//! as the outcome is settled:
//!
//! | Composite | Short-circuits on | All abstain | Otherwise |
//! |-----------|-------------------|-------------|-----------|
//! | [`AllOf`] | first deny        | abstain     | grant     |
//! | [`AnyOf`] | first grant       | abstain     | deny      |
//!
//! Children share one principal lookup per decision.

use std::fmt;
use std::sync::Arc;
use tracing::trace;

use warden_core::{AuthzError, AuthzResult, Decision, MemoizedPrincipal, PrincipalSupplier};

use crate::unit::DecisionUnit;

/// Requires every non-abstaining child to grant.
pub struct AllOf<T: ?Sized> {
    units: Vec<Arc<dyn DecisionUnit<T>>>,
}

impl<T: ?Sized> AllOf<T> {
    /// Build from an ordered, non-empty list.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if `units` is empty.
    pub fn new(units: Vec<Arc<dyn DecisionUnit<T>>>) -> AuthzResult<Self> {
        if units.is_empty() {
            return Err(AuthzError::configuration("all_of requires at least one unit"));
        }
        Ok(Self { units })
    }

    /// Number of child units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Always false; construction rejects empty lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl<T: ?Sized> DecisionUnit<T> for AllOf<T> {
    fn decide(&self, principal: &dyn PrincipalSupplier, target: &T) -> AuthzResult<Decision> {
        let principal = MemoizedPrincipal::new(principal);
        let mut granted = false;
        for (position, unit) in self.units.iter().enumerate() {
            match unit.decide(&principal, target)? {
                Decision::Deny => {
                    trace!(position, unit = %unit.describe(), "all_of denied");
                    return Ok(Decision::Deny);
                },
                Decision::Grant => granted = true,
                Decision::Abstain => {},
            }
        }
        Ok(if granted {
            Decision::Grant
        } else {
            Decision::Abstain
        })
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self.units.iter().map(|u| u.describe()).collect();
        format!("all_of({})", names.join(", "))
    }
}

/// Grants if any child grants.
pub struct AnyOf<T: ?Sized> {
    units: Vec<Arc<dyn DecisionUnit<T>>>,
}

impl<T: ?Sized> AnyOf<T> {
    /// Build from an ordered, non-empty list.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if `units` is empty.
    pub fn new(units: Vec<Arc<dyn DecisionUnit<T>>>) -> AuthzResult<Self> {
        if units.is_empty() {
            return Err(AuthzError::configuration("any_of requires at least one unit"));
        }
        Ok(Self { units })
    }

    /// Number of child units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Always false; construction rejects empty lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl<T: ?Sized> DecisionUnit<T> for AnyOf<T> {
    fn decide(&self, principal: &dyn PrincipalSupplier, target: &T) -> AuthzResult<Decision> {
        let principal = MemoizedPrincipal::new(principal);
        let mut denied = false;
        for (position, unit) in self.units.iter().enumerate() {
            match unit.decide(&principal, target)? {
                Decision::Grant => {
                    trace!(position, unit = %unit.describe(), "any_of granted");
                    return Ok(Decision::Grant);
                },
                Decision::Deny => denied = true,
                Decision::Abstain => {},
            }
        }
        Ok(if denied {
            Decision::Deny
        } else {
            Decision::Abstain
        })
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self.units.iter().map(|u| u.describe()).collect();
        format!("any_of({})", names.join(", "))
    }
}

impl<T: ?Sized> fmt::Debug for AllOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllOf").field("units", &self.units.len()).finish()
    }
}

impl<T: ?Sized> fmt::Debug for AnyOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyOf").field("units", &self.units.len()).finish()
    }
}
