//! The decision unit capability and the standard non-expression units.

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;
use warden_core::{AuthzResult, Decision, PrincipalSupplier};

/// Anything that can decide whether a principal may proceed with `T`.
///
/// Implementations must only call [`PrincipalSupplier::get`] when their
/// policy needs the identity.
pub trait DecisionUnit<T: ?Sized>: Send + Sync {
    /// Decide for one target.
    ///
    /// # Errors
    ///
    /// Configuration and evaluation errors are returned as errors, never
    /// folded into [`Decision::Deny`] or [`Decision::Abstain`].
    fn decide(&self, principal: &dyn PrincipalSupplier, target: &T) -> AuthzResult<Decision>;

    /// A short description for logs.
    fn describe(&self) -> String {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("DecisionUnit")
            .to_string()
    }
}

/// A decision unit backed by a closure. Created by [`from_fn`].
pub struct FnUnit<F, T: ?Sized> {
    f: F,
    _target: PhantomData<fn(&T)>,
}

/// Wrap a closure as a decision unit.
pub fn from_fn<T, F>(f: F) -> FnUnit<F, T>
where
    T: ?Sized,
    F: Fn(&dyn PrincipalSupplier, &T) -> AuthzResult<Decision> + Send + Sync,
{
    FnUnit {
        f,
        _target: PhantomData,
    }
}

impl<T, F> DecisionUnit<T> for FnUnit<F, T>
where
    T: ?Sized,
    F: Fn(&dyn PrincipalSupplier, &T) -> AuthzResult<Decision> + Send + Sync,
{
    fn decide(&self, principal: &dyn PrincipalSupplier, target: &T) -> AuthzResult<Decision> {
        (self.f)(principal, target)
    }

    fn describe(&self) -> String {
        "fn".to_string()
    }
}

impl<F, T: ?Sized> fmt::Debug for FnUnit<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnit").finish_non_exhaustive()
    }
}

/// Always grants.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl<T: ?Sized> DecisionUnit<T> for PermitAll {
    fn decide(&self, _principal: &dyn PrincipalSupplier, _target: &T) -> AuthzResult<Decision> {
        Ok(Decision::Grant)
    }

    fn describe(&self) -> String {
        "permit_all".to_string()
    }
}

/// Always denies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl<T: ?Sized> DecisionUnit<T> for DenyAll {
    fn decide(&self, _principal: &dyn PrincipalSupplier, _target: &T) -> AuthzResult<Decision> {
        Ok(Decision::Deny)
    }

    fn describe(&self) -> String {
        "deny_all".to_string()
    }
}

/// Grants authenticated principals, denies anonymous ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

impl<T: ?Sized> DecisionUnit<T> for Authenticated {
    fn decide(&self, principal: &dyn PrincipalSupplier, _target: &T) -> AuthzResult<Decision> {
        let principal = principal.get()?;
        Ok(Decision::from_granted(principal.authenticated))
    }

    fn describe(&self) -> String {
        "authenticated".to_string()
    }
}

/// Grants principals holding at least one of the listed authorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityUnit {
    authorities: Vec<String>,
}

impl AuthorityUnit {
    /// Require a single authority.
    #[must_use]
    pub fn has_authority(authority: impl Into<String>) -> Self {
        Self {
            authorities: vec![authority.into()],
        }
    }

    /// Require any one of several authorities.
    #[must_use]
    pub fn has_any_authority<I, S>(authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authorities: authorities.into_iter().map(Into::into).collect(),
        }
    }

    /// The accepted authorities.
    #[must_use]
    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }
}

impl<T: ?Sized> DecisionUnit<T> for AuthorityUnit {
    fn decide(&self, principal: &dyn PrincipalSupplier, _target: &T) -> AuthzResult<Decision> {
        let principal = principal.get()?;
        let granted = self.authorities.iter().any(|a| principal.has_authority(a));
        trace!(principal = %principal, required = ?self.authorities, granted, "authority check");
        Ok(Decision::from_granted(granted))
    }

    fn describe(&self) -> String {
        format!("has_any_authority({})", self.authorities.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_core::{AuthzError, HttpRequest, Principal};

    struct Forbidden;

    impl PrincipalSupplier for Forbidden {
        fn get(&self) -> AuthzResult<Arc<Principal>> {
            panic!("principal must not be resolved");
        }
    }

    #[test]
    fn test_constant_units_never_resolve_principal() {
        let request = HttpRequest::get("/");
        assert_eq!(PermitAll.decide(&Forbidden, &request).unwrap(), Decision::Grant);
        assert_eq!(DenyAll.decide(&Forbidden, &request).unwrap(), Decision::Deny);
    }

    #[test]
    fn test_authenticated() {
        let request = HttpRequest::get("/");
        let alice = Arc::new(Principal::authenticated("alice"));
        let anon = Arc::new(Principal::anonymous());
        assert_eq!(Authenticated.decide(&alice, &request).unwrap(), Decision::Grant);
        assert_eq!(Authenticated.decide(&anon, &request).unwrap(), Decision::Deny);
    }

    #[test]
    fn test_authority_unit() {
        let request = HttpRequest::get("/");
        let admin = Arc::new(Principal::authenticated("root").with_authority("ROLE_ADMIN"));
        let user = Arc::new(Principal::authenticated("bob").with_authority("ROLE_USER"));

        let unit = AuthorityUnit::has_any_authority(["ROLE_ADMIN", "ROLE_OPS"]);
        assert_eq!(unit.decide(&admin, &request).unwrap(), Decision::Grant);
        assert_eq!(unit.decide(&user, &request).unwrap(), Decision::Deny);
        assert_eq!(
            DecisionUnit::<HttpRequest>::describe(&unit),
            "has_any_authority(ROLE_ADMIN, ROLE_OPS)"
        );
        assert_eq!(AuthorityUnit::has_authority("ROLE_USER").authorities(), ["ROLE_USER"]);
    }

    #[test]
    fn test_principal_failure_propagates() {
        struct Broken;
        impl PrincipalSupplier for Broken {
            fn get(&self) -> AuthzResult<Arc<Principal>> {
                Err(AuthzError::PrincipalUnavailable("store offline".into()))
            }
        }
        let request = HttpRequest::get("/");
        assert!(matches!(
            Authenticated.decide(&Broken, &request),
            Err(AuthzError::PrincipalUnavailable(_))
        ));
    }

    #[test]
    fn test_from_fn() {
        let unit = from_fn(|_: &dyn PrincipalSupplier, request: &HttpRequest| {
            Ok(Decision::from_granted(request.uri.starts_with("/public")))
        });
        assert_eq!(
            unit.decide(&Forbidden, &HttpRequest::get("/public/a")).unwrap(),
            Decision::Grant
        );
        assert_eq!(unit.describe(), "fn");
    }
}
