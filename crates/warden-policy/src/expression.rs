//! Expression-based decision units.
//!
//! [`AttributeExpressionUnit`] resolves the policy for each method call
//! through an [`AttributeResolver`]; [`ExpressionUnit`] evaluates one fixed
//! expression compiled at construction time.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use warden_core::{AuthzError, AuthzResult, Decision, MethodTarget, PrincipalSupplier};
use warden_expr::{CompiledExpression, ContextFactory, ExpressionEngine, MethodContextFactory};

use crate::resolver::{AttributeResolver, PolicyAttribute};
use crate::unit::DecisionUnit;

/// Decides method calls using the resolved policy attribute.
///
/// Abstains when the method carries no policy of the resolver's kind. For
/// filter kinds the unit does not decide; [`attribute`](Self::attribute)
/// exposes the compiled expression and filter target to the caller that runs
/// the filtering loop.
pub struct AttributeExpressionUnit<F = MethodContextFactory> {
    resolver: Arc<AttributeResolver>,
    factory: F,
}

impl AttributeExpressionUnit<MethodContextFactory> {
    /// Create a unit using the standard method context bindings.
    #[must_use]
    pub fn new(resolver: Arc<AttributeResolver>) -> Self {
        Self::with_factory(resolver, MethodContextFactory)
    }
}

impl<F> AttributeExpressionUnit<F> {
    /// Create a unit with a custom context factory.
    #[must_use]
    pub fn with_factory(resolver: Arc<AttributeResolver>, factory: F) -> Self {
        Self { resolver, factory }
    }

    /// The resolver backing this unit.
    #[must_use]
    pub fn resolver(&self) -> &Arc<AttributeResolver> {
        &self.resolver
    }

    /// The resolved attribute for `target`, if any.
    ///
    /// # Errors
    ///
    /// See [`AttributeResolver::resolve`].
    pub fn attribute<T: MethodTarget + ?Sized>(
        &self,
        target: &T,
    ) -> AuthzResult<Option<Arc<PolicyAttribute>>> {
        self.resolver.resolve_for(target)
    }

    /// Decide and also return the attribute that produced the decision.
    ///
    /// # Errors
    ///
    /// Resolution, context construction and evaluation errors propagate.
    /// Deciding with a filter-kind resolver is a configuration error.
    pub fn decide_with_attribute<T>(
        &self,
        principal: &dyn PrincipalSupplier,
        target: &T,
    ) -> AuthzResult<(Decision, Option<Arc<PolicyAttribute>>)>
    where
        T: MethodTarget + ?Sized,
        F: ContextFactory<T>,
    {
        if self.resolver.kind().is_filter() {
            return Err(AuthzError::configuration(format!(
                "{} policies filter collections and cannot decide",
                self.resolver.kind()
            )));
        }
        let Some(attribute) = self.resolver.resolve_for(target)? else {
            return Ok((Decision::Abstain, None));
        };

        let context = self.factory.create_evaluation_context(principal, target)?;
        let granted = self
            .resolver
            .engine()
            .evaluate_as_boolean(&attribute.expression, &context)?;
        let decision = Decision::from_granted(granted);
        debug!(
            method = %target.invocation().method,
            policy = %attribute,
            %decision,
            "expression decision"
        );
        Ok((decision, Some(attribute)))
    }
}

impl<T, F> DecisionUnit<T> for AttributeExpressionUnit<F>
where
    T: MethodTarget + ?Sized,
    F: ContextFactory<T>,
{
    fn decide(&self, principal: &dyn PrincipalSupplier, target: &T) -> AuthzResult<Decision> {
        self.decide_with_attribute(principal, target)
            .map(|(decision, _)| decision)
    }

    fn describe(&self) -> String {
        format!("{}_expression", self.resolver.kind())
    }
}

impl<F> fmt::Debug for AttributeExpressionUnit<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeExpressionUnit")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// Decides with one expression compiled up front.
pub struct ExpressionUnit<F> {
    engine: Arc<ExpressionEngine>,
    expression: Arc<CompiledExpression>,
    factory: F,
}

impl<F> ExpressionUnit<F> {
    /// Compile `source` and build a unit around it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::ExpressionCompile`] if the expression is invalid.
    pub fn new(engine: Arc<ExpressionEngine>, source: &str, factory: F) -> AuthzResult<Self> {
        let expression = engine.compile(source)?;
        Ok(Self {
            engine,
            expression,
            factory,
        })
    }

    /// The compiled expression.
    #[must_use]
    pub fn expression(&self) -> &Arc<CompiledExpression> {
        &self.expression
    }
}

impl<T, F> DecisionUnit<T> for ExpressionUnit<F>
where
    T: ?Sized,
    F: ContextFactory<T>,
{
    fn decide(&self, principal: &dyn PrincipalSupplier, target: &T) -> AuthzResult<Decision> {
        let context = self.factory.create_evaluation_context(principal, target)?;
        let granted = self.engine.evaluate_as_boolean(&self.expression, &context)?;
        Ok(Decision::from_granted(granted))
    }

    fn describe(&self) -> String {
        format!("expression({})", self.expression.source())
    }
}

impl<F> fmt::Debug for ExpressionUnit<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionUnit")
            .field("expression", &self.expression.source())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataRegistry, PolicyAnnotation, PolicyKind, TypeMetadata};
    use crate::scanner::UniqueAnnotationScanner;
    use serde_json::json;
    use warden_core::{
        DeferredPrincipal, HttpRequest, MethodInvocation, MethodInvocationResult, MethodRef,
        Principal,
    };
    use warden_expr::RequestContextFactory;

    struct Forbidden;

    impl PrincipalSupplier for Forbidden {
        fn get(&self) -> AuthzResult<Arc<Principal>> {
            panic!("principal must not be resolved");
        }
    }

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new().with_type(
            TypeMetadata::class("DocumentService")
                .declares("list")
                .method("read", PolicyAnnotation::pre_authorize("args.public || principal.name == args.owner"))
                .method("count", PolicyAnnotation::pre_authorize("args.public"))
                .method("stats", PolicyAnnotation::pre_authorize("'not a boolean'"))
                .method("fetch", PolicyAnnotation::post_authorize("returnObject.owner == principal.name"))
                .method("search", PolicyAnnotation::post_filter("filterObject.public")),
        )
    }

    fn unit(kind: PolicyKind) -> AttributeExpressionUnit {
        let engine = Arc::new(ExpressionEngine::new());
        let scanner = Arc::new(UniqueAnnotationScanner::new(Arc::new(registry())));
        AttributeExpressionUnit::new(Arc::new(AttributeResolver::new(kind, scanner, engine)))
    }

    fn call(method: &str) -> MethodInvocation {
        MethodInvocation::new(MethodRef::new("DocumentService", method))
    }

    #[test]
    fn test_abstains_without_policy() {
        let unit = unit(PolicyKind::PreAuthorize);
        assert_eq!(unit.decide(&Forbidden, &call("list")).unwrap(), Decision::Abstain);
    }

    #[test]
    fn test_grant_and_deny() {
        let unit = unit(PolicyKind::PreAuthorize);
        let alice = Arc::new(Principal::authenticated("alice"));

        let own = call("read").with_argument("public", json!(false)).with_argument("owner", json!("alice"));
        let other = call("read").with_argument("public", json!(false)).with_argument("owner", json!("bob"));
        assert_eq!(unit.decide(&alice, &own).unwrap(), Decision::Grant);
        assert_eq!(unit.decide(&alice, &other).unwrap(), Decision::Deny);
    }

    #[test]
    fn test_principal_not_resolved_when_unreferenced() {
        let unit = unit(PolicyKind::PreAuthorize);
        let invocation = call("count").with_argument("public", json!(true));
        assert_eq!(unit.decide(&Forbidden, &invocation).unwrap(), Decision::Grant);
    }

    #[test]
    fn test_principal_resolved_lazily() {
        let unit = unit(PolicyKind::PreAuthorize);
        let principal = DeferredPrincipal::new(|| Ok(Principal::authenticated("alice")));
        let invocation = call("count").with_argument("public", json!(false));
        assert_eq!(unit.decide(&principal, &invocation).unwrap(), Decision::Deny);
        assert!(!principal.is_resolved());
    }

    #[test]
    fn test_non_boolean_is_configuration_error() {
        let unit = unit(PolicyKind::PreAuthorize);
        let err = unit.decide(&Forbidden, &call("stats")).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_missing_argument_is_evaluation_error() {
        let unit = unit(PolicyKind::PreAuthorize);
        let err = unit.decide(&Forbidden, &call("count")).unwrap_err();
        assert!(matches!(err, AuthzError::Evaluation { .. }));
    }

    #[test]
    fn test_post_authorize_sees_return_object() {
        let unit = unit(PolicyKind::PostAuthorize);
        let alice = Arc::new(Principal::authenticated("alice"));
        let mine = MethodInvocationResult::new(call("fetch"), json!({"owner": "alice"}));
        let theirs = MethodInvocationResult::new(call("fetch"), json!({"owner": "bob"}));
        assert_eq!(unit.decide(&alice, &mine).unwrap(), Decision::Grant);
        assert_eq!(unit.decide(&alice, &theirs).unwrap(), Decision::Deny);
    }

    #[test]
    fn test_filter_kind_exposes_attribute_but_does_not_decide() {
        let unit = unit(PolicyKind::PostFilter);
        let result = MethodInvocationResult::new(call("search"), json!([]));
        let attribute = unit.attribute(&result).unwrap().unwrap();
        assert_eq!(attribute.expression.source(), "filterObject.public");
        assert!(unit.decide(&Forbidden, &result).unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_fixed_request_expression() {
        let engine = Arc::new(ExpressionEngine::new());
        let unit = ExpressionUnit::new(
            engine,
            "request.method == 'GET' && request.path.startsWith('/docs')",
            RequestContextFactory::default(),
        )
        .unwrap();
        assert_eq!(
            unit.decide(&Forbidden, &HttpRequest::get("/docs/1")).unwrap(),
            Decision::Grant
        );
        assert_eq!(
            unit.decide(&Forbidden, &HttpRequest::get("/admin")).unwrap(),
            Decision::Deny
        );
    }

    #[test]
    fn test_fixed_expression_rejects_bad_source() {
        let engine = Arc::new(ExpressionEngine::new());
        assert!(ExpressionUnit::new(engine, "&&", MethodContextFactory).is_err());
    }
}
