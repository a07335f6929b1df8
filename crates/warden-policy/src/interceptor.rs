//! Method security interception.
//!
//! [`MethodSecurityInterceptor`] wraps a method call with the four policy
//! kinds, in this order:
//!
//! 1. **Pre-filter** - filter a collection argument
//! 2. **Pre-authorize** - decide before the call; deny skips the call
//! 3. The call itself
//! 4. **Post-authorize** - decide against the returned value
//! 5. **Post-filter** - filter the returned collection
//!
//! A deny becomes [`AuthzError::AccessDenied`] unless the policy names a deny
//! handler, whose value is returned instead. A stage without a policy of its
//! kind has no say. Only a method with neither a pre- nor a post-authorize
//! policy falls back to the interceptor's [`AbstainPolicy`], checked before
//! the call. It defaults to letting the call proceed.
//!
//! All stages of one invocation share a single principal lookup.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use warden_core::{
    AuthzError, AuthzResult, Decision, MemoizedPrincipal, MethodInvocation,
    MethodInvocationResult, PrincipalSupplier,
};
use warden_expr::{ContextFactory, ExpressionEngine, MethodContextFactory, filter_values};

use crate::enforce::AbstainPolicy;
use crate::expression::AttributeExpressionUnit;
use crate::metadata::PolicyKind;
use crate::resolver::{AttributeResolver, PolicyAttribute};
use crate::scanner::AnnotationScanner;

/// Produces the value returned in place of a denied call.
pub trait DenyHandler: Send + Sync {
    /// Handle a denied invocation. `result` is the returned value for
    /// post-authorize denials and `None` for pre-authorize denials.
    ///
    /// # Errors
    ///
    /// A handler may still reject the call by returning an error.
    fn handle_denied(
        &self,
        invocation: &MethodInvocation,
        result: Option<&JsonValue>,
    ) -> AuthzResult<JsonValue>;
}

impl<F> DenyHandler for F
where
    F: Fn(&MethodInvocation, Option<&JsonValue>) -> AuthzResult<JsonValue> + Send + Sync,
{
    fn handle_denied(
        &self,
        invocation: &MethodInvocation,
        result: Option<&JsonValue>,
    ) -> AuthzResult<JsonValue> {
        self(invocation, result)
    }
}

/// Returns a fixed value for every denied call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDenyHandler(pub JsonValue);

impl DenyHandler for ConstantDenyHandler {
    fn handle_denied(
        &self,
        _invocation: &MethodInvocation,
        _result: Option<&JsonValue>,
    ) -> AuthzResult<JsonValue> {
        Ok(self.0.clone())
    }
}

/// Applies pre/post authorization and filtering around method calls.
pub struct MethodSecurityInterceptor {
    engine: Arc<ExpressionEngine>,
    pre_filter: AttributeExpressionUnit,
    pre_authorize: AttributeExpressionUnit,
    post_authorize: AttributeExpressionUnit,
    post_filter: AttributeExpressionUnit,
    deny_handlers: HashMap<String, Arc<dyn DenyHandler>>,
    on_abstain: AbstainPolicy,
}

impl MethodSecurityInterceptor {
    /// Create an interceptor with one resolver per policy kind.
    #[must_use]
    pub fn new(scanner: Arc<dyn AnnotationScanner>, engine: Arc<ExpressionEngine>) -> Self {
        let unit = |kind| {
            AttributeExpressionUnit::new(Arc::new(AttributeResolver::new(
                kind,
                Arc::clone(&scanner),
                Arc::clone(&engine),
            )))
        };
        Self {
            pre_filter: unit(PolicyKind::PreFilter),
            pre_authorize: unit(PolicyKind::PreAuthorize),
            post_authorize: unit(PolicyKind::PostAuthorize),
            post_filter: unit(PolicyKind::PostFilter),
            engine,
            deny_handlers: HashMap::new(),
            on_abstain: AbstainPolicy::Grant,
        }
    }

    /// Register a named deny handler.
    #[must_use]
    pub fn with_deny_handler(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn DenyHandler>,
    ) -> Self {
        self.deny_handlers.insert(name.into(), handler);
        self
    }

    /// Set how an abstain is treated.
    #[must_use]
    pub fn with_abstain_policy(mut self, on_abstain: AbstainPolicy) -> Self {
        self.on_abstain = on_abstain;
        self
    }

    /// The unit serving one policy kind.
    #[must_use]
    pub fn unit(&self, kind: PolicyKind) -> &AttributeExpressionUnit {
        match kind {
            PolicyKind::PreFilter => &self.pre_filter,
            PolicyKind::PreAuthorize => &self.pre_authorize,
            PolicyKind::PostAuthorize => &self.post_authorize,
            PolicyKind::PostFilter => &self.post_filter,
        }
    }

    /// The pre-authorize decision for an invocation, without calling it.
    ///
    /// # Errors
    ///
    /// Propagates resolution and evaluation errors.
    pub fn authorize(
        &self,
        principal: &dyn PrincipalSupplier,
        invocation: &MethodInvocation,
    ) -> AuthzResult<Decision> {
        let principal = MemoizedPrincipal::new(principal);
        self.pre_authorize
            .decide_with_attribute(&principal, invocation)
            .map(|(decision, _)| decision)
    }

    /// Run `call` under all four policy kinds.
    ///
    /// `call` receives the invocation after pre-filtering and is not invoked
    /// if pre-authorization rejects.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::AccessDenied`] on rejection, a configuration
    /// error for malformed policies or unknown deny handlers, and propagates
    /// evaluation errors and errors from `call`.
    pub fn invoke<C>(
        &self,
        principal: &dyn PrincipalSupplier,
        mut invocation: MethodInvocation,
        call: C,
    ) -> AuthzResult<JsonValue>
    where
        C: FnOnce(&MethodInvocation) -> AuthzResult<JsonValue>,
    {
        let principal = MemoizedPrincipal::new(principal);
        self.apply_pre_filter(&principal, &mut invocation)?;

        let (decision, attribute) = self
            .pre_authorize
            .decide_with_attribute(&principal, &invocation)?;
        if decision.is_denied() {
            return self.denied(PolicyKind::PreAuthorize, attribute.as_deref(), &invocation, None);
        }
        if decision.is_abstain()
            && self.post_authorize.attribute(&invocation)?.is_none()
            && !self.on_abstain.permits(Decision::Abstain)
        {
            return self.denied(PolicyKind::PreAuthorize, None, &invocation, None);
        }

        let value = call(&invocation)?;
        let result = MethodInvocationResult::new(invocation, value);

        let (decision, attribute) = self
            .post_authorize
            .decide_with_attribute(&principal, &result)?;
        if decision.is_denied() {
            return self.denied(
                PolicyKind::PostAuthorize,
                attribute.as_deref(),
                &result.invocation,
                Some(&result.result),
            );
        }

        self.apply_post_filter(&principal, result)
    }

    fn apply_pre_filter(
        &self,
        principal: &dyn PrincipalSupplier,
        invocation: &mut MethodInvocation,
    ) -> AuthzResult<()> {
        let Some(attribute) = self.pre_filter.attribute(&*invocation)? else {
            return Ok(());
        };
        let target = filter_target(&attribute, invocation)?;
        let collection = invocation
            .arguments
            .get(&target)
            .cloned()
            .unwrap_or(JsonValue::Null);

        let mut context = MethodContextFactory.create_evaluation_context(principal, &*invocation)?;
        let filtered = filter_values(&self.engine, &attribute.expression, &mut context, collection)?;
        debug!(method = %invocation.method, argument = %target, "pre-filtered argument");
        invocation.arguments.insert(target, filtered);
        Ok(())
    }

    fn apply_post_filter(
        &self,
        principal: &dyn PrincipalSupplier,
        result: MethodInvocationResult,
    ) -> AuthzResult<JsonValue> {
        let Some(attribute) = self.post_filter.attribute(&result)? else {
            return Ok(result.result);
        };
        let mut context = MethodContextFactory.create_evaluation_context(principal, &result)?;
        let (invocation, value) = result.into_parts();
        let filtered = filter_values(&self.engine, &attribute.expression, &mut context, value)?;
        debug!(method = %invocation.method, "post-filtered result");
        Ok(filtered)
    }

    fn denied(
        &self,
        kind: PolicyKind,
        attribute: Option<&PolicyAttribute>,
        invocation: &MethodInvocation,
        result: Option<&JsonValue>,
    ) -> AuthzResult<JsonValue> {
        if let Some(name) = attribute.and_then(|a| a.deny_handler.as_deref()) {
            let handler = self.deny_handlers.get(name).ok_or_else(|| {
                AuthzError::configuration(format!(
                    "{} on {} names unknown deny handler '{name}'",
                    kind, invocation.method
                ))
            })?;
            debug!(method = %invocation.method, %kind, handler = name, "invoking deny handler");
            return handler.handle_denied(invocation, result);
        }

        let reason = match attribute {
            Some(attribute) => format!("{} rejected by {attribute}", invocation.method),
            None => format!("{} has no authorization policy", invocation.method),
        };
        warn!(method = %invocation.method, %kind, "invocation denied");
        Err(AuthzError::access_denied(reason))
    }
}

/// The argument a pre-filter applies to: the declared target, or the only
/// array-valued argument.
fn filter_target(attribute: &PolicyAttribute, invocation: &MethodInvocation) -> AuthzResult<String> {
    if let Some(target) = &attribute.filter_target {
        if !invocation.arguments.contains_key(target) {
            return Err(AuthzError::configuration(format!(
                "pre_filter on {} targets unknown argument '{target}'",
                invocation.method
            )));
        }
        return Ok(target.clone());
    }

    let mut arrays = invocation
        .arguments
        .iter()
        .filter(|(_, value)| value.is_array())
        .map(|(name, _)| name);
    match (arrays.next(), arrays.next()) {
        (Some(only), None) => Ok(only.clone()),
        (None, _) => Err(AuthzError::configuration(format!(
            "pre_filter on {} found no collection argument",
            invocation.method
        ))),
        (Some(_), Some(_)) => Err(AuthzError::configuration(format!(
            "pre_filter on {} has several collection arguments; set filter_target",
            invocation.method
        ))),
    }
}

impl fmt::Debug for MethodSecurityInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&String> = self.deny_handlers.keys().collect();
        handlers.sort();
        f.debug_struct("MethodSecurityInterceptor")
            .field("deny_handlers", &handlers)
            .field("on_abstain", &self.on_abstain)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataRegistry, PolicyAnnotation, TypeMetadata};
    use crate::scanner::UniqueAnnotationScanner;
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_core::{MethodRef, Principal};

    struct Counted<'c>(Arc<Principal>, &'c AtomicUsize);

    impl PrincipalSupplier for Counted<'_> {
        fn get(&self) -> AuthzResult<Arc<Principal>> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&self.0))
        }
    }

    fn interceptor() -> MethodSecurityInterceptor {
        let registry = MetadataRegistry::new().with_type(
            TypeMetadata::class("DocumentService")
                .declares("ping")
                .method("read", PolicyAnnotation::pre_authorize("'ROLE_USER' in principal.authorities"))
                .method(
                    "secret",
                    PolicyAnnotation::pre_authorize("'ROLE_ADMIN' in principal.authorities")
                        .with_deny_handler("redact"),
                )
                .method("fetch", PolicyAnnotation::post_authorize("returnObject.owner == principal.name"))
                .method(
                    "peek",
                    PolicyAnnotation::post_authorize("returnObject.owner == principal.name")
                        .with_deny_handler("mask_owner"),
                )
                .method("search", PolicyAnnotation::post_filter("filterObject.owner == principal.name"))
                .method(
                    "delete_all",
                    PolicyAnnotation::pre_filter("filterObject.owner == principal.name")
                        .with_filter_target("documents"),
                )
                .method("tag", PolicyAnnotation::pre_filter("filterObject != 'internal'"))
                .method("broken", PolicyAnnotation::pre_authorize("false").with_deny_handler("missing")),
        );
        let scanner = Arc::new(UniqueAnnotationScanner::new(Arc::new(registry)));
        MethodSecurityInterceptor::new(scanner, Arc::new(ExpressionEngine::new()))
            .with_deny_handler("redact", Arc::new(ConstantDenyHandler(json!("<redacted>"))))
            .with_deny_handler(
                "mask_owner",
                Arc::new(|_: &MethodInvocation, result: Option<&JsonValue>| -> AuthzResult<JsonValue> {
                    let mut masked = result.cloned().unwrap_or(JsonValue::Null);
                    masked["owner"] = json!("***");
                    Ok(masked)
                }),
            )
    }

    fn call(method: &str) -> MethodInvocation {
        MethodInvocation::new(MethodRef::new("DocumentService", method))
    }

    fn alice() -> Arc<Principal> {
        Arc::new(Principal::authenticated("alice").with_authority("ROLE_USER"))
    }

    #[test]
    fn test_pre_authorize_deny_skips_call() {
        let interceptor = interceptor();
        let invoked = Cell::new(false);
        let anon = Arc::new(Principal::anonymous());
        let err = interceptor
            .invoke(&anon, call("read"), |_| {
                invoked.set(true);
                Ok(json!("doc"))
            })
            .unwrap_err();
        assert!(err.is_access_denied());
        assert!(!invoked.get());
    }

    #[test]
    fn test_pre_authorize_grant_runs_call() {
        let interceptor = interceptor();
        let value = interceptor.invoke(&alice(), call("read"), |_| Ok(json!("doc"))).unwrap();
        assert_eq!(value, json!("doc"));
    }

    #[test]
    fn test_unannotated_method_proceeds_by_default() {
        let interceptor = interceptor();
        let value = interceptor.invoke(&alice(), call("ping"), |_| Ok(json!("pong"))).unwrap();
        assert_eq!(value, json!("pong"));

        let strict = self::interceptor().with_abstain_policy(AbstainPolicy::Deny);
        assert!(strict.invoke(&alice(), call("ping"), |_| Ok(json!("pong"))).is_err());
    }

    #[test]
    fn test_strict_policy_accepts_single_stage_policies() {
        let strict = interceptor().with_abstain_policy(AbstainPolicy::Deny);
        let value = strict.invoke(&alice(), call("read"), |_| Ok(json!("doc"))).unwrap();
        assert_eq!(value, json!("doc"));

        let own = strict
            .invoke(&alice(), call("fetch"), |_| Ok(json!({"owner": "alice"})))
            .unwrap();
        assert_eq!(own["owner"], "alice");
    }

    #[test]
    fn test_strict_policy_rejects_unguarded_before_call() {
        let strict = interceptor().with_abstain_policy(AbstainPolicy::Deny);
        let invoked = Cell::new(false);
        let err = strict
            .invoke(&alice(), call("ping"), |_| {
                invoked.set(true);
                Ok(json!("pong"))
            })
            .unwrap_err();
        assert!(err.is_access_denied());
        assert!(err.to_string().contains("has no authorization policy"));
        assert!(!invoked.get());
    }

    #[test]
    fn test_invoke_resolves_principal_once() {
        let registry = MetadataRegistry::new().with_type(
            TypeMetadata::class("Inbox")
                .method("list", PolicyAnnotation::pre_filter("filterObject != principal.name"))
                .method("list", PolicyAnnotation::pre_authorize("principal.authenticated"))
                .method("list", PolicyAnnotation::post_filter("filterObject.owner == principal.name")),
        );
        let scanner = Arc::new(UniqueAnnotationScanner::new(Arc::new(registry)));
        let interceptor = MethodSecurityInterceptor::new(scanner, Arc::new(ExpressionEngine::new()));

        let calls = AtomicUsize::new(0);
        let principal = Counted(alice(), &calls);
        let invocation = MethodInvocation::new(MethodRef::new("Inbox", "list"))
            .with_argument("senders", json!(["alice", "bob"]));
        let value = interceptor
            .invoke(&principal, invocation, |inv| {
                assert_eq!(inv.arguments["senders"], json!(["bob"]));
                Ok(json!([{"owner": "alice"}, {"owner": "bob"}]))
            })
            .unwrap();
        assert_eq!(value, json!([{"owner": "alice"}]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pre_authorize_deny_handler() {
        let interceptor = interceptor();
        let value = interceptor
            .invoke(&alice(), call("secret"), |_| Ok(json!("classified")))
            .unwrap();
        assert_eq!(value, json!("<redacted>"));
    }

    #[test]
    fn test_post_authorize() {
        let interceptor = interceptor();
        let own = interceptor
            .invoke(&alice(), call("fetch"), |_| Ok(json!({"owner": "alice"})))
            .unwrap();
        assert_eq!(own["owner"], "alice");

        let err = interceptor
            .invoke(&alice(), call("fetch"), |_| Ok(json!({"owner": "bob"})))
            .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_post_authorize_deny_handler_sees_result() {
        let interceptor = interceptor();
        let value = interceptor
            .invoke(&alice(), call("peek"), |_| Ok(json!({"owner": "bob", "title": "x"})))
            .unwrap();
        assert_eq!(value, json!({"owner": "***", "title": "x"}));
    }

    #[test]
    fn test_unknown_deny_handler_is_configuration_error() {
        let interceptor = interceptor();
        let err = interceptor
            .invoke(&alice(), call("broken"), |_| Ok(JsonValue::Null))
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_post_filter() {
        let interceptor = interceptor();
        let value = interceptor
            .invoke(&alice(), call("search"), |_| {
                Ok(json!([{"id": 1, "owner": "alice"}, {"id": 2, "owner": "bob"}]))
            })
            .unwrap();
        assert_eq!(value, json!([{"id": 1, "owner": "alice"}]));
    }

    #[test]
    fn test_pre_filter_with_target() {
        let interceptor = interceptor();
        let invocation = call("delete_all")
            .with_argument("documents", json!([{"owner": "alice"}, {"owner": "bob"}]))
            .with_argument("reasons", json!(["cleanup"]));
        let seen = interceptor
            .invoke(&alice(), invocation, |inv| Ok(inv.arguments["documents"].clone()))
            .unwrap();
        assert_eq!(seen, json!([{"owner": "alice"}]));
    }

    #[test]
    fn test_pre_filter_infers_sole_collection() {
        let interceptor = interceptor();
        let invocation = call("tag")
            .with_argument("id", json!(3))
            .with_argument("tags", json!(["public", "internal", "draft"]));
        let seen = interceptor
            .invoke(&alice(), invocation, |inv| Ok(inv.arguments["tags"].clone()))
            .unwrap();
        assert_eq!(seen, json!(["public", "draft"]));
    }

    #[test]
    fn test_pre_filter_ambiguous_collection() {
        let interceptor = interceptor();
        let invocation = call("tag")
            .with_argument("a", json!([]))
            .with_argument("b", json!([]));
        let err = interceptor
            .invoke(&alice(), invocation, |_| Ok(JsonValue::Null))
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_authorize_only() {
        let interceptor = interceptor();
        assert_eq!(interceptor.authorize(&alice(), &call("read")).unwrap(), Decision::Grant);
        assert_eq!(interceptor.authorize(&alice(), &call("ping")).unwrap(), Decision::Abstain);
    }
}
