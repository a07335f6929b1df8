//! Attribute resolution with a concurrent per-target cache.
//!
//! Each [`AttributeResolver`] serves one [`PolicyKind`]. Resolution scans the
//! metadata once per `(method, target type)` key, compiles the expression and
//! memoizes the outcome, including the "no policy" outcome, for the lifetime
//! of the resolver.

use dashmap::DashMap;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

use warden_core::{AuthzResult, MethodRef, MethodTarget};
use warden_expr::{CompiledExpression, ExpressionEngine};

use crate::metadata::PolicyKind;
use crate::scanner::AnnotationScanner;

/// A resolved, compiled policy for one method target. Immutable.
#[derive(Debug)]
pub struct PolicyAttribute {
    /// The kind of policy.
    pub kind: PolicyKind,
    /// The compiled policy expression.
    pub expression: Arc<CompiledExpression>,
    /// For filters: the argument to filter.
    pub filter_target: Option<String>,
    /// For authorization policies: the deny handler to use instead of
    /// rejecting.
    pub deny_handler: Option<String>,
}

impl fmt::Display for PolicyAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.expression.source())
    }
}

/// Owned cache key. Lookups borrow it as a [`KeyView`] so a cache hit does
/// not allocate.
struct ResolutionKey {
    declaring_type: String,
    name: String,
    target: String,
}

impl ResolutionKey {
    fn new(method: &MethodRef, target_type: &str) -> Self {
        Self {
            declaring_type: method.declaring_type.clone(),
            name: method.name.clone(),
            target: target_type.to_owned(),
        }
    }
}

/// `(declaring type, method name, target type)`, owned or borrowed.
trait KeyView {
    fn parts(&self) -> (&str, &str, &str);
}

impl KeyView for ResolutionKey {
    fn parts(&self) -> (&str, &str, &str) {
        (&self.declaring_type, &self.name, &self.target)
    }
}

impl KeyView for (&str, &str, &str) {
    fn parts(&self) -> (&str, &str, &str) {
        *self
    }
}

impl<'a> Borrow<dyn KeyView + 'a> for ResolutionKey {
    fn borrow(&self) -> &(dyn KeyView + 'a) {
        self
    }
}

impl Hash for dyn KeyView + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts().hash(state);
    }
}

impl PartialEq for dyn KeyView + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.parts() == other.parts()
    }
}

impl Eq for dyn KeyView + '_ {}

// Must agree with the `dyn KeyView` impls for borrowed lookups to hit.
impl Hash for ResolutionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts().hash(state);
    }
}

impl PartialEq for ResolutionKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts() == other.parts()
    }
}

impl Eq for ResolutionKey {}

/// Resolves and caches [`PolicyAttribute`]s of one kind.
pub struct AttributeResolver {
    kind: PolicyKind,
    scanner: Arc<dyn AnnotationScanner>,
    engine: Arc<ExpressionEngine>,
    cache: DashMap<ResolutionKey, Option<Arc<PolicyAttribute>>>,
}

impl AttributeResolver {
    /// Create a resolver for one policy kind.
    #[must_use]
    pub fn new(
        kind: PolicyKind,
        scanner: Arc<dyn AnnotationScanner>,
        engine: Arc<ExpressionEngine>,
    ) -> Self {
        Self {
            kind,
            scanner,
            engine,
            cache: DashMap::new(),
        }
    }

    /// The policy kind this resolver serves.
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// The expression engine used to compile policies.
    #[must_use]
    pub fn engine(&self) -> &Arc<ExpressionEngine> {
        &self.engine
    }

    /// Resolve the attribute governing `method` on `target_type`.
    ///
    /// The scan and compile run without holding any cache lock. When several
    /// callers race on the same key, the first stored attribute wins and
    /// every caller gets that one.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for ambiguous declarations or an
    /// expression that fails to compile. Errors are not cached.
    pub fn resolve(
        &self,
        method: &MethodRef,
        target_type: &str,
    ) -> AuthzResult<Option<Arc<PolicyAttribute>>> {
        let view = (method.declaring_type.as_str(), method.name.as_str(), target_type);
        if let Some(cached) = self.cache.get(&view as &dyn KeyView) {
            return Ok(cached.value().clone());
        }

        let computed = self.compute(method, target_type)?;
        debug!(
            kind = %self.kind,
            method = %method,
            target = target_type,
            found = computed.is_some(),
            "resolved policy attribute"
        );
        let entry = self
            .cache
            .entry(ResolutionKey::new(method, target_type))
            .or_insert(computed);
        Ok(entry.value().clone())
    }

    /// Resolve for an invocation, using its effective target type.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub fn resolve_for<T: MethodTarget + ?Sized>(
        &self,
        target: &T,
    ) -> AuthzResult<Option<Arc<PolicyAttribute>>> {
        let invocation = target.invocation();
        self.resolve(&invocation.method, invocation.effective_target())
    }

    /// Number of cached keys, including "no policy" entries.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn compute(
        &self,
        method: &MethodRef,
        target_type: &str,
    ) -> AuthzResult<Option<Arc<PolicyAttribute>>> {
        let Some(annotation) = self.scanner.scan(method, target_type, self.kind)? else {
            return Ok(None);
        };
        let expression = self.engine.compile(&annotation.value)?;
        Ok(Some(Arc::new(PolicyAttribute {
            kind: annotation.kind,
            expression,
            filter_target: annotation.filter_target,
            deny_handler: annotation.deny_handler,
        })))
    }
}

impl fmt::Debug for AttributeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeResolver")
            .field("kind", &self.kind)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
