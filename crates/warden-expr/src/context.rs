//! Evaluation contexts and the factories that build them.
//!
//! An [`EvaluationContext`] holds the variables an expression can see. The
//! principal is special: the context only keeps a reference to the
//! [`PrincipalSupplier`] and the engine asks for the identity when, and only
//! when, the compiled expression references [`vars::PRINCIPAL`].

use cel_interpreter::{Value, to_value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use warden_core::{
    AuthzError, AuthzResult, DefaultPathParser, HttpRequest, MethodInvocation,
    MethodInvocationResult, PathParser, PrincipalSupplier,
};

/// Variable names bound into evaluation contexts.
pub mod vars {
    /// The current principal (bound lazily).
    pub const PRINCIPAL: &str = "principal";
    /// Method arguments, keyed by parameter name.
    pub const ARGS: &str = "args";
    /// The invoked method's name.
    pub const METHOD: &str = "method";
    /// The effective target type name.
    pub const TARGET: &str = "target";
    /// The value returned by the method (post-invocation policies).
    pub const RETURN_OBJECT: &str = "returnObject";
    /// The element under test while filtering a collection.
    pub const FILTER_OBJECT: &str = "filterObject";
    /// The HTTP request.
    pub const REQUEST: &str = "request";
}

/// Variables visible to one expression evaluation.
pub struct EvaluationContext<'a> {
    principal: &'a dyn PrincipalSupplier,
    principal_value: OnceLock<Value>,
    variables: BTreeMap<String, Value>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context with no variables besides the deferred principal.
    #[must_use]
    pub fn new(principal: &'a dyn PrincipalSupplier) -> Self {
        Self {
            principal,
            principal_value: OnceLock::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Bind a serializable value to a variable name, replacing any previous
    /// binding.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Evaluation`] if the value cannot be represented
    /// in the expression language.
    pub fn set_variable<T: Serialize + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> AuthzResult<()> {
        let name = name.into();
        let value = to_value(value).map_err(|e| AuthzError::Evaluation {
            expression: format!("<binding of '{name}'>"),
            message: e.to_string(),
        })?;
        self.variables.insert(name, value);
        Ok(())
    }

    /// Builder form of [`set_variable`](Self::set_variable).
    ///
    /// # Errors
    ///
    /// See [`set_variable`](Self::set_variable).
    pub fn with_variable<T: Serialize + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> AuthzResult<Self> {
        self.set_variable(name, value)?;
        Ok(self)
    }

    /// Whether a variable is bound (the lazy principal is not counted).
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Iterate over the eagerly bound variables.
    pub(crate) fn variables(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.variables.iter()
    }

    /// The principal converted to an expression value, resolving the
    /// supplier on first use.
    pub(crate) fn principal_value(&self) -> AuthzResult<&Value> {
        if let Some(value) = self.principal_value.get() {
            return Ok(value);
        }
        let principal = self.principal.get()?;
        let value = to_value(&*principal).map_err(|e| AuthzError::Evaluation {
            expression: format!("<binding of '{}'>", vars::PRINCIPAL),
            message: e.to_string(),
        })?;
        Ok(self.principal_value.get_or_init(|| value))
    }
}

impl std::fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("principal_bound", &self.principal_value.get().is_some())
            .finish()
    }
}

/// Builds evaluation contexts for one kind of authorization target.
///
/// Implementations must not call [`PrincipalSupplier::get`].
pub trait ContextFactory<T: ?Sized>: Send + Sync {
    /// Create the context for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if a target value cannot be bound.
    fn create_evaluation_context<'a>(
        &self,
        principal: &'a dyn PrincipalSupplier,
        target: &T,
    ) -> AuthzResult<EvaluationContext<'a>>;
}

/// Binds `args`, `method` and `target` for method invocations, plus
/// `returnObject` for completed invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodContextFactory;

impl MethodContextFactory {
    fn bind_invocation(
        context: &mut EvaluationContext<'_>,
        invocation: &MethodInvocation,
    ) -> AuthzResult<()> {
        context.set_variable(vars::ARGS, &invocation.arguments)?;
        context.set_variable(vars::METHOD, invocation.method.name.as_str())?;
        context.set_variable(vars::TARGET, invocation.effective_target())?;
        Ok(())
    }
}

impl ContextFactory<MethodInvocation> for MethodContextFactory {
    fn create_evaluation_context<'a>(
        &self,
        principal: &'a dyn PrincipalSupplier,
        target: &MethodInvocation,
    ) -> AuthzResult<EvaluationContext<'a>> {
        let mut context = EvaluationContext::new(principal);
        Self::bind_invocation(&mut context, target)?;
        Ok(context)
    }
}

impl ContextFactory<MethodInvocationResult> for MethodContextFactory {
    fn create_evaluation_context<'a>(
        &self,
        principal: &'a dyn PrincipalSupplier,
        target: &MethodInvocationResult,
    ) -> AuthzResult<EvaluationContext<'a>> {
        let mut context = EvaluationContext::new(principal);
        Self::bind_invocation(&mut context, &target.invocation)?;
        context.set_variable(vars::RETURN_OBJECT, &target.result)?;
        Ok(context)
    }
}

#[derive(Serialize)]
struct RequestView<'r> {
    method: &'static str,
    path: &'r str,
    uri: &'r str,
    query: Option<&'r str>,
    headers: &'r BTreeMap<String, String>,
    attributes: &'r BTreeMap<String, serde_json::Value>,
}

/// Binds `request` for HTTP requests.
///
/// The path is the normalized path, computed through the request's own
/// cache so that matchers and expressions share one parse.
#[derive(Clone)]
pub struct RequestContextFactory {
    parser: Arc<dyn PathParser>,
}

impl RequestContextFactory {
    /// Create a factory using the given path parser.
    #[must_use]
    pub fn new(parser: Arc<dyn PathParser>) -> Self {
        Self { parser }
    }
}

impl Default for RequestContextFactory {
    fn default() -> Self {
        Self::new(Arc::new(DefaultPathParser))
    }
}

impl std::fmt::Debug for RequestContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContextFactory").finish_non_exhaustive()
    }
}

impl ContextFactory<HttpRequest> for RequestContextFactory {
    fn create_evaluation_context<'a>(
        &self,
        principal: &'a dyn PrincipalSupplier,
        target: &HttpRequest,
    ) -> AuthzResult<EvaluationContext<'a>> {
        let path = target.path(self.parser.as_ref());
        let view = RequestView {
            method: target.method.as_str(),
            path: path.as_str(),
            uri: &target.uri,
            query: target.query(),
            headers: &target.headers,
            attributes: &target.attributes,
        };
        EvaluationContext::new(principal).with_variable(vars::REQUEST, &view)
    }
}
