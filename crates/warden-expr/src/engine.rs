//! Expression compiler adapter.
//!
//! Wraps the CEL interpreter behind two operations, `compile` and
//! `evaluate`. Compiled programs are immutable and shared across threads;
//! the only state the engine owns is a compile cache keyed by source text.

use cel_interpreter::{Context, Program, Value};
use dashmap::DashMap;
use std::fmt;
use std::panic;
use std::sync::Arc;
use tracing::{debug, trace};

use warden_core::{AuthzError, AuthzResult};

use crate::context::{EvaluationContext, vars};

/// A compiled, immutable expression.
pub struct CompiledExpression {
    source: String,
    program: Program,
    references_principal: bool,
}

impl CompiledExpression {
    /// The source text the expression was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the expression mentions the given variable.
    #[must_use]
    pub fn references_variable(&self, name: &str) -> bool {
        self.program.references().has_variable(name)
    }

    /// Whether evaluating the expression can require the principal.
    #[must_use]
    pub fn references_principal(&self) -> bool {
        self.references_principal
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("source", &self.source)
            .field("references_principal", &self.references_principal)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for CompiledExpression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Compiles and evaluates CEL expressions.
pub struct ExpressionEngine {
    cache: DashMap<String, Arc<CompiledExpression>>,
    max_expression_length: usize,
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEngine {
    /// Create an engine with no expression length limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            max_expression_length: 0,
        }
    }

    /// Reject expressions longer than `max` bytes. 0 = no limit.
    #[must_use]
    pub fn with_max_expression_length(mut self, max: usize) -> Self {
        self.max_expression_length = max;
        self
    }

    /// Compile an expression, reusing a cached program for identical source.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::ExpressionCompile`] if the source is blank, too
    /// long, or not valid CEL.
    pub fn compile(&self, source: &str) -> AuthzResult<Arc<CompiledExpression>> {
        if let Some(cached) = self.cache.get(source) {
            return Ok(Arc::clone(cached.value()));
        }

        if source.trim().is_empty() {
            return Err(AuthzError::ExpressionCompile {
                expression: source.to_string(),
                message: "expression cannot be empty".to_string(),
            });
        }
        if self.max_expression_length > 0 && source.len() > self.max_expression_length {
            return Err(AuthzError::ExpressionCompile {
                expression: source.to_string(),
                message: format!(
                    "expression length ({} bytes) exceeds maximum ({} bytes)",
                    source.len(),
                    self.max_expression_length
                ),
            });
        }

        let program = Program::compile(source).map_err(|e| AuthzError::ExpressionCompile {
            expression: source.to_string(),
            message: e.to_string(),
        })?;
        let references_principal = program.references().has_variable(vars::PRINCIPAL);
        debug!(expression = source, references_principal, "compiled expression");

        let compiled = Arc::new(CompiledExpression {
            source: source.to_string(),
            program,
            references_principal,
        });
        let entry = self
            .cache
            .entry(source.to_string())
            .or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    /// Evaluate a compiled expression.
    ///
    /// The principal is bound only if the expression references it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Evaluation`] if the expression fails at runtime
    /// and [`AuthzError::PrincipalUnavailable`] if the principal was needed
    /// but could not be resolved.
    pub fn evaluate(
        &self,
        expression: &CompiledExpression,
        context: &EvaluationContext<'_>,
    ) -> AuthzResult<Value> {
        let mut cel = Context::default();
        for (name, value) in context.variables() {
            cel.add_variable_from_value(name.clone(), value.clone());
        }
        if expression.references_principal {
            let principal = context.principal_value()?;
            cel.add_variable_from_value(vars::PRINCIPAL, principal.clone());
        }

        // The interpreter can panic on some malformed inputs; surface that
        // as an evaluation failure instead of unwinding through the caller.
        let outcome =
            panic::catch_unwind(panic::AssertUnwindSafe(|| expression.program.execute(&cel)));
        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                return Err(AuthzError::Evaluation {
                    expression: expression.source.clone(),
                    message: e.to_string(),
                });
            },
            Err(_) => {
                return Err(AuthzError::Evaluation {
                    expression: expression.source.clone(),
                    message: "expression execution failed (internal error)".to_string(),
                });
            },
        };
        trace!(expression = %expression.source, result = ?value, "evaluated expression");
        Ok(value)
    }

    /// Evaluate an expression that must produce a boolean.
    ///
    /// # Errors
    ///
    /// Everything [`evaluate`](Self::evaluate) returns, plus
    /// [`AuthzError::NonBooleanResult`] for any non-boolean value.
    pub fn evaluate_as_boolean(
        &self,
        expression: &CompiledExpression,
        context: &EvaluationContext<'_>,
    ) -> AuthzResult<bool> {
        match self.evaluate(expression, context)? {
            Value::Bool(b) => Ok(b),
            other => Err(AuthzError::NonBooleanResult {
                expression: expression.source.clone(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// Number of cached compiled expressions.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("cached", &self.cache.len())
            .field("max_expression_length", &self.max_expression_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_core::{DeferredPrincipal, Principal, PrincipalSupplier};

    struct Forbidden;

    impl PrincipalSupplier for Forbidden {
        fn get(&self) -> AuthzResult<Arc<Principal>> {
            panic!("principal must not be resolved");
        }
    }

    #[test]
    fn test_compile_is_cached() {
        let engine = ExpressionEngine::new();
        let a = engine.compile("1 + 1 == 2").unwrap();
        let b = engine.compile("1 + 1 == 2").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.cached_len(), 1);
    }

    #[test]
    fn test_compile_rejects_blank_and_invalid() {
        let engine = ExpressionEngine::new();
        let err = engine.compile("   ").unwrap_err();
        assert!(err.is_configuration_error());

        let err = engine.compile("principal.name ==").unwrap_err();
        assert!(matches!(err, AuthzError::ExpressionCompile { .. }));
    }

    #[test]
    fn test_compile_enforces_length_limit() {
        let engine = ExpressionEngine::new().with_max_expression_length(8);
        assert!(engine.compile("true").is_ok());
        assert!(matches!(
            engine.compile("true && true && true"),
            Err(AuthzError::ExpressionCompile { .. })
        ));
    }

    #[test]
    fn test_references_principal() {
        let engine = ExpressionEngine::new();
        assert!(engine.compile("principal.name == 'alice'").unwrap().references_principal());
        assert!(!engine.compile("args.id == 1").unwrap().references_principal());
    }

    #[test]
    fn test_principal_not_resolved_when_unreferenced() {
        let engine = ExpressionEngine::new();
        let expr = engine.compile("args.public == true").unwrap();
        let context = EvaluationContext::new(&Forbidden)
            .with_variable(vars::ARGS, &json!({"public": true}))
            .unwrap();
        assert!(engine.evaluate_as_boolean(&expr, &context).unwrap());
    }

    #[test]
    fn test_principal_resolved_once_when_referenced() {
        let calls = AtomicUsize::new(0);
        let principal = DeferredPrincipal::new(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Principal::authenticated("alice").with_authority("ROLE_ADMIN"))
        });
        let engine = ExpressionEngine::new();
        let expr = engine
            .compile("principal.name == 'alice' && 'ROLE_ADMIN' in principal.authorities")
            .unwrap();
        let context = EvaluationContext::new(&principal);

        assert!(engine.evaluate_as_boolean(&expr, &context).unwrap());
        assert!(engine.evaluate_as_boolean(&expr, &context).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_program_different_principals() {
        let engine = ExpressionEngine::new();
        let expr = engine.compile("principal.name == args.owner").unwrap();

        let alice = Arc::new(Principal::authenticated("alice"));
        let bob = Arc::new(Principal::authenticated("bob"));
        let args = json!({"owner": "alice"});

        let alice_ctx = EvaluationContext::new(&alice)
            .with_variable(vars::ARGS, &args)
            .unwrap();
        let bob_ctx = EvaluationContext::new(&bob)
            .with_variable(vars::ARGS, &args)
            .unwrap();

        assert!(engine.evaluate_as_boolean(&expr, &alice_ctx).unwrap());
        assert!(!engine.evaluate_as_boolean(&expr, &bob_ctx).unwrap());
        // Re-evaluating the first context is unaffected by the second.
        assert!(engine.evaluate_as_boolean(&expr, &alice_ctx).unwrap());
    }

    #[test]
    fn test_non_boolean_result() {
        let engine = ExpressionEngine::new();
        let expr = engine.compile("'granted'").unwrap();
        let context = EvaluationContext::new(&Forbidden);
        let err = engine.evaluate_as_boolean(&expr, &context).unwrap_err();
        assert!(matches!(err, AuthzError::NonBooleanResult { .. }));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_missing_variable_is_evaluation_error() {
        let engine = ExpressionEngine::new();
        let expr = engine.compile("args.id == 1").unwrap();
        let context = EvaluationContext::new(&Forbidden);
        let err = engine.evaluate_as_boolean(&expr, &context).unwrap_err();
        assert!(matches!(err, AuthzError::Evaluation { .. }));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_unavailable_principal_propagates() {
        let principal =
            DeferredPrincipal::new(|| Err(AuthzError::PrincipalUnavailable("no session".into())));
        let engine = ExpressionEngine::new();
        let expr = engine.compile("principal.authenticated").unwrap();
        let context = EvaluationContext::new(&principal);
        assert!(matches!(
            engine.evaluate_as_boolean(&expr, &context),
            Err(AuthzError::PrincipalUnavailable(_))
        ));
    }
}
