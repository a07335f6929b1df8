//! Collection filtering.
//!
//! Filter policies are not decisions: the expression is applied to each
//! element of a collection, bound as [`vars::FILTER_OBJECT`], and the
//! elements for which it holds are kept.

use serde_json::Value as JsonValue;
use tracing::debug;

use warden_core::{AuthzError, AuthzResult};

use crate::context::{EvaluationContext, vars};
use crate::engine::{CompiledExpression, ExpressionEngine};

/// Retain the elements of `collection` for which `expression` is true.
///
/// Every other variable in `context` stays visible to the expression. The
/// `filterObject` binding is left set to the last element examined.
///
/// # Errors
///
/// Returns [`AuthzError::Configuration`] if `collection` is not an array,
/// plus anything [`ExpressionEngine::evaluate_as_boolean`] returns.
pub fn filter_values(
    engine: &ExpressionEngine,
    expression: &CompiledExpression,
    context: &mut EvaluationContext<'_>,
    collection: JsonValue,
) -> AuthzResult<JsonValue> {
    let JsonValue::Array(elements) = collection else {
        return Err(AuthzError::configuration(format!(
            "filter expression '{}' applied to a non-collection value",
            expression.source()
        )));
    };

    let before = elements.len();
    let mut retained = Vec::with_capacity(before);
    for element in elements {
        context.set_variable(vars::FILTER_OBJECT, &element)?;
        if engine.evaluate_as_boolean(expression, context)? {
            retained.push(element);
        }
    }
    debug!(
        expression = expression.source(),
        before,
        after = retained.len(),
        "filtered collection"
    );
    Ok(JsonValue::Array(retained))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use warden_core::Principal;

    #[test]
    fn test_filter_retains_matching_elements() {
        let engine = ExpressionEngine::new();
        let expr = engine
            .compile("filterObject.owner == principal.name")
            .unwrap();
        let alice = Arc::new(Principal::authenticated("alice"));
        let mut context = EvaluationContext::new(&alice);

        let documents = json!([
            {"id": 1, "owner": "alice"},
            {"id": 2, "owner": "bob"},
            {"id": 3, "owner": "alice"},
        ]);
        let filtered = filter_values(&engine, &expr, &mut context, documents).unwrap();
        assert_eq!(filtered, json!([{"id": 1, "owner": "alice"}, {"id": 3, "owner": "alice"}]));
    }

    #[test]
    fn test_filter_sees_other_variables() {
        let engine = ExpressionEngine::new();
        let expr = engine.compile("filterObject > args.min").unwrap();
        let principal = Arc::new(Principal::anonymous());
        let mut context = EvaluationContext::new(&principal)
            .with_variable(vars::ARGS, &json!({"min": 2}))
            .unwrap();
        let filtered = filter_values(&engine, &expr, &mut context, json!([1, 2, 3, 4])).unwrap();
        assert_eq!(filtered, json!([3, 4]));
    }

    #[test]
    fn test_filter_empty_collection() {
        let engine = ExpressionEngine::new();
        let expr = engine.compile("false").unwrap();
        let principal = Arc::new(Principal::anonymous());
        let mut context = EvaluationContext::new(&principal);
        assert_eq!(
            filter_values(&engine, &expr, &mut context, json!([])).unwrap(),
            json!([])
        );
    }

    #[test]
    fn test_filter_rejects_non_collection() {
        let engine = ExpressionEngine::new();
        let expr = engine.compile("true").unwrap();
        let principal = Arc::new(Principal::anonymous());
        let mut context = EvaluationContext::new(&principal);
        let err = filter_values(&engine, &expr, &mut context, json!({"a": 1})).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
