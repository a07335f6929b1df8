//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_expr::prelude::*;` to import all essential types.

pub use crate::{
    CompiledExpression, ContextFactory, EvaluationContext, ExpressionEngine, MethodContextFactory,
    RequestContextFactory, filter_values, vars,
};
