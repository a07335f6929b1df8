//! Warden Expr - Expression compiler adapter for the warden authorization engine.
//!
//! This crate provides:
//! - [`ExpressionEngine`]: compile-once, evaluate-many CEL programs
//! - [`EvaluationContext`]: per-evaluation variables with a lazily bound principal
//! - [`ContextFactory`] implementations for method invocations and HTTP requests
//! - [`filter_values`]: collection filtering with `filterObject` bound per element
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use warden_core::Principal;
//! use warden_expr::{EvaluationContext, ExpressionEngine, vars};
//!
//! let engine = ExpressionEngine::new();
//! let expr = engine.compile("principal.name == args.owner").unwrap();
//!
//! let alice = Arc::new(Principal::authenticated("alice"));
//! let context = EvaluationContext::new(&alice)
//!     .with_variable(vars::ARGS, &json!({"owner": "alice"}))
//!     .unwrap();
//! assert!(engine.evaluate_as_boolean(&expr, &context).unwrap());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod context;
pub mod engine;
pub mod filter;

pub use context::{
    ContextFactory, EvaluationContext, MethodContextFactory, RequestContextFactory, vars,
};
pub use engine::{CompiledExpression, ExpressionEngine};
pub use filter::filter_values;
