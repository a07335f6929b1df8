//! Warden Policy - Policy resolution, decision units and enforcement points.
//!
//! This crate provides:
//! - [`MetadataRegistry`] and [`UniqueAnnotationScanner`]: ahead-of-time
//!   policy metadata and closest-level-wins annotation discovery
//! - [`AttributeResolver`]: per-kind resolution with a concurrent cache
//! - [`DecisionUnit`] implementations: expression, authority, authenticated,
//!   permit/deny and the `all_of`/`any_of` composites
//! - [`RequestMatcherDelegatingManager`]: first-match routing of requests
//! - [`PrivilegeEvaluator`]: "would this be allowed?" queries
//! - Enforcement points: [`RequestEnforcer`] and
//!   [`MethodSecurityInterceptor`]
//!
//! Decisions are tri-state. Units never decide what an abstain means; each
//! enforcement point does, through its [`AbstainPolicy`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_core::{Decision, HttpRequest, Principal};
//! use warden_policy::prelude::*;
//!
//! let manager = RequestMatcherDelegatingManager::builder()
//!     .path("/admin/**", Arc::new(AuthorityUnit::has_authority("ROLE_ADMIN")))
//!     .unwrap()
//!     .any_request(Arc::new(Authenticated))
//!     .build()
//!     .unwrap();
//!
//! let alice = Arc::new(Principal::authenticated("alice"));
//! let decision = manager.authorize(&alice, &HttpRequest::get("/admin/users")).unwrap();
//! assert_eq!(decision, Decision::Deny);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod composite;
pub mod config_bridge;
pub mod delegating;
pub mod enforce;
pub mod expression;
pub mod interceptor;
pub mod matcher;
pub mod metadata;
pub mod privilege;
pub mod resolver;
pub mod scanner;
pub mod unit;

pub use composite::{AllOf, AnyOf};
pub use delegating::{RequestMatcherDelegatingManager, RequestMatcherDelegatingManagerBuilder};
pub use enforce::{AbstainPolicy, RequestEnforcer};
pub use expression::{AttributeExpressionUnit, ExpressionUnit};
pub use interceptor::{ConstantDenyHandler, DenyHandler, MethodSecurityInterceptor};
pub use matcher::{AnyRequest, OrMatcher, PathPatternMatcher, RequestMatcher};
pub use metadata::{
    AnnotationUse, ComposedAnnotation, MetadataRegistry, PolicyAnnotation, PolicyKind, TypeKind,
    TypeMetadata,
};
pub use privilege::{
    IdentityTransformer, PathPatternRequestTransformer, PrivilegeEvaluator, RequestTransformer,
    allows,
};
pub use resolver::{AttributeResolver, PolicyAttribute};
pub use scanner::{AnnotationScanner, UniqueAnnotationScanner};
pub use unit::{
    Authenticated, AuthorityUnit, DecisionUnit, DenyAll, FnUnit, PermitAll, from_fn,
};
