//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_policy::prelude::*;` to import all essential types.

// Metadata and resolution
pub use crate::{
    AnnotationScanner, AnnotationUse, AttributeResolver, MetadataRegistry, PolicyAnnotation,
    PolicyKind, TypeMetadata, UniqueAnnotationScanner,
};

// Decision units
pub use crate::{
    AllOf, AnyOf, AttributeExpressionUnit, Authenticated, AuthorityUnit, DecisionUnit, DenyAll,
    ExpressionUnit, PermitAll, from_fn,
};

// Routing
pub use crate::{PathPatternMatcher, PrivilegeEvaluator, RequestMatcher, RequestMatcherDelegatingManager};

// Enforcement
pub use crate::{AbstainPolicy, DenyHandler, MethodSecurityInterceptor, RequestEnforcer};
