//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuthzError, AuthzResult};

// Decisions
pub use crate::Decision;

// Principals
pub use crate::{DeferredPrincipal, MemoizedPrincipal, Principal, PrincipalSupplier};

// Targets
pub use crate::{
    HttpMethod, HttpRequest, MethodInvocation, MethodInvocationResult, MethodRef, MethodTarget,
    PathParser, RequestPath,
};
