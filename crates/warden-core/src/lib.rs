//! Warden Core - Foundation types for the warden authorization decision engine.
//!
//! This crate provides:
//! - The tri-state [`Decision`] returned by every decision unit
//! - The [`Principal`] and its deferred accessor, [`PrincipalSupplier`]
//! - Authorization targets: [`MethodInvocation`] and [`HttpRequest`]
//! - Request path normalization with per-request caching
//! - The [`AuthzError`] taxonomy shared by all warden crates
//!
//! # Example
//!
//! ```
//! use warden_core::{Decision, DeferredPrincipal, Principal, PrincipalSupplier};
//!
//! // Nothing is resolved until a unit asks for the principal.
//! let principal = DeferredPrincipal::new(|| {
//!     Ok(Principal::authenticated("alice").with_authority("ROLE_ADMIN"))
//! });
//! assert!(!principal.is_resolved());
//!
//! let alice = principal.get().unwrap();
//! assert!(alice.has_authority("ROLE_ADMIN"));
//! assert_eq!(Decision::from_granted(true), Decision::Grant);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod decision;
/// Error types and results for authorization operations.
pub mod error;
pub mod invocation;
pub mod principal;
pub mod request;

pub use decision::Decision;
pub use error::{AuthzError, AuthzResult};
pub use invocation::{MethodInvocation, MethodInvocationResult, MethodRef, MethodTarget};
pub use principal::{ANONYMOUS, DeferredPrincipal, MemoizedPrincipal, Principal, PrincipalSupplier};
pub use request::{DefaultPathParser, HttpMethod, HttpRequest, PathParser, RequestPath};
