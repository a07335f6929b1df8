//! Warden Test - shared test utilities for warden crates.
//!
//! Mocks that count or record how the engine calls its collaborators, and
//! fixtures for the principals and metadata most tests need.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! warden-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use warden_test::{ForbiddenPrincipal, document_scanner};
//!
//! #[test]
//! fn test_permit_all_never_reads_principal() {
//!     let principal = ForbiddenPrincipal::new();
//!     // ... decide with &principal ...
//!     assert_eq!(principal.calls(), 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
