//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_test::prelude::*;` to import all test utilities.

// Mocks
pub use crate::mocks::{
    CountingPathParser, CountingPrincipal, CountingScanner, ForbiddenPrincipal, RecordingStep,
    RecordingUnit, StepLog,
};

// Fixtures
pub use crate::fixtures::{
    admin, alice, bob, document_registry, document_scanner, invocation, request,
};

// Logging
pub use crate::init_test_logging;
