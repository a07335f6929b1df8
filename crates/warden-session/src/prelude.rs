//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_session::prelude::*;` to import all essential types.

// Errors
pub use crate::{SessionError, SessionResult};

// Chain
pub use crate::{CompositeSessionStrategy, SessionAuthenticationStrategy, SessionExchange};

// Steps
pub use crate::{ConcurrentSessionControl, RegisterSession, SessionFixationProtection};

// Registry
pub use crate::{InMemorySessionRegistry, SessionInformation, SessionRegistry};
