//! Warden Session - Fail-fast session preparation after authentication.
//!
//! After a principal authenticates, an ordered chain of
//! [`SessionAuthenticationStrategy`] steps prepares the session. Unlike
//! decision units these steps have side effects and reject by returning an
//! error; the first error aborts the chain.
//!
//! This crate provides:
//! - [`CompositeSessionStrategy`]: the sequential, fail-fast chain
//! - [`ConcurrentSessionControl`], [`SessionFixationProtection`],
//!   [`RegisterSession`]: the standard steps, in the order they must run
//! - [`SessionRegistry`] with the [`InMemorySessionRegistry`] implementation

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod config_bridge;
pub mod error;
pub mod exchange;
pub mod registry;
pub mod steps;
pub mod strategy;

pub use error::{SessionError, SessionResult};
pub use exchange::SessionExchange;
pub use registry::{InMemorySessionRegistry, SessionInformation, SessionRegistry};
pub use steps::{ConcurrentSessionControl, RegisterSession, SessionFixationProtection};
pub use strategy::{CompositeSessionStrategy, SessionAuthenticationStrategy};
