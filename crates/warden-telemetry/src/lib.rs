//! Warden Telemetry - logging setup and decision tracing for warden.
//!
//! This crate provides:
//! - `tracing-subscriber` setup with pretty, compact, JSON and full formats
//! - Stdout, stderr and rolling-file targets
//! - A per-decision [`RequestContext`] whose span correlates the log lines of
//!   one authorization
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_telemetry::{LogConfig, LogFormat, RequestContext, RequestGuard, setup_logging};
//!
//! # fn main() -> Result<(), warden_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("warden_policy=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("cli")
//!     .with_subject("GET /admin/users")
//!     .with_principal("alice");
//! let guard = RequestGuard::new(ctx);
//! tracing::debug!("evaluating route rules");
//! guard.record_decision("grant");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
