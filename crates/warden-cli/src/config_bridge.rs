//! Bridge from `warden_config::Config` to domain types.
//!
//! Policy and session conversions live next to the types they build, in
//! `warden-policy` and `warden-session`, so the integration tests can share
//! them. This module re-exports both and adds the logging conversion, which
//! only the binary needs.

pub use warden_policy::config_bridge::*;
pub use warden_session::config_bridge::*;

use warden_config::Config;
use warden_telemetry::{FileRotation, LogConfig, LogFormat, LogTarget};

/// Convert `[logging]` to a telemetry [`LogConfig`].
///
/// Values were validated at load time; an unknown format or rotation falls
/// back to the default, and a file target without a directory logs to
/// stderr.
#[must_use]
pub fn to_log_config(cfg: &Config) -> LogConfig {
    let logging = &cfg.logging;
    let format = logging.format.parse::<LogFormat>().unwrap_or_default();
    let mut log_config = LogConfig::new(logging.level.clone()).with_format(format);
    for directive in &logging.directives {
        log_config = log_config.with_directive(directive.clone());
    }
    match (logging.target.as_str(), &logging.directory) {
        ("file", Some(directory)) => {
            let rotation = logging.rotation.parse::<FileRotation>().unwrap_or_default();
            log_config.with_file_logging(directory, logging.file_prefix.clone(), rotation)
        },
        ("stdout", _) => log_config.with_target(LogTarget::Stdout),
        _ => log_config.with_target(LogTarget::Stderr),
    }
}
