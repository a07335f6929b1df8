//! Configuration errors.

use std::io;
use thiserror::Error;

/// Errors raised while loading or validating the warden configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read config file {path}: {source}")]
    ReadError {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A config file is larger than the loader accepts.
    #[error("config file {path} is {size} bytes, over the {max} byte limit")]
    FileTooLarge {
        /// Path of the file.
        path: String,
        /// Actual size in bytes.
        size: usize,
        /// Accepted maximum in bytes.
        max: u64,
    },

    /// A config document is not valid TOML or does not fit the schema.
    #[error("cannot parse config from {path}: {source}")]
    ParseError {
        /// Path of the file, or a label for inline documents.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The merged configuration breaks a rule, e.g. a route with two access
    /// rules or a session chain out of order.
    #[error("invalid {field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// No home directory to look for the user config in.
    #[error("could not determine home directory")]
    NoHomeDir,
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
