//! Post-merge configuration validation.
//!
//! Checks values and cross-field invariants that serde cannot express. Type
//! and annotation references are checked later, when the metadata registry
//! is built.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{AnnotationEntry, Config, SESSION_STEPS};

const HTTP_METHODS: [&str; 8] = [
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE",
];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_engine(config)?;
    validate_logging(config)?;
    validate_routes(config)?;
    validate_annotations(config)?;
    validate_sessions(config)?;
    Ok(())
}

fn validate_engine(config: &Config) -> ConfigResult<()> {
    let on_abstain = config.engine.on_abstain.as_str();
    if !matches!(on_abstain, "deny" | "grant") {
        return Err(ConfigError::invalid(
            "engine.on_abstain",
            format!("unsupported value '{on_abstain}'; expected one of: deny, grant"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    let valid_targets = ["stderr", "stdout", "file"];
    if !valid_targets.contains(&config.logging.target.as_str()) {
        return Err(ConfigError::invalid(
            "logging.target",
            format!(
                "unsupported log target '{}'; expected one of: {}",
                config.logging.target,
                valid_targets.join(", ")
            ),
        ));
    }
    if config.logging.target == "file" && config.logging.directory.is_none() {
        return Err(ConfigError::invalid(
            "logging.directory",
            "a file log target needs a directory",
        ));
    }

    let valid_rotations = ["daily", "hourly", "never"];
    if !valid_rotations.contains(&config.logging.rotation.as_str()) {
        return Err(ConfigError::invalid(
            "logging.rotation",
            format!(
                "unsupported log rotation '{}'; expected one of: {}",
                config.logging.rotation,
                valid_rotations.join(", ")
            ),
        ));
    }
    if config.logging.file_prefix.trim().is_empty() {
        return Err(ConfigError::invalid(
            "logging.file_prefix",
            "log file prefix must not be empty",
        ));
    }

    Ok(())
}

fn validate_routes(config: &Config) -> ConfigResult<()> {
    for (index, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{index}]");

        if route.pattern.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("{field}.pattern"),
                "pattern must not be empty",
            ));
        }

        if let Some(method) = &route.method
            && !HTTP_METHODS.contains(&method.to_ascii_uppercase().as_str())
        {
            return Err(ConfigError::invalid(
                format!("{field}.method"),
                format!("unknown HTTP method '{method}'"),
            ));
        }

        if route.access_rule().is_none() {
            return Err(ConfigError::invalid(
                field,
                "set exactly one of: access (permit_all, deny_all, authenticated), \
                 authorities, expression",
            ));
        }

        if let Some(expression) = &route.expression {
            check_length(config, &format!("routes[{index}].expression"), expression)?;
        }
    }
    Ok(())
}

fn validate_annotations(config: &Config) -> ConfigResult<()> {
    for (name, composed) in &config.annotations {
        for (index, entry) in composed.uses.iter().enumerate() {
            check_entry(config, &format!("annotations.{name}.uses[{index}]"), entry)?;
        }
    }

    for (type_name, section) in &config.types {
        let field = format!("types.{type_name}");
        if !matches!(section.kind.as_str(), "class" | "interface") {
            return Err(ConfigError::invalid(
                format!("{field}.kind"),
                format!("unsupported kind '{}'; expected class or interface", section.kind),
            ));
        }
        for (index, entry) in section.annotations.iter().enumerate() {
            check_entry(config, &format!("{field}.annotations[{index}]"), entry)?;
        }
        for (method, method_section) in &section.methods {
            for (index, entry) in method_section.annotations.iter().enumerate() {
                check_entry(
                    config,
                    &format!("{field}.methods.{method}.annotations[{index}]"),
                    entry,
                )?;
            }
        }
    }
    Ok(())
}

fn check_entry(config: &Config, field: &str, entry: &AnnotationEntry) -> ConfigResult<()> {
    if entry.form().is_none() {
        return Err(ConfigError::invalid(
            field,
            "set exactly one of: pre_authorize, post_authorize, pre_filter, post_filter, compose",
        ));
    }
    for expression in entry.expressions() {
        check_length(config, field, expression)?;
    }
    Ok(())
}

fn check_length(config: &Config, field: &str, expression: &str) -> ConfigResult<()> {
    let max = config.engine.max_expression_length;
    if max > 0 && expression.len() > max {
        return Err(ConfigError::invalid(
            field,
            format!(
                "expression is {} bytes, exceeding engine.max_expression_length ({max})",
                expression.len()
            ),
        ));
    }
    Ok(())
}

fn validate_sessions(config: &Config) -> ConfigResult<()> {
    let mut last: Option<usize> = None;
    for step in &config.sessions.chain {
        let Some(position) = SESSION_STEPS.iter().position(|s| *s == step.as_str()) else {
            return Err(ConfigError::invalid(
                "sessions.chain",
                format!(
                    "unknown session step '{step}'; expected any of: {}",
                    SESSION_STEPS.join(", ")
                ),
            ));
        };
        if last.is_some_and(|previous| position <= previous) {
            return Err(ConfigError::invalid(
                "sessions.chain",
                format!(
                    "step '{step}' is out of order or repeated; steps run in the order: {}",
                    SESSION_STEPS.join(", ")
                ),
            ));
        }
        last = Some(position);
    }
    Ok(())
}
