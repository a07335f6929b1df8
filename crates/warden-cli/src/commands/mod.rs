//! CLI commands.

pub(crate) mod authorize;
pub(crate) mod check;
pub(crate) mod config;
pub(crate) mod login;
pub(crate) mod resolve;

use anyhow::{Context, Result, bail};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use warden_core::Principal;

/// Build the caller from `--principal` and `--authority` flags. Without a
/// name the caller is anonymous and may not hold authorities.
pub(crate) fn build_principal(name: Option<&str>, authorities: &[String]) -> Result<Arc<Principal>> {
    match name {
        Some(name) => Ok(Arc::new(
            Principal::authenticated(name).with_authorities(authorities.iter().cloned()),
        )),
        None if authorities.is_empty() => Ok(Arc::new(Principal::anonymous())),
        None => bail!("--authority requires --principal"),
    }
}

/// Parse a `name=value` argument. The value is read as JSON when it parses,
/// otherwise as a plain string.
pub(crate) fn parse_argument(raw: &str) -> Result<(String, JsonValue)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("argument '{raw}' must look like name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("argument '{raw}' has an empty name");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((name.to_string(), value))
}
