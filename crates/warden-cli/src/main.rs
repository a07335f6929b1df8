//! Warden CLI - inspect and exercise authorization policies.
//!
//! Every command loads the layered configuration (embedded defaults, user
//! file, `--config`, `WARDEN_*` environment overrides), builds the engine
//! from it and answers one question.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod commands;
pub mod config_bridge;
mod theme;

use commands::{authorize, build_principal, check, config, login, parse_argument, resolve};
use warden_config::{Config, ConfigResult, ResolvedConfig};
use warden_core::HttpMethod;
use warden_policy::PolicyKind;

/// Warden - authorization decision engine
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a configuration file, layered over the user config
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a principal may reach a path under the configured routes
    Check {
        /// Request path, e.g. /admin/users
        path: String,

        /// HTTP method
        #[arg(short, long, default_value = "GET", value_parser = parse_method)]
        method: HttpMethod,

        /// Application context path stripped before matching
        #[arg(long, default_value = "")]
        context_path: String,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Decide the pre-authorize policy of a method call
    Authorize {
        /// Declaring type of the method
        type_name: String,

        /// Method name
        method: String,

        /// Runtime type the call is dispatched on (defaults to the declaring type)
        #[arg(short, long)]
        target: Option<String>,

        /// Call argument as name=value; the value is parsed as JSON when possible
        #[arg(short, long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Show the policy that governs a method
    Resolve {
        /// Declaring type of the method
        type_name: String,

        /// Method name
        method: String,

        /// Runtime type the call is dispatched on (defaults to the declaring type)
        #[arg(short, long)]
        target: Option<String>,

        /// Policy kind: pre_authorize, post_authorize, pre_filter, post_filter
        #[arg(short, long, default_value = "pre_authorize", value_parser = parse_kind)]
        kind: PolicyKind,
    },

    /// Simulate a login through the configured session chain
    Login {
        /// Principal name
        principal: String,

        /// Session id the client arrives with
        #[arg(short, long)]
        session: Option<String>,

        /// Sessions the principal already holds, oldest first
        #[arg(long, value_name = "ID")]
        existing: Vec<String>,
    },

    /// View and validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Who is asking.
#[derive(clap::Args)]
struct CallerArgs {
    /// Principal name; omit for an anonymous caller
    #[arg(short, long)]
    principal: Option<String>,

    /// Granted authority (repeatable)
    #[arg(long = "authority", value_name = "AUTHORITY")]
    authorities: Vec<String>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration with source annotations
    Show {
        /// Output format: toml or json
        #[arg(short, long, default_value = "toml")]
        format: String,

        /// Only show one section
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the configuration
    Validate,
}

fn parse_method(raw: &str) -> Result<HttpMethod, String> {
    raw.parse().map_err(|e: warden_core::AuthzError| e.to_string())
}

fn parse_kind(raw: &str) -> Result<PolicyKind, String> {
    raw.parse().map_err(|e: warden_core::AuthzError| e.to_string())
}

fn setup_logging(loaded: &ConfigResult<ResolvedConfig>, verbose: bool) {
    let mut log_config = match loaded {
        Ok(resolved) => config_bridge::to_log_config(&resolved.config),
        Err(_) => warden_telemetry::LogConfig::new("warn"),
    };
    if verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = warden_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn exit_code(allowed: bool) -> ExitCode {
    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let loaded = Config::load(cli.config.as_deref());
    setup_logging(&loaded, cli.verbose);

    if let Commands::Config {
        command: ConfigCommands::Validate,
    } = &cli.command
    {
        return Ok(if config::validate_config(&loaded) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let resolved = loaded.context("failed to load configuration")?;
    debug!(files = ?resolved.loaded_files, "configuration loaded");
    let cfg = &resolved.config;

    match cli.command {
        Commands::Check {
            path,
            method,
            context_path,
            caller,
        } => {
            let principal = build_principal(caller.principal.as_deref(), &caller.authorities)?;
            let allowed = check::run_check(cfg, &path, method, &context_path, principal)?;
            Ok(exit_code(allowed))
        },
        Commands::Authorize {
            type_name,
            method,
            target,
            args,
            caller,
        } => {
            let principal = build_principal(caller.principal.as_deref(), &caller.authorities)?;
            let arguments = args
                .iter()
                .map(|raw| parse_argument(raw))
                .collect::<Result<Vec<_>>>()?;
            let call = authorize::CallSpec {
                declaring_type: &type_name,
                method: &method,
                target_type: target.as_deref(),
                arguments,
            };
            let allowed = authorize::run_authorize(cfg, &call, principal)?;
            Ok(exit_code(allowed))
        },
        Commands::Resolve {
            type_name,
            method,
            target,
            kind,
        } => {
            resolve::run_resolve(cfg, &type_name, &method, target.as_deref(), kind)?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Login {
            principal,
            session,
            existing,
        } => {
            let principal = warden_core::Principal::authenticated(principal);
            login::run_login(cfg, &principal, session.as_deref(), &existing)?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { format, section } => {
                config::show_config(&resolved, &format, section.as_deref())?;
                Ok(ExitCode::SUCCESS)
            },
            ConfigCommands::Validate => Ok(ExitCode::SUCCESS),
        },
    }
}
