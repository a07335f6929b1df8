//! Shared helpers for integration tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use warden_config::{Config, ResolvedConfig};
use warden_expr::ExpressionEngine;
use warden_policy::config_bridge::to_expression_engine;

/// A home directory with `.warden/config.toml` holding `user_toml`.
#[allow(dead_code)]
pub fn home_with_user_config(user_toml: &str) -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join(".warden");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), user_toml).unwrap();
    home
}

/// Load with the full layering, isolated from the real home and environment.
#[allow(dead_code)]
pub fn load(
    home: &Path,
    explicit: Option<&Path>,
    env: &[(&str, &str)],
) -> ResolvedConfig {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    warden_config::loader::load_with_env(explicit, home, &env).unwrap()
}

/// Parse an inline config and build its expression engine.
#[allow(dead_code)]
pub fn config_and_engine(toml: &str) -> (Config, Arc<ExpressionEngine>) {
    let cfg = Config::from_toml(toml).unwrap();
    let engine = Arc::new(to_expression_engine(&cfg));
    (cfg, engine)
}
