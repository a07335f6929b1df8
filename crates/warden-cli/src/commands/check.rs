//! `warden check`: would a principal be allowed to reach a path?

use anyhow::Result;
use std::sync::Arc;
use warden_config::Config;
use warden_core::{HttpMethod, Principal};
use warden_expr::ExpressionEngine;
use warden_telemetry::{RequestContext, RequestGuard};

use crate::config_bridge::{to_expression_engine, to_privilege_evaluator};
use crate::theme::Theme;

/// Evaluate the configured routes for one path.
pub(crate) fn run_check(
    cfg: &Config,
    path: &str,
    method: HttpMethod,
    context_path: &str,
    principal: Arc<Principal>,
) -> Result<bool> {
    let allowed = evaluate(cfg, path, method, context_path, principal.clone())?;
    println!(
        "{} {} {} for {}",
        Theme::verdict(allowed),
        method,
        path,
        principal.name
    );
    Ok(allowed)
}

fn evaluate(
    cfg: &Config,
    path: &str,
    method: HttpMethod,
    context_path: &str,
    principal: Arc<Principal>,
) -> Result<bool> {
    let engine: Arc<ExpressionEngine> = Arc::new(to_expression_engine(cfg));
    let evaluator = to_privilege_evaluator(cfg, &engine)?;

    let guard = RequestGuard::new(
        RequestContext::new("check")
            .with_subject(format!("{method} {path}"))
            .with_principal(principal.name.clone()),
    );
    let allowed = evaluator.is_allowed_request(context_path, path, method, principal)?;
    guard.record_decision(if allowed { "allowed" } else { "denied" });
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_toml(
            r#"
            [[routes]]
            pattern = "/admin/**"
            authorities = ["ROLE_ADMIN"]

            [[routes]]
            pattern = "/public/**"
            access = "permit_all"

            [[routes]]
            pattern = "/**"
            access = "authenticated"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_check_routes() {
        let cfg = config();
        let admin = Arc::new(Principal::authenticated("root").with_authority("ROLE_ADMIN"));
        let alice = Arc::new(Principal::authenticated("alice"));
        let anon = Arc::new(Principal::anonymous());

        assert!(evaluate(&cfg, "/admin/users", HttpMethod::Get, "", admin).unwrap());
        assert!(!evaluate(&cfg, "/admin/users", HttpMethod::Get, "", alice.clone()).unwrap());
        assert!(evaluate(&cfg, "/public/index.html", HttpMethod::Get, "", anon.clone()).unwrap());
        assert!(!evaluate(&cfg, "/reports", HttpMethod::Post, "", anon).unwrap());
        assert!(evaluate(&cfg, "/reports", HttpMethod::Post, "", alice).unwrap());
    }

    #[test]
    fn test_check_strips_context_path() {
        let cfg = config();
        let alice = Arc::new(Principal::authenticated("alice"));
        assert!(!evaluate(&cfg, "/app/admin", HttpMethod::Get, "/app", alice).unwrap());
    }

    #[test]
    fn test_check_without_routes_is_error() {
        let alice = Arc::new(Principal::authenticated("alice"));
        assert!(evaluate(&Config::default(), "/", HttpMethod::Get, "", alice).is_err());
    }
}
