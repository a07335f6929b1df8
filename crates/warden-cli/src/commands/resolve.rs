//! `warden resolve`: show which policy governs a method.

use anyhow::Result;
use std::sync::Arc;
use warden_config::Config;
use warden_core::MethodRef;
use warden_policy::{PolicyAttribute, PolicyKind};

use crate::config_bridge::{to_expression_engine, to_method_interceptor};
use crate::theme::Theme;

/// Print the resolved attribute of `kind` for `declaring_type.method` as
/// invoked on `target_type`.
pub(crate) fn run_resolve(
    cfg: &Config,
    declaring_type: &str,
    method: &str,
    target_type: Option<&str>,
    kind: PolicyKind,
) -> Result<()> {
    let target = target_type.unwrap_or(declaring_type);
    let method = MethodRef::new(declaring_type, method);

    println!("{}", Theme::header(&format!("{method} on {target}")));
    match resolve(cfg, &method, target, kind)? {
        Some(attribute) => {
            println!("  {:<15} {}", "kind:", attribute.kind);
            println!("  {:<15} {}", "expression:", attribute.expression.source());
            if let Some(filter_target) = &attribute.filter_target {
                println!("  {:<15} {filter_target}", "filter target:");
            }
            if let Some(handler) = &attribute.deny_handler {
                println!("  {:<15} {handler}", "deny handler:");
            }
        },
        None => println!("{}", Theme::info(&format!("no {kind} policy applies"))),
    }
    Ok(())
}

fn resolve(
    cfg: &Config,
    method: &MethodRef,
    target_type: &str,
    kind: PolicyKind,
) -> Result<Option<Arc<PolicyAttribute>>> {
    let engine = Arc::new(to_expression_engine(cfg));
    let interceptor = to_method_interceptor(cfg, &engine)?;
    Ok(interceptor.unit(kind).resolver().resolve(method, target_type)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [annotations.IsAdmin]
        uses = [{ pre_authorize = "'ROLE_ADMIN' in principal.authorities" }]

        [types.Base]
        [types.Base.methods.purge]
        annotations = [{ compose = "IsAdmin" }]
        [types.Base.methods.list]
        annotations = [{ post_filter = "filterObject.public", filter_target = "docs" }]

        [types.Derived]
        superclass = "Base"
    "#;

    #[test]
    fn test_resolve_inherited_composed() {
        let cfg = Config::from_toml(CONFIG).unwrap();
        let attribute = resolve(
            &cfg,
            &MethodRef::new("Base", "purge"),
            "Derived",
            PolicyKind::PreAuthorize,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            attribute.expression.source(),
            "'ROLE_ADMIN' in principal.authorities"
        );
    }

    #[test]
    fn test_resolve_filter_target() {
        let cfg = Config::from_toml(CONFIG).unwrap();
        let attribute = resolve(&cfg, &MethodRef::new("Base", "list"), "Base", PolicyKind::PostFilter)
            .unwrap()
            .unwrap();
        assert_eq!(attribute.filter_target.as_deref(), Some("docs"));
    }

    #[test]
    fn test_resolve_none() {
        let cfg = Config::from_toml(CONFIG).unwrap();
        let found = resolve(&cfg, &MethodRef::new("Base", "list"), "Base", PolicyKind::PreAuthorize)
            .unwrap();
        assert!(found.is_none());
    }
}
