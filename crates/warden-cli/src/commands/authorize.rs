//! `warden authorize`: the pre-authorize decision for a method call.

use anyhow::Result;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use warden_config::Config;
use warden_core::{Decision, MethodInvocation, MethodRef, Principal};
use warden_telemetry::{RequestContext, RequestGuard};

use crate::config_bridge::{to_expression_engine, to_method_interceptor};
use crate::theme::Theme;

/// A method call described on the command line.
pub(crate) struct CallSpec<'a> {
    pub(crate) declaring_type: &'a str,
    pub(crate) method: &'a str,
    pub(crate) target_type: Option<&'a str>,
    pub(crate) arguments: Vec<(String, JsonValue)>,
}

impl CallSpec<'_> {
    fn invocation(&self) -> MethodInvocation {
        let mut invocation = MethodInvocation::new(MethodRef::new(self.declaring_type, self.method));
        if let Some(target) = self.target_type {
            invocation = invocation.with_target_type(target);
        }
        for (name, value) in &self.arguments {
            invocation = invocation.with_argument(name.clone(), value.clone());
        }
        invocation
    }
}

/// Decide whether `principal` may make the call. An abstain means the method
/// has no pre-authorize policy and is reported as allowed.
pub(crate) fn run_authorize(cfg: &Config, call: &CallSpec<'_>, principal: Arc<Principal>) -> Result<bool> {
    let decision = decide(cfg, call, principal.clone())?;
    println!(
        "{} {}.{} for {}",
        Theme::decision(decision),
        call.declaring_type,
        call.method,
        principal.name
    );
    if decision.is_abstain() {
        println!("{}", Theme::dimmed("no pre-authorize policy applies; the call is unguarded"));
    }
    Ok(!decision.is_denied())
}

fn decide(cfg: &Config, call: &CallSpec<'_>, principal: Arc<Principal>) -> Result<Decision> {
    let engine = Arc::new(to_expression_engine(cfg));
    let interceptor = to_method_interceptor(cfg, &engine)?;
    let invocation = call.invocation();

    let guard = RequestGuard::new(
        RequestContext::new("authorize")
            .with_subject(invocation.method.to_string())
            .with_principal(principal.name.clone()),
    );
    let decision = interceptor.authorize(&principal, &invocation)?;
    guard.record_decision(decision);
    Ok(decision)
}
