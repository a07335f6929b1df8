//! Bridge from `warden_config::Config` to policy domain types.
//!
//! The config crate has no dependencies on other warden crates. This module
//! turns its sections into the expression engine, the metadata registry, the
//! request routes and the enforcement points, so the CLI and the integration
//! tests share one conversion.

use std::sync::Arc;

use tracing::debug;
use warden_config::{AnnotationEntry, AnnotationForm, Config, RouteAccess, RouteRule};
use warden_core::{AuthzError, AuthzResult, HttpMethod, HttpRequest};
use warden_expr::{ExpressionEngine, RequestContextFactory};

use crate::delegating::RequestMatcherDelegatingManager;
use crate::enforce::{AbstainPolicy, RequestEnforcer};
use crate::expression::ExpressionUnit;
use crate::interceptor::MethodSecurityInterceptor;
use crate::matcher::PathPatternMatcher;
use crate::metadata::{
    AnnotationUse, ComposedAnnotation, MetadataRegistry, PolicyAnnotation, PolicyKind, TypeKind,
    TypeMetadata,
};
use crate::privilege::{PathPatternRequestTransformer, PrivilegeEvaluator};
use crate::scanner::UniqueAnnotationScanner;
use crate::unit::{Authenticated, AuthorityUnit, DecisionUnit, DenyAll, PermitAll};

/// Convert `[engine].on_abstain` to an [`AbstainPolicy`].
///
/// # Errors
///
/// Returns a configuration error for values other than `deny`/`grant`.
pub fn to_abstain_policy(cfg: &Config) -> AuthzResult<AbstainPolicy> {
    cfg.engine.on_abstain.parse()
}

/// Build the expression engine from `[engine]`.
#[must_use]
pub fn to_expression_engine(cfg: &Config) -> ExpressionEngine {
    ExpressionEngine::new().with_max_expression_length(cfg.engine.max_expression_length)
}

/// Convert one annotation entry.
///
/// # Errors
///
/// Returns a configuration error if the entry does not set exactly one
/// policy key or `compose`.
pub fn to_annotation_use(entry: &AnnotationEntry) -> AuthzResult<AnnotationUse> {
    match entry.form() {
        Some(AnnotationForm::Composed { name }) => Ok(AnnotationUse::Composed {
            name: name.to_owned(),
            params: entry.params.clone(),
        }),
        Some(AnnotationForm::Policy { kind, value }) => {
            let kind: PolicyKind = kind.parse()?;
            let mut annotation = PolicyAnnotation::new(kind, value);
            annotation.filter_target.clone_from(&entry.filter_target);
            annotation.deny_handler.clone_from(&entry.deny_handler);
            Ok(annotation.into())
        },
        None => Err(AuthzError::configuration(
            "annotation must set exactly one of: pre_authorize, post_authorize, pre_filter, \
             post_filter, compose",
        )),
    }
}

fn to_annotation_uses(entries: &[AnnotationEntry]) -> AuthzResult<Vec<AnnotationUse>> {
    entries.iter().map(to_annotation_use).collect()
}

/// Build the metadata registry from `[types]` and `[annotations]`.
///
/// # Errors
///
/// Returns a configuration error for malformed entries, unknown type kinds,
/// or dangling type and annotation references.
pub fn to_metadata_registry(cfg: &Config) -> AuthzResult<MetadataRegistry> {
    let mut registry = MetadataRegistry::new();

    for (name, composed) in &cfg.annotations {
        registry.register_annotation(ComposedAnnotation::new(
            name.clone(),
            to_annotation_uses(&composed.uses)?,
        ));
    }

    for (name, section) in &cfg.types {
        let mut metadata = match section.kind.as_str() {
            "class" => TypeMetadata::class(name.clone()),
            "interface" => TypeMetadata::interface(name.clone()),
            other => {
                return Err(AuthzError::configuration(format!(
                    "type '{name}' has unsupported kind '{other}'"
                )));
            },
        };
        metadata.superclass.clone_from(&section.superclass);
        metadata.interfaces.clone_from(&section.interfaces);
        metadata.annotations = to_annotation_uses(&section.annotations)?;
        for (method, method_section) in &section.methods {
            metadata
                .methods
                .insert(method.clone(), to_annotation_uses(&method_section.annotations)?);
        }
        if metadata.kind == TypeKind::Interface && metadata.superclass.is_some() {
            return Err(AuthzError::configuration(format!(
                "interface '{name}' cannot have a superclass"
            )));
        }
        registry.register_type(metadata);
    }

    registry.validate()?;
    debug!(types = registry.type_count(), "built metadata registry");
    Ok(registry)
}

/// Build the decision unit for one route.
///
/// # Errors
///
/// Returns a configuration error if the route has no valid access rule, or
/// its expression does not compile.
pub fn to_route_unit(
    route: &RouteRule,
    engine: &Arc<ExpressionEngine>,
) -> AuthzResult<Arc<dyn DecisionUnit<HttpRequest>>> {
    let access = route.access_rule().ok_or_else(|| {
        AuthzError::configuration(format!(
            "route '{}' must set exactly one access rule",
            route.pattern
        ))
    })?;
    let unit: Arc<dyn DecisionUnit<HttpRequest>> = match access {
        RouteAccess::PermitAll => Arc::new(PermitAll),
        RouteAccess::DenyAll => Arc::new(DenyAll),
        RouteAccess::Authenticated => Arc::new(Authenticated),
        RouteAccess::Authorities(authorities) => {
            Arc::new(AuthorityUnit::has_any_authority(authorities.iter().cloned()))
        },
        RouteAccess::Expression(source) => Arc::new(ExpressionUnit::new(
            Arc::clone(engine),
            source,
            RequestContextFactory::default(),
        )?),
    };
    Ok(unit)
}

/// Build the delegating manager from `[[routes]]`, preserving order.
///
/// # Errors
///
/// Returns a configuration error for an empty route list or any invalid
/// route.
pub fn to_request_manager(
    cfg: &Config,
    engine: &Arc<ExpressionEngine>,
) -> AuthzResult<RequestMatcherDelegatingManager> {
    let mut builder = RequestMatcherDelegatingManager::builder();
    for route in &cfg.routes {
        let mut matcher = PathPatternMatcher::new(route.pattern.clone())?;
        if let Some(method) = &route.method {
            matcher = matcher.with_method(method.parse::<HttpMethod>()?);
        }
        builder = builder.add(Arc::new(matcher), to_route_unit(route, engine)?);
    }
    builder.build()
}

/// Build the request enforcer over the configured routes, with the
/// configured abstain policy.
///
/// # Errors
///
/// See [`to_request_manager`] and [`to_abstain_policy`].
pub fn to_request_enforcer(
    cfg: &Config,
    engine: &Arc<ExpressionEngine>,
) -> AuthzResult<RequestEnforcer> {
    let manager = to_request_manager(cfg, engine)?;
    Ok(RequestEnforcer::new(Arc::new(manager)).with_abstain_policy(to_abstain_policy(cfg)?))
}

/// Build a privilege evaluator over the configured routes. The path is
/// parsed once by the transformer and reused by every route.
///
/// # Errors
///
/// See [`to_request_manager`].
pub fn to_privilege_evaluator(
    cfg: &Config,
    engine: &Arc<ExpressionEngine>,
) -> AuthzResult<PrivilegeEvaluator> {
    let manager = to_request_manager(cfg, engine)?;
    Ok(PrivilegeEvaluator::new(Arc::new(manager))
        .with_transformer(Arc::new(PathPatternRequestTransformer::default())))
}

/// Build a method security interceptor over the configured metadata.
///
/// Deny handlers are code and are registered by the caller.
///
/// # Errors
///
/// See [`to_metadata_registry`].
pub fn to_method_interceptor(
    cfg: &Config,
    engine: &Arc<ExpressionEngine>,
) -> AuthzResult<MethodSecurityInterceptor> {
    let registry = Arc::new(to_metadata_registry(cfg)?);
    let scanner = Arc::new(UniqueAnnotationScanner::new(registry));
    Ok(MethodSecurityInterceptor::new(scanner, Arc::clone(engine)))
}
