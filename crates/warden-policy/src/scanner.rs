//! Annotation scanning over the metadata registry.
//!
//! [`UniqueAnnotationScanner`] finds the single policy annotation of a given
//! kind that governs a method:
//!
//! 1. Starting at the runtime target type, look for annotations on the
//!    method itself. A type that annotates the method ends the search along
//!    that branch; otherwise the search continues into the superclass and
//!    then each interface, in declaration order. Candidates from different
//!    branches are collected together.
//! 2. If no method-level candidate exists anywhere, the same walk is done
//!    over class-level annotations.
//! 3. Composed annotations are expanded recursively, substituting
//!    `${param}` placeholders from the values given at the use site.
//! 4. Identical candidates collapse into one. Two or more distinct
//!    candidates are an [`AuthzError::AmbiguousPolicy`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use warden_core::{AuthzError, AuthzResult, MethodRef};

use crate::metadata::{AnnotationUse, MetadataRegistry, PolicyAnnotation, PolicyKind};

/// Finds the policy annotation that governs a method.
pub trait AnnotationScanner: Send + Sync {
    /// Scan for the annotation of `kind` governing `method` when invoked on
    /// an instance of `target_type`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the declarations are ambiguous or
    /// malformed. Finding nothing is `Ok(None)`, not an error.
    fn scan(
        &self,
        method: &MethodRef,
        target_type: &str,
        kind: PolicyKind,
    ) -> AuthzResult<Option<PolicyAnnotation>>;
}

/// Scanner enforcing that at most one distinct annotation applies.
#[derive(Debug, Clone)]
pub struct UniqueAnnotationScanner {
    registry: Arc<MetadataRegistry>,
}

impl UniqueAnnotationScanner {
    /// Create a scanner over a registry.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self { registry }
    }

    /// The registry being scanned.
    #[must_use]
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    fn closest_method_annotations(
        &self,
        method: &str,
        type_name: &str,
        kind: PolicyKind,
        visited: &mut HashSet<String>,
    ) -> AuthzResult<Vec<PolicyAnnotation>> {
        if !visited.insert(type_name.to_string()) {
            return Ok(Vec::new());
        }
        let Some(metadata) = self.registry.get_type(type_name) else {
            return Ok(Vec::new());
        };

        if let Some(uses) = metadata.method_annotations(method) {
            let found = self.expand_uses(uses, kind)?;
            if !found.is_empty() {
                trace!(type_name, method, count = found.len(), "method-level candidates");
                return Ok(found);
            }
        }

        let mut collected = Vec::new();
        for supertype in metadata.supertypes() {
            collected.extend(self.closest_method_annotations(method, supertype, kind, visited)?);
        }
        Ok(collected)
    }

    fn closest_class_annotations(
        &self,
        type_name: &str,
        kind: PolicyKind,
        visited: &mut HashSet<String>,
    ) -> AuthzResult<Vec<PolicyAnnotation>> {
        if !visited.insert(type_name.to_string()) {
            return Ok(Vec::new());
        }
        let Some(metadata) = self.registry.get_type(type_name) else {
            return Ok(Vec::new());
        };

        let found = self.expand_uses(&metadata.annotations, kind)?;
        if !found.is_empty() {
            trace!(type_name, count = found.len(), "class-level candidates");
            return Ok(found);
        }

        let mut collected = Vec::new();
        for supertype in metadata.supertypes() {
            collected.extend(self.closest_class_annotations(supertype, kind, visited)?);
        }
        Ok(collected)
    }

    fn expand_uses(
        &self,
        uses: &[AnnotationUse],
        kind: PolicyKind,
    ) -> AuthzResult<Vec<PolicyAnnotation>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.expand(uses, kind, &BTreeMap::new(), &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand(
        &self,
        uses: &[AnnotationUse],
        kind: PolicyKind,
        params: &BTreeMap<String, String>,
        stack: &mut Vec<String>,
        out: &mut Vec<PolicyAnnotation>,
    ) -> AuthzResult<()> {
        for annotation in uses {
            match annotation {
                AnnotationUse::Policy(policy) => {
                    if policy.kind == kind {
                        out.push(substitute_annotation(policy, params)?);
                    }
                },
                AnnotationUse::Composed {
                    name,
                    params: use_params,
                } => {
                    if stack.contains(name) {
                        return Err(AuthzError::configuration(format!(
                            "composed annotation cycle: {} -> {name}",
                            stack.join(" -> ")
                        )));
                    }
                    let composed = self.registry.get_annotation(name).ok_or_else(|| {
                        AuthzError::configuration(format!("unknown composed annotation '{name}'"))
                    })?;

                    // Use-site values may themselves refer to the enclosing
                    // annotation's parameters.
                    let mut resolved = BTreeMap::new();
                    for (key, value) in use_params {
                        resolved.insert(key.clone(), substitute(value, params)?);
                    }

                    stack.push(name.clone());
                    self.expand(&composed.uses, kind, &resolved, stack, out)?;
                    stack.pop();
                },
            }
        }
        Ok(())
    }
}

impl AnnotationScanner for UniqueAnnotationScanner {
    fn scan(
        &self,
        method: &MethodRef,
        target_type: &str,
        kind: PolicyKind,
    ) -> AuthzResult<Option<PolicyAnnotation>> {
        let start = if self.registry.get_type(target_type).is_some() {
            target_type
        } else {
            method.declaring_type.as_str()
        };

        let mut visited = HashSet::new();
        let mut candidates =
            self.closest_method_annotations(&method.name, start, kind, &mut visited)?;
        if candidates.is_empty() && !visited.contains(&method.declaring_type) {
            candidates = self.closest_method_annotations(
                &method.name,
                &method.declaring_type,
                kind,
                &mut visited,
            )?;
        }
        if !candidates.is_empty() {
            return require_unique(format!("{start}.{}", method.name), candidates);
        }

        let mut visited = HashSet::new();
        let mut candidates = self.closest_class_annotations(start, kind, &mut visited)?;
        if candidates.is_empty() && !visited.contains(&method.declaring_type) {
            candidates =
                self.closest_class_annotations(&method.declaring_type, kind, &mut visited)?;
        }
        require_unique(start.to_string(), candidates)
    }
}

impl fmt::Display for UniqueAnnotationScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueAnnotationScanner({} types)", self.registry.type_count())
    }
}

fn require_unique(
    element: String,
    candidates: Vec<PolicyAnnotation>,
) -> AuthzResult<Option<PolicyAnnotation>> {
    let mut distinct: Vec<PolicyAnnotation> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !distinct.contains(&candidate) {
            distinct.push(candidate);
        }
    }
    if distinct.len() > 1 {
        return Err(AuthzError::AmbiguousPolicy {
            element,
            candidates: distinct.iter().map(ToString::to_string).collect(),
        });
    }
    Ok(distinct.pop())
}

fn substitute_annotation(
    annotation: &PolicyAnnotation,
    params: &BTreeMap<String, String>,
) -> AuthzResult<PolicyAnnotation> {
    Ok(PolicyAnnotation {
        kind: annotation.kind,
        value: substitute(&annotation.value, params)?,
        filter_target: annotation
            .filter_target
            .as_deref()
            .map(|t| substitute(t, params))
            .transpose()?,
        deny_handler: annotation.deny_handler.clone(),
    })
}

/// Replace every `${name}` in `template` with its value from `params`.
fn substitute(template: &str, params: &BTreeMap<String, String>) -> AuthzResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start.saturating_add(2)..];
        let Some(end) = after.find('}') else {
            return Err(AuthzError::configuration(format!(
                "unterminated placeholder in '{template}'"
            )));
        };
        let key = &after[..end];
        let value = params.get(key).ok_or_else(|| {
            AuthzError::configuration(format!(
                "unresolved placeholder '${{{key}}}' in '{template}'"
            ))
        })?;
        out.push_str(value);
        rest = &after[end.saturating_add(1)..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ComposedAnnotation, TypeMetadata};

    fn scanner(registry: MetadataRegistry) -> UniqueAnnotationScanner {
        UniqueAnnotationScanner::new(Arc::new(registry))
    }

    fn pre(value: &str) -> PolicyAnnotation {
        PolicyAnnotation::pre_authorize(value)
    }

    #[test]
    fn test_substitute() {
        let params = BTreeMap::from([("role".to_string(), "ADMIN".to_string())]);
        assert_eq!(
            substitute("'ROLE_${role}' in principal.authorities", &params).unwrap(),
            "'ROLE_ADMIN' in principal.authorities"
        );
        assert_eq!(substitute("no placeholders", &params).unwrap(), "no placeholders");
        assert!(substitute("${missing}", &params).unwrap_err().is_configuration_error());
        assert!(substitute("${role", &params).is_err());
    }

    #[test]
    fn test_unannotated_method_is_none() {
        let scanner = scanner(MetadataRegistry::new().with_type(TypeMetadata::class("Svc").declares("list")));
        let found = scanner
            .scan(&MethodRef::new("Svc", "list"), "Svc", PolicyKind::PreAuthorize)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_unregistered_types_are_none() {
        let scanner = scanner(MetadataRegistry::new());
        let found = scanner
            .scan(&MethodRef::new("Ghost", "run"), "Ghost", PolicyKind::PreAuthorize)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_only_requested_kind_is_returned() {
        let scanner = scanner(MetadataRegistry::new().with_type(
            TypeMetadata::class("Svc")
                .method("read", pre("true"))
                .method("read", PolicyAnnotation::post_filter("filterObject.public")),
        ));
        let method = MethodRef::new("Svc", "read");
        assert_eq!(
            scanner.scan(&method, "Svc", PolicyKind::PreAuthorize).unwrap(),
            Some(pre("true"))
        );
        assert_eq!(
            scanner
                .scan(&method, "Svc", PolicyKind::PostFilter)
                .unwrap()
                .map(|a| a.value),
            Some("filterObject.public".to_string())
        );
        assert!(scanner.scan(&method, "Svc", PolicyKind::PreFilter).unwrap().is_none());
    }

    #[test]
    fn test_most_derived_declaration_wins() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_type(TypeMetadata::interface("Api").method("read", pre("false")))
                .with_type(
                    TypeMetadata::class("Impl")
                        .implements("Api")
                        .method("read", pre("true")),
                ),
        );
        let found = scanner
            .scan(&MethodRef::new("Api", "read"), "Impl", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("true")));
    }

    #[test]
    fn test_interface_annotation_is_inherited() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_type(TypeMetadata::interface("Api").method("read", pre("true")))
                .with_type(TypeMetadata::class("Impl").implements("Api").declares("read")),
        );
        let found = scanner
            .scan(&MethodRef::new("Api", "read"), "Impl", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("true")));
    }

    #[test]
    fn test_unregistered_target_falls_back_to_declaring_type() {
        let scanner = scanner(
            MetadataRegistry::new().with_type(TypeMetadata::interface("Api").method("read", pre("true"))),
        );
        let found = scanner
            .scan(&MethodRef::new("Api", "read"), "ProxyImpl$1", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("true")));
    }

    #[test]
    fn test_conflicting_branches_are_ambiguous() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_type(TypeMetadata::class("Base").method("read", pre("a")))
                .with_type(TypeMetadata::interface("Api").method("read", pre("b")))
                .with_type(TypeMetadata::class("Impl").extends("Base").implements("Api")),
        );
        let err = scanner
            .scan(&MethodRef::new("Api", "read"), "Impl", PolicyKind::PreAuthorize)
            .unwrap_err();
        assert!(matches!(err, AuthzError::AmbiguousPolicy { ref candidates, .. } if candidates.len() == 2));
    }

    #[test]
    fn test_identical_candidates_collapse() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_annotation(ComposedAnnotation::new("Open", vec![pre("true").into()]))
                .with_type(
                    TypeMetadata::class("Svc")
                        .method("read", pre("true"))
                        .method("read", AnnotationUse::composed("Open")),
                ),
        );
        let found = scanner
            .scan(&MethodRef::new("Svc", "read"), "Svc", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("true")));
    }

    #[test]
    fn test_direct_and_composed_conflict() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_annotation(ComposedAnnotation::new("IsAdmin", vec![pre("'ROLE_ADMIN' in principal.authorities").into()]))
                .with_annotation(ComposedAnnotation::new("IsUser", vec![pre("'ROLE_USER' in principal.authorities").into()]))
                .with_type(
                    TypeMetadata::class("Svc")
                        .method("read", AnnotationUse::composed("IsAdmin"))
                        .method("read", AnnotationUse::composed("IsUser")),
                ),
        );
        let err = scanner
            .scan(&MethodRef::new("Svc", "read"), "Svc", PolicyKind::PreAuthorize)
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("Svc.read"));
    }

    #[test]
    fn test_class_level_fallback() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_type(TypeMetadata::class("Base").annotated(pre("principal.authenticated")))
                .with_type(
                    TypeMetadata::class("Svc")
                        .extends("Base")
                        .declares("list")
                        .method("open", PolicyAnnotation::post_authorize("true")),
                ),
        );
        let found = scanner
            .scan(&MethodRef::new("Svc", "list"), "Svc", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("principal.authenticated")));
    }

    #[test]
    fn test_method_level_beats_class_level() {
        let scanner = scanner(MetadataRegistry::new().with_type(
            TypeMetadata::class("Svc")
                .annotated(pre("false"))
                .method("read", pre("true")),
        ));
        let found = scanner
            .scan(&MethodRef::new("Svc", "read"), "Svc", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("true")));
    }

    #[test]
    fn test_templated_composition() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_annotation(ComposedAnnotation::new(
                    "HasRole",
                    vec![pre("'ROLE_${role}' in principal.authorities").into()],
                ))
                .with_annotation(ComposedAnnotation::new(
                    "IsAdmin",
                    vec![AnnotationUse::composed("HasRole").with_param("role", "${level}")],
                ))
                .with_type(TypeMetadata::class("Svc").method(
                    "purge",
                    AnnotationUse::composed("IsAdmin").with_param("level", "ADMIN"),
                )),
        );
        let found = scanner
            .scan(&MethodRef::new("Svc", "purge"), "Svc", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("'ROLE_ADMIN' in principal.authorities")));
    }

    #[test]
    fn test_composition_errors() {
        let cyclic = scanner(
            MetadataRegistry::new()
                .with_annotation(ComposedAnnotation::new("A", vec![AnnotationUse::composed("B")]))
                .with_annotation(ComposedAnnotation::new("B", vec![AnnotationUse::composed("A")]))
                .with_type(TypeMetadata::class("Svc").method("run", AnnotationUse::composed("A"))),
        );
        let err = cyclic
            .scan(&MethodRef::new("Svc", "run"), "Svc", PolicyKind::PreAuthorize)
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let unknown = scanner(
            MetadataRegistry::new()
                .with_type(TypeMetadata::class("Svc").method("run", AnnotationUse::composed("Nope"))),
        );
        assert!(
            unknown
                .scan(&MethodRef::new("Svc", "run"), "Svc", PolicyKind::PreAuthorize)
                .unwrap_err()
                .is_configuration_error()
        );

        let unresolved = scanner(
            MetadataRegistry::new()
                .with_annotation(ComposedAnnotation::new("HasRole", vec![pre("'${role}' in principal.authorities").into()]))
                .with_type(TypeMetadata::class("Svc").method("run", AnnotationUse::composed("HasRole"))),
        );
        assert!(
            unresolved
                .scan(&MethodRef::new("Svc", "run"), "Svc", PolicyKind::PreAuthorize)
                .unwrap_err()
                .is_configuration_error()
        );
    }

    #[test]
    fn test_diamond_is_visited_once() {
        let scanner = scanner(
            MetadataRegistry::new()
                .with_type(TypeMetadata::interface("Root").method("read", pre("true")))
                .with_type(TypeMetadata::interface("Left").implements("Root"))
                .with_type(TypeMetadata::interface("Right").implements("Root"))
                .with_type(TypeMetadata::class("Impl").implements("Left").implements("Right")),
        );
        let found = scanner
            .scan(&MethodRef::new("Root", "read"), "Impl", PolicyKind::PreAuthorize)
            .unwrap();
        assert_eq!(found, Some(pre("true")));
    }
}
