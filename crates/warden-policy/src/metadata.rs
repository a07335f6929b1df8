//! Ahead-of-time policy metadata.
//!
//! Policies are declared against types and methods in a [`MetadataRegistry`]
//! instead of being discovered at runtime. The registry models the pieces of
//! a type system that policy resolution cares about: single inheritance,
//! interface implementation, class-level and method-level annotations, and
//! composed annotations that expand into other annotations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use warden_core::{AuthzError, AuthzResult};

/// The kind of policy an annotation declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Checked before the method runs.
    PreAuthorize,
    /// Checked against the returned value.
    PostAuthorize,
    /// Filters a collection argument before the method runs.
    PreFilter,
    /// Filters the returned collection.
    PostFilter,
}

impl PolicyKind {
    /// All kinds, in interception order.
    pub const ALL: [Self; 4] = [
        Self::PreFilter,
        Self::PreAuthorize,
        Self::PostAuthorize,
        Self::PostFilter,
    ];

    /// The configuration key for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreAuthorize => "pre_authorize",
            Self::PostAuthorize => "post_authorize",
            Self::PreFilter => "pre_filter",
            Self::PostFilter => "post_filter",
        }
    }

    /// Whether policies of this kind filter collections rather than decide.
    #[must_use]
    pub fn is_filter(self) -> bool {
        matches!(self, Self::PreFilter | Self::PostFilter)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_authorize" | "pre-authorize" => Ok(Self::PreAuthorize),
            "post_authorize" | "post-authorize" => Ok(Self::PostAuthorize),
            "pre_filter" | "pre-filter" => Ok(Self::PreFilter),
            "post_filter" | "post-filter" => Ok(Self::PostFilter),
            other => Err(AuthzError::configuration(format!(
                "unknown policy kind '{other}'"
            ))),
        }
    }
}

/// A single policy annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyAnnotation {
    /// What the annotation governs.
    pub kind: PolicyKind,
    /// The policy expression source.
    pub value: String,
    /// For filters: the name of the argument to filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_target: Option<String>,
    /// For authorization policies: the deny handler to run instead of
    /// rejecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_handler: Option<String>,
}

impl PolicyAnnotation {
    /// Create an annotation of the given kind.
    #[must_use]
    pub fn new(kind: PolicyKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            filter_target: None,
            deny_handler: None,
        }
    }

    /// `pre_authorize` annotation.
    #[must_use]
    pub fn pre_authorize(value: impl Into<String>) -> Self {
        Self::new(PolicyKind::PreAuthorize, value)
    }

    /// `post_authorize` annotation.
    #[must_use]
    pub fn post_authorize(value: impl Into<String>) -> Self {
        Self::new(PolicyKind::PostAuthorize, value)
    }

    /// `pre_filter` annotation.
    #[must_use]
    pub fn pre_filter(value: impl Into<String>) -> Self {
        Self::new(PolicyKind::PreFilter, value)
    }

    /// `post_filter` annotation.
    #[must_use]
    pub fn post_filter(value: impl Into<String>) -> Self {
        Self::new(PolicyKind::PostFilter, value)
    }

    /// Name the argument a pre-filter applies to.
    #[must_use]
    pub fn with_filter_target(mut self, target: impl Into<String>) -> Self {
        self.filter_target = Some(target.into());
        self
    }

    /// Name the deny handler for an authorization policy.
    #[must_use]
    pub fn with_deny_handler(mut self, handler: impl Into<String>) -> Self {
        self.deny_handler = Some(handler.into());
        self
    }
}

impl fmt::Display for PolicyAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?}", self.kind, self.value)?;
        if let Some(target) = &self.filter_target {
            write!(f, ", filter_target = {target:?}")?;
        }
        if let Some(handler) = &self.deny_handler {
            write!(f, ", deny_handler = {handler:?}")?;
        }
        f.write_str(")")
    }
}

/// An annotation as written on a type or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationUse {
    /// A policy annotation used directly.
    Policy(PolicyAnnotation),
    /// A composed annotation, with values for its `${param}` placeholders.
    Composed {
        /// Name of the composed annotation.
        name: String,
        /// Placeholder values.
        params: BTreeMap<String, String>,
    },
}

impl AnnotationUse {
    /// A use of a composed annotation without parameters.
    #[must_use]
    pub fn composed(name: impl Into<String>) -> Self {
        Self::Composed {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a placeholder value. No effect on direct policy uses.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Composed { params, .. } = &mut self {
            params.insert(key.into(), value.into());
        }
        self
    }
}

impl From<PolicyAnnotation> for AnnotationUse {
    fn from(annotation: PolicyAnnotation) -> Self {
        Self::Policy(annotation)
    }
}

/// A named annotation that stands for a list of other annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedAnnotation {
    /// The name used to reference it.
    pub name: String,
    /// What it expands into. Values may contain `${param}` placeholders.
    pub uses: Vec<AnnotationUse>,
}

impl ComposedAnnotation {
    /// Create a composed annotation.
    #[must_use]
    pub fn new(name: impl Into<String>, uses: Vec<AnnotationUse>) -> Self {
        Self {
            name: name.into(),
            uses,
        }
    }
}

/// Whether a type is a class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// A concrete or abstract class.
    #[default]
    Class,
    /// An interface.
    Interface,
}

/// Policy-relevant metadata for one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    /// Type name.
    pub name: String,
    /// Class or interface.
    pub kind: TypeKind,
    /// Superclass, for classes.
    pub superclass: Option<String>,
    /// Implemented (or, for interfaces, extended) interfaces, in
    /// declaration order.
    pub interfaces: Vec<String>,
    /// Class-level annotations.
    pub annotations: Vec<AnnotationUse>,
    /// Declared methods and their annotations.
    pub methods: BTreeMap<String, Vec<AnnotationUse>>,
}

impl TypeMetadata {
    /// A class with no supertypes and no annotations.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    /// An interface with no supertypes and no annotations.
    #[must_use]
    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            methods: BTreeMap::new(),
        }
    }

    /// Set the superclass.
    #[must_use]
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Add an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Add a class-level annotation.
    #[must_use]
    pub fn annotated(mut self, annotation: impl Into<AnnotationUse>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Declare a method without annotations.
    #[must_use]
    pub fn declares(mut self, method: impl Into<String>) -> Self {
        self.methods.entry(method.into()).or_default();
        self
    }

    /// Declare a method with an annotation. Can be repeated for the same
    /// method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>, annotation: impl Into<AnnotationUse>) -> Self {
        self.methods
            .entry(method.into())
            .or_default()
            .push(annotation.into());
        self
    }

    /// Annotations on a declared method, or `None` if the type does not
    /// declare it.
    #[must_use]
    pub fn method_annotations(&self, method: &str) -> Option<&[AnnotationUse]> {
        self.methods.get(method).map(Vec::as_slice)
    }

    /// Direct supertypes: superclass first, then interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }
}

/// Registry of type metadata and composed annotations.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    types: HashMap<String, TypeMetadata>,
    annotations: HashMap<String, ComposedAnnotation>,
}

impl MetadataRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous entry with the same name.
    #[must_use]
    pub fn with_type(mut self, metadata: TypeMetadata) -> Self {
        self.register_type(metadata);
        self
    }

    /// Register a composed annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: ComposedAnnotation) -> Self {
        self.register_annotation(annotation);
        self
    }

    /// Register a type in place.
    pub fn register_type(&mut self, metadata: TypeMetadata) {
        self.types.insert(metadata.name.clone(), metadata);
    }

    /// Register a composed annotation in place.
    pub fn register_annotation(&mut self, annotation: ComposedAnnotation) {
        self.annotations.insert(annotation.name.clone(), annotation);
    }

    /// Look up a type.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&TypeMetadata> {
        self.types.get(name)
    }

    /// Look up a composed annotation.
    #[must_use]
    pub fn get_annotation(&self, name: &str) -> Option<&ComposedAnnotation> {
        self.annotations.get(name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Registered type names, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that every referenced supertype and composed annotation exists.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] naming the first dangling
    /// reference found (types are checked in name order).
    pub fn validate(&self) -> AuthzResult<()> {
        for name in self.type_names() {
            let Some(metadata) = self.types.get(name) else {
                continue;
            };
            for supertype in metadata.supertypes() {
                if !self.types.contains_key(supertype) {
                    return Err(AuthzError::configuration(format!(
                        "type '{name}' references unknown supertype '{supertype}'"
                    )));
                }
            }
            if let Some(superclass) = &metadata.superclass
                && self
                    .types
                    .get(superclass)
                    .is_some_and(|s| s.kind == TypeKind::Interface)
            {
                return Err(AuthzError::configuration(format!(
                    "type '{name}' extends interface '{superclass}'; list it under interfaces"
                )));
            }
            let uses = metadata
                .annotations
                .iter()
                .chain(metadata.methods.values().flatten());
            for annotation in uses {
                self.check_composed_reference(name, annotation)?;
            }
        }
        for composed in self.annotations.values() {
            for annotation in &composed.uses {
                self.check_composed_reference(&composed.name, annotation)?;
            }
        }
        Ok(())
    }

    fn check_composed_reference(&self, owner: &str, annotation: &AnnotationUse) -> AuthzResult<()> {
        if let AnnotationUse::Composed { name, .. } = annotation
            && !self.annotations.contains_key(name)
        {
            return Err(AuthzError::configuration(format!(
                "'{owner}' uses unknown composed annotation '{name}'"
            )));
        }
        Ok(())
    }
}
