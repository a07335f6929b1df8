//! Configuration types for warden.
//!
//! All types in this module are self-contained with no dependencies on other
//! warden crates. Domain types (routes, metadata, session steps) are mirrored
//! here and converted at the boundary by the bridge modules in
//! `warden-policy` and `warden-session`. Every section implements
//! [`Default`] so that a bare `[section]` header produces a working
//! configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine-wide settings.
    pub engine: EngineSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
    /// Ordered request routes. The first matching route decides.
    pub routes: Vec<RouteRule>,
    /// Composed annotations, keyed by name.
    pub annotations: BTreeMap<String, ComposedAnnotationSection>,
    /// Type metadata, keyed by type name.
    pub types: BTreeMap<String, TypeSection>,
    /// Session authentication chain.
    pub sessions: SessionsSection,
}

// ---------------------------------------------------------------------------
// EngineSection
// ---------------------------------------------------------------------------

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// How enforcement points treat an abstain: `"deny"` or `"grant"`.
    pub on_abstain: String,
    /// Longest accepted expression source in bytes. `0` means unlimited.
    pub max_expression_length: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            on_abstain: "deny".to_owned(),
            max_expression_length: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["warden_policy=debug"]`).
    pub directives: Vec<String>,
    /// Where log lines go: `"stderr"`, `"stdout"`, or `"file"`.
    pub target: String,
    /// Log directory. Required when `target = "file"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Log file name prefix.
    pub file_prefix: String,
    /// Log file rotation: `"daily"`, `"hourly"`, or `"never"`.
    pub rotation: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            target: "stderr".to_owned(),
            directory: None,
            file_prefix: "warden".to_owned(),
            rotation: "daily".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// One request route.
///
/// Exactly one of `access`, `authorities` and `expression` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteRule {
    /// Path pattern (`*` within a segment, `**` across segments).
    pub pattern: String,
    /// Restrict the route to one HTTP method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// A fixed rule: `"permit_all"`, `"deny_all"` or `"authenticated"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    /// Grant if the principal holds any of these authorities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorities: Option<Vec<String>>,
    /// Grant if this expression evaluates to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// The access rule of a [`RouteRule`], once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess<'a> {
    /// Always grant.
    PermitAll,
    /// Always deny.
    DenyAll,
    /// Grant authenticated principals.
    Authenticated,
    /// Grant principals holding any of the authorities.
    Authorities(&'a [String]),
    /// Evaluate the expression.
    Expression(&'a str),
}

impl RouteRule {
    /// The route's access rule, or `None` unless exactly one is set and the
    /// fixed rule name is known.
    #[must_use]
    pub fn access_rule(&self) -> Option<RouteAccess<'_>> {
        match (&self.access, &self.authorities, &self.expression) {
            (Some(access), None, None) => match access.as_str() {
                "permit_all" => Some(RouteAccess::PermitAll),
                "deny_all" => Some(RouteAccess::DenyAll),
                "authenticated" => Some(RouteAccess::Authenticated),
                _ => None,
            },
            (None, Some(authorities), None) => Some(RouteAccess::Authorities(authorities)),
            (None, None, Some(expression)) => Some(RouteAccess::Expression(expression)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Annotations and types
// ---------------------------------------------------------------------------

/// An annotation use as written in configuration.
///
/// Either one policy key (`pre_authorize`, `post_authorize`, `pre_filter`,
/// `post_filter`) with optional `filter_target`/`deny_handler`, or a
/// `compose` reference with optional `params`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotationEntry {
    /// Pre-authorize expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_authorize: Option<String>,
    /// Post-authorize expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_authorize: Option<String>,
    /// Pre-filter expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_filter: Option<String>,
    /// Post-filter expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_filter: Option<String>,
    /// Argument a pre-filter applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_target: Option<String>,
    /// Deny handler invoked instead of rejecting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_handler: Option<String>,
    /// Name of a composed annotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose: Option<String>,
    /// Placeholder values for a composed annotation.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// The shape of an [`AnnotationEntry`], once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationForm<'a> {
    /// A policy annotation: kind key and expression.
    Policy {
        /// One of `pre_authorize`, `post_authorize`, `pre_filter`, `post_filter`.
        kind: &'static str,
        /// Expression source.
        value: &'a str,
    },
    /// A composed annotation reference.
    Composed {
        /// Composed annotation name.
        name: &'a str,
    },
}

impl AnnotationEntry {
    /// The entry's form, or `None` unless exactly one policy key or
    /// `compose` is set.
    #[must_use]
    pub fn form(&self) -> Option<AnnotationForm<'_>> {
        let candidates = [
            ("pre_authorize", &self.pre_authorize),
            ("post_authorize", &self.post_authorize),
            ("pre_filter", &self.pre_filter),
            ("post_filter", &self.post_filter),
            ("compose", &self.compose),
        ];
        let mut set = candidates
            .into_iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)));
        match (set.next(), set.next()) {
            (Some(("compose", name)), None) => Some(AnnotationForm::Composed { name }),
            (Some((kind, value)), None) => Some(AnnotationForm::Policy { kind, value }),
            _ => None,
        }
    }

    /// Expression sources this entry carries directly.
    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        [
            &self.pre_authorize,
            &self.post_authorize,
            &self.pre_filter,
            &self.post_filter,
        ]
        .into_iter()
        .filter_map(|value| value.as_deref())
    }
}

/// A composed annotation definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposedAnnotationSection {
    /// What the annotation expands into.
    pub uses: Vec<AnnotationEntry>,
}

/// Policy-relevant metadata for one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypeSection {
    /// `"class"` or `"interface"`.
    pub kind: String,
    /// Superclass, for classes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    /// Implemented interfaces, in declaration order.
    pub interfaces: Vec<String>,
    /// Class-level annotations.
    pub annotations: Vec<AnnotationEntry>,
    /// Declared methods.
    pub methods: BTreeMap<String, MethodSection>,
}

impl Default for TypeSection {
    fn default() -> Self {
        Self {
            kind: "class".to_owned(),
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            methods: BTreeMap::new(),
        }
    }
}

/// A declared method and its annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MethodSection {
    /// Method-level annotations.
    pub annotations: Vec<AnnotationEntry>,
}

// ---------------------------------------------------------------------------
// SessionsSection
// ---------------------------------------------------------------------------

/// Session step names, in the only order they may appear.
pub const SESSION_STEPS: [&str; 3] = ["concurrency", "fixation", "register"];

/// Session authentication chain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Steps run after a successful authentication, in order.
    pub chain: Vec<String>,
    /// Concurrent sessions allowed per principal. `0` means unlimited.
    pub max_sessions_per_principal: usize,
    /// Reject the login instead of expiring the least recently used session.
    pub prevent_login_when_exceeded: bool,
    /// Copy attributes to the new session when rotating its identifier.
    pub migrate_attributes: bool,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            chain: SESSION_STEPS.iter().map(|s| (*s).to_owned()).collect(),
            max_sessions_per_principal: 1,
            prevent_login_when_exceeded: false,
            migrate_attributes: true,
        }
    }
}
