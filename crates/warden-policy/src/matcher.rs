//! Request matchers for route-based delegation.

use globset::{GlobBuilder, GlobMatcher};
use std::fmt;
use std::sync::Arc;

use warden_core::{AuthzError, AuthzResult, HttpMethod, HttpRequest, RequestPath};

/// Decides whether a route entry applies to a request.
///
/// Matchers receive the request together with its normalized path, parsed
/// once per decision by the caller. Implementations must be pure.
pub trait RequestMatcher: Send + Sync {
    /// Whether this matcher accepts the request.
    fn matches(&self, request: &HttpRequest, path: &RequestPath) -> bool;

    /// A short description for logs.
    fn describe(&self) -> String;
}

/// Matches every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyRequest;

impl RequestMatcher for AnyRequest {
    fn matches(&self, _request: &HttpRequest, _path: &RequestPath) -> bool {
        true
    }

    fn describe(&self) -> String {
        "any request".to_string()
    }
}

/// Matches normalized paths against an ant-style glob, optionally restricted
/// to one HTTP method.
///
/// `*` matches within a segment and `**` across segments. A pattern ending in
/// `/**` also matches the bare prefix, so `/admin/**` matches `/admin`.
#[derive(Debug, Clone)]
pub struct PathPatternMatcher {
    pattern: String,
    method: Option<HttpMethod>,
    glob: GlobMatcher,
    prefix: Option<String>,
}

impl PathPatternMatcher {
    /// Compile a path pattern.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if the pattern is empty, does
    /// not start with `/` or is not a valid glob.
    pub fn new(pattern: impl Into<String>) -> AuthzResult<Self> {
        let pattern = pattern.into();
        if !pattern.starts_with('/') {
            return Err(AuthzError::configuration(format!(
                "path pattern '{pattern}' must start with '/'"
            )));
        }
        let glob = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                AuthzError::configuration(format!("invalid path pattern '{pattern}': {e}"))
            })?
            .compile_matcher();
        let prefix = pattern.strip_suffix("/**").map(|p| {
            if p.is_empty() {
                "/".to_string()
            } else {
                p.to_string()
            }
        });
        Ok(Self {
            pattern,
            method: None,
            glob,
            prefix,
        })
    }

    /// Restrict the matcher to one HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl RequestMatcher for PathPatternMatcher {
    fn matches(&self, request: &HttpRequest, path: &RequestPath) -> bool {
        if self.method.is_some_and(|m| m != request.method) {
            return false;
        }
        let path = path.as_str();
        self.glob.is_match(path) || self.prefix.as_deref() == Some(path)
    }

    fn describe(&self) -> String {
        match self.method {
            Some(method) => format!("{method} {}", self.pattern),
            None => self.pattern.clone(),
        }
    }
}

/// Matches if any of its matchers does.
pub struct OrMatcher {
    matchers: Vec<Arc<dyn RequestMatcher>>,
}

impl OrMatcher {
    /// Combine matchers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if `matchers` is empty.
    pub fn new(matchers: Vec<Arc<dyn RequestMatcher>>) -> AuthzResult<Self> {
        if matchers.is_empty() {
            return Err(AuthzError::configuration("or-matcher requires at least one matcher"));
        }
        Ok(Self { matchers })
    }
}

impl RequestMatcher for OrMatcher {
    fn matches(&self, request: &HttpRequest, path: &RequestPath) -> bool {
        self.matchers.iter().any(|m| m.matches(request, path))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.matchers.iter().map(|m| m.describe()).collect();
        parts.join(" | ")
    }
}

impl fmt::Debug for OrMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrMatcher")
            .field("matchers", &self.describe())
            .finish()
    }
}
