//! First-match routing of requests to decision units.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use warden_core::{
    AuthzError, AuthzResult, Decision, DefaultPathParser, HttpMethod, HttpRequest,
    MemoizedPrincipal, PathParser, PrincipalSupplier,
};

use crate::matcher::{AnyRequest, PathPatternMatcher, RequestMatcher};
use crate::unit::DecisionUnit;

struct RouteEntry {
    matcher: Arc<dyn RequestMatcher>,
    unit: Arc<dyn DecisionUnit<HttpRequest>>,
}

/// Routes each request to the unit of the first matching entry.
///
/// Entries are evaluated in insertion order. The request path is normalized
/// once per call and shared by every matcher. If nothing matches, the
/// manager abstains and the enforcement layer decides.
pub struct RequestMatcherDelegatingManager {
    entries: Vec<RouteEntry>,
    parser: Arc<dyn PathParser>,
}

impl RequestMatcherDelegatingManager {
    /// Start building a manager.
    #[must_use]
    pub fn builder() -> RequestMatcherDelegatingManagerBuilder {
        RequestMatcherDelegatingManagerBuilder::default()
    }

    /// Number of route entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the builder rejects empty route lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decide for a request.
    ///
    /// # Errors
    ///
    /// Propagates errors from the selected unit.
    pub fn authorize(
        &self,
        principal: &dyn PrincipalSupplier,
        request: &HttpRequest,
    ) -> AuthzResult<Decision> {
        let principal = MemoizedPrincipal::new(principal);
        let path = request.path(self.parser.as_ref());
        for (position, entry) in self.entries.iter().enumerate() {
            if !entry.matcher.matches(request, path) {
                continue;
            }
            trace!(
                position,
                total = self.entries.len(),
                matcher = %entry.matcher.describe(),
                "request matched"
            );
            let decision = entry.unit.decide(&principal, request)?;
            debug!(
                method = %request.method,
                path = %path,
                unit = %entry.unit.describe(),
                %decision,
                "routed decision"
            );
            return Ok(decision);
        }
        debug!(method = %request.method, path = %path, "no route matched");
        Ok(Decision::Abstain)
    }
}

impl DecisionUnit<HttpRequest> for RequestMatcherDelegatingManager {
    fn decide(
        &self,
        principal: &dyn PrincipalSupplier,
        target: &HttpRequest,
    ) -> AuthzResult<Decision> {
        self.authorize(principal, target)
    }

    fn describe(&self) -> String {
        format!("delegating({} routes)", self.entries.len())
    }
}

impl fmt::Debug for RequestMatcherDelegatingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{} -> {}", e.matcher.describe(), e.unit.describe()))
            .collect();
        f.debug_struct("RequestMatcherDelegatingManager")
            .field("routes", &routes)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestMatcherDelegatingManager`]. Entry order is the
/// evaluation order.
#[derive(Default)]
pub struct RequestMatcherDelegatingManagerBuilder {
    entries: Vec<RouteEntry>,
    parser: Option<Arc<dyn PathParser>>,
    catch_all: Option<usize>,
}

impl RequestMatcherDelegatingManagerBuilder {
    /// Use a custom path parser.
    #[must_use]
    pub fn path_parser(mut self, parser: Arc<dyn PathParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Append an entry.
    #[must_use]
    pub fn add(
        mut self,
        matcher: Arc<dyn RequestMatcher>,
        unit: Arc<dyn DecisionUnit<HttpRequest>>,
    ) -> Self {
        self.entries.push(RouteEntry { matcher, unit });
        self
    }

    /// Append an entry for a path pattern.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is invalid.
    pub fn path(
        self,
        pattern: &str,
        unit: Arc<dyn DecisionUnit<HttpRequest>>,
    ) -> AuthzResult<Self> {
        Ok(self.add(Arc::new(PathPatternMatcher::new(pattern)?), unit))
    }

    /// Append an entry for a method and path pattern.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern is invalid.
    pub fn method_path(
        self,
        method: HttpMethod,
        pattern: &str,
        unit: Arc<dyn DecisionUnit<HttpRequest>>,
    ) -> AuthzResult<Self> {
        let matcher = PathPatternMatcher::new(pattern)?.with_method(method);
        Ok(self.add(Arc::new(matcher), unit))
    }

    /// Append a catch-all entry.
    #[must_use]
    pub fn any_request(mut self, unit: Arc<dyn DecisionUnit<HttpRequest>>) -> Self {
        if self.catch_all.is_none() {
            self.catch_all = Some(self.entries.len());
        }
        self.add(Arc::new(AnyRequest), unit)
    }

    /// Finish building.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if no entries were added.
    pub fn build(self) -> AuthzResult<RequestMatcherDelegatingManager> {
        if self.entries.is_empty() {
            return Err(AuthzError::configuration(
                "request matcher delegating manager requires at least one route",
            ));
        }
        let total = self.entries.len();
        if let Some(terminal) = self.catch_all
            && terminal.saturating_add(1) < total
        {
            warn!(
                position = terminal,
                total, "routes after the catch-all entry can never match"
            );
        }
        Ok(RequestMatcherDelegatingManager {
            entries: self.entries,
            parser: self.parser.unwrap_or_else(|| Arc::new(DefaultPathParser)),
        })
    }
}

impl fmt::Debug for RequestMatcherDelegatingManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMatcherDelegatingManagerBuilder")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}
