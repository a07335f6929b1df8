//! "Would this be allowed?" queries for UI hinting.
//!
//! [`PrivilegeEvaluator`] answers whether a principal could access a path by
//! running a synthetic request through a decision unit. Unlike a request-time
//! enforcement point, an abstain counts as allowed: the evaluator reports
//! whether there is an affirmative or neutral basis for access and is not a
//! security gate.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use warden_core::{
    AuthzResult, Decision, DefaultPathParser, HttpMethod, HttpRequest, PathParser, Principal,
};

use crate::unit::DecisionUnit;

/// Turns the synthetic request into the request the unit will see.
pub trait RequestTransformer: Send + Sync {
    /// Transform the request.
    fn transform(&self, request: HttpRequest) -> HttpRequest;
}

/// Leaves the request unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl RequestTransformer for IdentityTransformer {
    fn transform(&self, request: HttpRequest) -> HttpRequest {
        request
    }
}

/// Pre-computes the normalized path so matchers downstream reuse it instead
/// of parsing again.
#[derive(Clone)]
pub struct PathPatternRequestTransformer {
    parser: Arc<dyn PathParser>,
}

impl PathPatternRequestTransformer {
    /// Create a transformer using the given parser.
    #[must_use]
    pub fn new(parser: Arc<dyn PathParser>) -> Self {
        Self { parser }
    }
}

impl Default for PathPatternRequestTransformer {
    fn default() -> Self {
        Self::new(Arc::new(DefaultPathParser))
    }
}

impl RequestTransformer for PathPatternRequestTransformer {
    fn transform(&self, request: HttpRequest) -> HttpRequest {
        let path = self.parser.parse(&request);
        request.with_parsed_path(path)
    }
}

impl fmt::Debug for PathPatternRequestTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPatternRequestTransformer")
            .finish_non_exhaustive()
    }
}

/// Evaluates privileges for paths without a real request.
pub struct PrivilegeEvaluator {
    unit: Arc<dyn DecisionUnit<HttpRequest>>,
    transformer: Arc<dyn RequestTransformer>,
}

impl PrivilegeEvaluator {
    /// Create an evaluator over a decision unit, typically a
    /// [`RequestMatcherDelegatingManager`](crate::RequestMatcherDelegatingManager).
    #[must_use]
    pub fn new(unit: Arc<dyn DecisionUnit<HttpRequest>>) -> Self {
        Self {
            unit,
            transformer: Arc::new(IdentityTransformer),
        }
    }

    /// Install a request transformer.
    #[must_use]
    pub fn with_transformer(mut self, transformer: Arc<dyn RequestTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Whether `principal` may `GET` `path`.
    ///
    /// # Errors
    ///
    /// Propagates configuration and evaluation errors from the unit.
    pub fn is_allowed(&self, path: &str, principal: Arc<Principal>) -> AuthzResult<bool> {
        self.is_allowed_request("", path, HttpMethod::Get, principal)
    }

    /// Whether `principal` may send `method` to `uri` under `context_path`.
    ///
    /// # Errors
    ///
    /// Propagates configuration and evaluation errors from the unit.
    pub fn is_allowed_request(
        &self,
        context_path: &str,
        uri: &str,
        method: HttpMethod,
        principal: Arc<Principal>,
    ) -> AuthzResult<bool> {
        let request = self.transformer.transform(
            HttpRequest::new(method, uri).with_context_path(context_path),
        );
        let decision = self.unit.decide(&principal, &request)?;
        let allowed = allows(decision);
        debug!(
            principal = %principal,
            %method,
            uri,
            %decision,
            allowed,
            "privilege evaluation"
        );
        Ok(allowed)
    }
}

impl fmt::Debug for PrivilegeEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegeEvaluator")
            .field("unit", &self.unit.describe())
            .finish_non_exhaustive()
    }
}

/// Whether a decision reads as allowed for privilege queries.
#[must_use]
pub fn allows(decision: Decision) -> bool {
    !decision.is_denied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegating::RequestMatcherDelegatingManager;
    use crate::unit::{AuthorityUnit, DenyAll, PermitAll, from_fn};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_core::{PrincipalSupplier, RequestPath};

    struct CountingParser(AtomicUsize);

    impl PathParser for CountingParser {
        fn parse(&self, request: &HttpRequest) -> RequestPath {
            self.0.fetch_add(1, Ordering::SeqCst);
            DefaultPathParser.parse(request)
        }
    }

    fn alice() -> Arc<Principal> {
        Arc::new(Principal::authenticated("alice").with_authority("ROLE_USER"))
    }

    #[test]
    fn test_abstain_reads_as_allowed() {
        let unit: Arc<dyn DecisionUnit<HttpRequest>> =
            Arc::new(from_fn(|_: &dyn PrincipalSupplier, _: &HttpRequest| {
                Ok(Decision::Abstain)
            }));
        assert!(PrivilegeEvaluator::new(unit).is_allowed("/x", alice()).unwrap());
    }

    #[test]
    fn test_grant_and_deny() {
        assert!(PrivilegeEvaluator::new(Arc::new(PermitAll)).is_allowed("/x", alice()).unwrap());
        assert!(!PrivilegeEvaluator::new(Arc::new(DenyAll)).is_allowed("/x", alice()).unwrap());
    }

    #[test]
    fn test_routes_and_authorities() {
        let manager = RequestMatcherDelegatingManager::builder()
            .path("/admin/**", Arc::new(AuthorityUnit::has_authority("ROLE_ADMIN")))
            .unwrap()
            .any_request(Arc::new(PermitAll))
            .build()
            .unwrap();
        let evaluator = PrivilegeEvaluator::new(Arc::new(manager));
        assert!(!evaluator.is_allowed("/admin/users", alice()).unwrap());
        assert!(evaluator.is_allowed("/docs", alice()).unwrap());
    }

    #[test]
    fn test_transformer_output_is_used() {
        struct ToPost;
        impl RequestTransformer for ToPost {
            fn transform(&self, request: HttpRequest) -> HttpRequest {
                HttpRequest::new(HttpMethod::Post, request.uri)
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let recorder = Arc::clone(&seen);
        let unit: Arc<dyn DecisionUnit<HttpRequest>> =
            Arc::new(from_fn(move |_: &dyn PrincipalSupplier, request: &HttpRequest| {
                *recorder.lock().unwrap() = Some(request.method);
                Ok(Decision::Grant)
            }));
        let evaluator = PrivilegeEvaluator::new(unit).with_transformer(Arc::new(ToPost));
        assert!(evaluator.is_allowed("/x", alice()).unwrap());
        assert_eq!(*seen.lock().unwrap(), Some(HttpMethod::Post));
    }

    #[test]
    fn test_path_transformer_skips_manager_parse() {
        let manager_parser = Arc::new(CountingParser(AtomicUsize::new(0)));
        let manager = RequestMatcherDelegatingManager::builder()
            .path_parser(manager_parser.clone())
            .path("/a/**", Arc::new(PermitAll))
            .unwrap()
            .path("/b/**", Arc::new(PermitAll))
            .unwrap()
            .build()
            .unwrap();
        let manager: Arc<dyn DecisionUnit<HttpRequest>> = Arc::new(manager);

        let plain = PrivilegeEvaluator::new(Arc::clone(&manager));
        plain.is_allowed("/b/1", alice()).unwrap();
        assert_eq!(manager_parser.0.load(Ordering::SeqCst), 1);

        let transformer_parser = Arc::new(CountingParser(AtomicUsize::new(0)));
        let cached = PrivilegeEvaluator::new(manager).with_transformer(Arc::new(
            PathPatternRequestTransformer::new(transformer_parser.clone()),
        ));
        cached.is_allowed("/b/1", alice()).unwrap();
        assert_eq!(transformer_parser.0.load(Ordering::SeqCst), 1);
        assert_eq!(manager_parser.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_context_path() {
        let manager = RequestMatcherDelegatingManager::builder()
            .path("/admin/**", Arc::new(DenyAll))
            .unwrap()
            .build()
            .unwrap();
        let evaluator = PrivilegeEvaluator::new(Arc::new(manager));
        assert!(
            !evaluator
                .is_allowed_request("/app", "/app/admin", HttpMethod::Get, alice())
                .unwrap()
        );
        assert!(allows(Decision::Abstain));
    }
}
