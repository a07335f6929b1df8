//! Shared engine components under concurrent use.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde_json::json;
use warden_core::{
    Decision, DeferredPrincipal, HttpMethod, HttpRequest, MethodInvocation, MethodRef,
    Principal,
};
use warden_expr::ExpressionEngine;
use warden_policy::{
    AttributeResolver, DecisionUnit, DenyAll, MethodSecurityInterceptor, PermitAll, PolicyKind,
    RequestMatcherDelegatingManager,
};
use warden_session::{
    CompositeSessionStrategy, ConcurrentSessionControl, InMemorySessionRegistry, RegisterSession,
    SessionAuthenticationStrategy, SessionExchange, SessionFixationProtection, SessionRegistry,
};
use warden_test::{CountingPathParser, CountingScanner, alice, document_scanner, init_test_logging};

const THREADS: usize = 8;
const ROUNDS: usize = 50;

#[test]
fn test_resolver_cache_converges_on_one_attribute() {
    init_test_logging();
    let scanner = Arc::new(CountingScanner::new(document_scanner()));
    let engine = Arc::new(ExpressionEngine::new());
    let resolver = AttributeResolver::new(PolicyKind::PreAuthorize, scanner.clone(), engine);
    let method = MethodRef::new("DocumentApi", "read");

    let resolved: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    (0..ROUNDS)
                        .map(|_| resolver.resolve(&method, "DocumentService").unwrap().unwrap())
                        .last()
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &resolved[0];
    assert!(resolved.iter().all(|a| Arc::ptr_eq(a, first)));
    assert_eq!(resolver.cached_len(), 1);
    assert!(scanner.calls() >= 1);
    assert!(scanner.calls() <= THREADS);

    // Once settled, lookups are served from the cache.
    let settled = scanner.calls();
    resolver.resolve(&method, "DocumentService").unwrap();
    assert_eq!(scanner.calls(), settled);
}

#[test]
fn test_compile_cache_shares_programs() {
    let engine = ExpressionEngine::new();
    let source = "'ROLE_ADMIN' in principal.authorities";

    let compiled: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| engine.compile(source).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(compiled.iter().all(|c| Arc::ptr_eq(c, &compiled[0])));
    assert_eq!(engine.cached_len(), 1);
}

#[test]
fn test_deferred_principal_resolves_once_across_threads() {
    let lookups = AtomicUsize::new(0);
    let principal = DeferredPrincipal::new(|| {
        lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Principal::authenticated("alice").with_authority("ROLE_USER"))
    });
    let engine = Arc::new(ExpressionEngine::new());
    let interceptor = MethodSecurityInterceptor::new(document_scanner(), engine);
    let invocation = MethodInvocation::new(MethodRef::new("DocumentApi", "read"))
        .with_target_type("DocumentService")
        .with_argument("owner", json!("alice"));

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    assert_eq!(
                        interceptor.authorize(&principal, &invocation).unwrap(),
                        Decision::Grant
                    );
                }
            });
        }
    });

    assert_eq!(lookups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_delegating_manager_parses_each_request_once() {
    let parser = Arc::new(CountingPathParser::new());
    let deny: Arc<dyn DecisionUnit<HttpRequest>> = Arc::new(DenyAll);
    let manager = RequestMatcherDelegatingManager::builder()
        .path_parser(parser.clone())
        .path("/a/**", deny.clone())
        .unwrap()
        .path("/b/**", deny.clone())
        .unwrap()
        .path("/c/**", deny)
        .unwrap()
        .any_request(Arc::new(PermitAll))
        .build()
        .unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    let request = HttpRequest::new(HttpMethod::Get, "/z/1");
                    assert_eq!(manager.decide(&alice(), &request).unwrap(), Decision::Grant);
                }
            });
        }
    });

    assert_eq!(parser.calls(), THREADS * ROUNDS);
}

#[test]
fn test_session_chain_under_concurrent_logins() {
    let registry = Arc::new(InMemorySessionRegistry::new());
    let shared: Arc<dyn SessionRegistry> = registry.clone();
    let chain = CompositeSessionStrategy::new(vec![
        Arc::new(ConcurrentSessionControl::new(Arc::clone(&shared), 0)),
        Arc::new(SessionFixationProtection::default().with_registry(Arc::clone(&shared))),
        Arc::new(RegisterSession::new(Arc::clone(&shared))),
    ])
    .unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let chain = &chain;
            s.spawn(move || {
                let principal = Principal::authenticated(format!("user-{t}"));
                for _ in 0..ROUNDS {
                    let mut exchange = SessionExchange::new();
                    chain.on_authentication(&principal, &mut exchange).unwrap();
                }
            });
        }
    });

    assert_eq!(registry.len(), THREADS * ROUNDS);
    for t in 0..THREADS {
        assert_eq!(registry.all_sessions(&format!("user-{t}"), false).len(), ROUNDS);
    }
}
