//! Fixtures for common principals, invocations and metadata.

use std::sync::Arc;

use warden_core::{HttpMethod, HttpRequest, MethodInvocation, MethodRef, Principal};
use warden_policy::{
    AnnotationUse, ComposedAnnotation, MetadataRegistry, PolicyAnnotation, TypeMetadata,
    UniqueAnnotationScanner,
};

/// Authenticated `alice` with `ROLE_USER`.
#[must_use]
pub fn alice() -> Arc<Principal> {
    Arc::new(Principal::authenticated("alice").with_authority("ROLE_USER"))
}

/// Authenticated `bob` with `ROLE_USER`.
#[must_use]
pub fn bob() -> Arc<Principal> {
    Arc::new(Principal::authenticated("bob").with_authority("ROLE_USER"))
}

/// Authenticated `root` with `ROLE_USER` and `ROLE_ADMIN`.
#[must_use]
pub fn admin() -> Arc<Principal> {
    Arc::new(Principal::authenticated("root").with_authorities(["ROLE_USER", "ROLE_ADMIN"]))
}

/// An invocation of `type_name::method` without arguments.
#[must_use]
pub fn invocation(type_name: &str, method: &str) -> MethodInvocation {
    MethodInvocation::new(MethodRef::new(type_name, method))
}

/// A request without headers.
#[must_use]
pub fn request(method: HttpMethod, uri: &str) -> HttpRequest {
    HttpRequest::new(method, uri)
}

/// A small document API.
///
/// - `DocumentApi` (interface): `read` is owner-only, `list` post-filters to
///   the caller's documents, `delete` uses the composed `IsAdmin`.
/// - `DocumentService` implements `DocumentApi` and adds `share`, annotated
///   with a deny handler named `masked`.
/// - `AuditedDocumentService` extends `DocumentService` and redeclares
///   `read` without an annotation.
#[must_use]
pub fn document_registry() -> MetadataRegistry {
    MetadataRegistry::new()
        .with_annotation(ComposedAnnotation::new(
            "IsAdmin",
            vec![PolicyAnnotation::pre_authorize("'ROLE_ADMIN' in principal.authorities").into()],
        ))
        .with_type(
            TypeMetadata::interface("DocumentApi")
                .method(
                    "read",
                    PolicyAnnotation::pre_authorize("args.owner == principal.name"),
                )
                .method(
                    "list",
                    PolicyAnnotation::post_filter("filterObject.owner == principal.name"),
                )
                .method("delete", AnnotationUse::composed("IsAdmin")),
        )
        .with_type(
            TypeMetadata::class("DocumentService")
                .implements("DocumentApi")
                .declares("read")
                .declares("list")
                .declares("delete")
                .method(
                    "share",
                    PolicyAnnotation::pre_authorize("args.owner == principal.name")
                        .with_deny_handler("masked"),
                ),
        )
        .with_type(
            TypeMetadata::class("AuditedDocumentService")
                .extends("DocumentService")
                .declares("read"),
        )
}

/// A scanner over [`document_registry`].
#[must_use]
pub fn document_scanner() -> Arc<UniqueAnnotationScanner> {
    Arc::new(UniqueAnnotationScanner::new(Arc::new(document_registry())))
}
