//! HTTP requests as authorization targets.
//!
//! Route matchers work on a normalized [`RequestPath`] rather than on the raw
//! request URI. Parsing that path is done once per request: the first
//! [`HttpRequest::path`] call stores the parsed value inside the request and
//! every later matcher reuses it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::AuthzError;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// `TRACE`
    Trace,
}

impl HttpMethod {
    /// The canonical upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            other => Err(AuthzError::configuration(format!(
                "unknown HTTP method '{other}'"
            ))),
        }
    }
}

/// Normalized path of a request within the application.
///
/// The context path and query string are removed, repeated slashes are
/// collapsed and `.`/`..` segments are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    value: String,
    segments: Vec<String>,
}

impl RequestPath {
    /// Build from already-normalized segments.
    #[must_use]
    pub fn from_segments(segments: Vec<String>) -> Self {
        let value = if segments.is_empty() {
            "/".to_string()
        } else {
            let mut value = String::new();
            for segment in &segments {
                value.push('/');
                value.push_str(segment);
            }
            value
        };
        Self { value, segments }
    }

    /// The path as a string, always starting with `/`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The individual path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Computes the normalized path of a request.
pub trait PathParser: Send + Sync {
    /// Parse the request's path.
    fn parse(&self, request: &HttpRequest) -> RequestPath;
}

/// The standard normalization rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPathParser;

impl PathParser for DefaultPathParser {
    fn parse(&self, request: &HttpRequest) -> RequestPath {
        let uri = request.uri.split(['?', '#']).next().unwrap_or_default();
        let within = uri
            .strip_prefix(request.context_path.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(uri);

        let mut segments: Vec<String> = Vec::new();
        for segment in within.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    segments.pop();
                },
                s => segments.push(s.to_string()),
            }
        }
        RequestPath::from_segments(segments)
    }
}

/// An inbound HTTP request, reduced to what authorization needs.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Full request URI path, including the context path and query.
    pub uri: String,
    /// Application context path prefix (empty for the root).
    pub context_path: String,
    /// Request headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Request-scoped attributes set by earlier processing.
    pub attributes: BTreeMap<String, serde_json::Value>,
    parsed_path: OnceLock<RequestPath>,
}

impl HttpRequest {
    /// Create a request for the given method and URI.
    #[must_use]
    pub fn new(method: HttpMethod, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            context_path: String::new(),
            headers: BTreeMap::new(),
            attributes: BTreeMap::new(),
            parsed_path: OnceLock::new(),
        }
    }

    /// Shorthand for a `GET` request.
    #[must_use]
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, uri)
    }

    /// Set the context path.
    #[must_use]
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self.parsed_path = OnceLock::new();
        self
    }

    /// Add a header. Header names are case-insensitive and stored lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set a request attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Store a pre-computed path, so later [`path`](Self::path) calls do not
    /// parse again. Ignored if a path was already stored.
    #[must_use]
    pub fn with_parsed_path(self, path: RequestPath) -> Self {
        let _ = self.parsed_path.set(path);
        self
    }

    /// The normalized path, parsed on first access and cached in the request.
    pub fn path(&self, parser: &dyn PathParser) -> &RequestPath {
        self.parsed_path.get_or_init(|| parser.parse(self))
    }

    /// The cached path, if one has been computed.
    #[must_use]
    pub fn cached_path(&self) -> Option<&RequestPath> {
        self.parsed_path.get()
    }

    /// The query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, q)| q)
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parse(request: &HttpRequest) -> String {
        DefaultPathParser.parse(request).as_str().to_string()
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("FETCH".parse::<HttpMethod>().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(parse(&HttpRequest::get("/a//b/./c")), "/a/b/c");
        assert_eq!(parse(&HttpRequest::get("/a/b/../c")), "/a/c");
        assert_eq!(parse(&HttpRequest::get("/../..")), "/");
        assert_eq!(parse(&HttpRequest::get("/docs?page=2")), "/docs");
        assert_eq!(parse(&HttpRequest::get("")), "/");
    }

    #[test]
    fn test_context_path_is_stripped() {
        let request = HttpRequest::get("/app/admin/users").with_context_path("/app");
        assert_eq!(parse(&request), "/admin/users");

        // A prefix that only matches part of a segment is not a context path.
        let request = HttpRequest::get("/application/x").with_context_path("/app");
        assert_eq!(parse(&request), "/application/x");
    }

    #[test]
    fn test_segments() {
        let path = DefaultPathParser.parse(&HttpRequest::get("/a/b"));
        assert_eq!(path.segments(), ["a".to_string(), "b".to_string()]);
    }

    struct Counting(AtomicUsize);

    impl PathParser for Counting {
        fn parse(&self, request: &HttpRequest) -> RequestPath {
            self.0.fetch_add(1, Ordering::SeqCst);
            DefaultPathParser.parse(request)
        }
    }

    #[test]
    fn test_path_is_parsed_once() {
        let parser = Counting(AtomicUsize::new(0));
        let request = HttpRequest::get("/x/y");
        assert!(request.cached_path().is_none());
        assert_eq!(request.path(&parser).as_str(), "/x/y");
        assert_eq!(request.path(&parser).as_str(), "/x/y");
        assert_eq!(parser.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pre_parsed_path_is_reused() {
        let parser = Counting(AtomicUsize::new(0));
        let request = HttpRequest::get("/ignored")
            .with_parsed_path(RequestPath::from_segments(vec!["cached".to_string()]));
        assert_eq!(request.path(&parser).as_str(), "/cached");
        assert_eq!(parser.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_headers_and_query() {
        let request = HttpRequest::get("/s?q=1").with_header("X-Tenant", "acme");
        assert_eq!(request.header("x-tenant"), Some("acme"));
        assert_eq!(request.header("X-TENANT"), Some("acme"));
        assert_eq!(request.query(), Some("q=1"));
    }
}
