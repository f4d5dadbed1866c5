//! Request view consumed by matchers and middleware.
//!
//! # Responsibilities
//! - Capture the routing-relevant parts of a host request (path, query,
//!   headers, cookies, host)
//! - Parse query string and `Cookie` headers once, at construction
//!
//! # Design Decisions
//! - The body is never read; middleware decides on metadata only
//! - Host resolves from the URI authority first (host and port, never
//!   userinfo), then the `Host` header
//! - Duplicate query parameters and cookies resolve to the first occurrence

use std::collections::HashMap;

use axum::http::{header, HeaderMap, Method, Request, Uri};
use cookie::Cookie;

/// Immutable snapshot of an incoming request.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    host: Option<String>,
}

impl EdgeRequest {
    /// Build a request view from its method, URI and headers.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let query = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        let cookies = parse_cookies(&headers);
        let host = uri
            .authority()
            .map(|a| match a.port_u16() {
                Some(port) => format!("{}:{}", a.host(), port),
                None => a.host().to_string(),
            })
            .or_else(|| {
                headers
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            });

        Self {
            method,
            uri,
            headers,
            query,
            cookies,
            host,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path, without query string or host.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value by name (case-insensitive). Non UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// First query parameter value by name.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Resolved host, including the port when one was sent.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl<B> From<&Request<B>> for EdgeRequest {
    fn from(req: &Request<B>) -> Self {
        EdgeRequest::new(req.method().clone(), req.uri().clone(), req.headers().clone())
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(raw).flatten() {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
    }

    cookies
}
