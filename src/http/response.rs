//! Middleware results.
//!
//! # Responsibilities
//! - Describe what a middleware wants the host to do with the request:
//!   continue, rewrite, redirect, or answer directly
//! - Carry extra headers to set on the final response
//! - Convert terminal results into an `axum` response
//!
//! # Design Decisions
//! - `EdgeResponse::next()` is the default "continue" value a top-level chain
//!   returns when no middleware answered
//! - Bodies are fully buffered `Bytes`; streaming stays with the host
//! - The in-flight response is a [`SharedResponse`] handle, one per request

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};

/// What the host should do after the middleware chain ran.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseAction {
    /// Continue to the host's own request handling.
    Next,
    /// Continue, but with the request path replaced.
    Rewrite(String),
    /// Answer with a redirect.
    Redirect { location: String, status: StatusCode },
    /// Answer directly with a buffered body.
    Respond { status: StatusCode, body: Bytes },
}

/// Result of a middleware, or of a whole composed chain.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeResponse {
    action: ResponseAction,
    headers: HeaderMap,
}

impl EdgeResponse {
    fn from_action(action: ResponseAction) -> Self {
        Self {
            action,
            headers: HeaderMap::new(),
        }
    }

    /// Pass-through response: let the host continue handling the request.
    pub fn next() -> Self {
        Self::from_action(ResponseAction::Next)
    }

    /// Continue with `path` instead of the original request path.
    pub fn rewrite(path: impl Into<String>) -> Self {
        Self::from_action(ResponseAction::Rewrite(path.into()))
    }

    /// Temporary (307) redirect to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::redirect_with_status(location, StatusCode::TEMPORARY_REDIRECT)
    }

    pub fn redirect_with_status(location: impl Into<String>, status: StatusCode) -> Self {
        Self::from_action(ResponseAction::Redirect {
            location: location.into(),
            status,
        })
    }

    /// Answer the request directly.
    pub fn respond(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::from_action(ResponseAction::Respond {
            status,
            body: body.into(),
        })
    }

    /// Add a header to the final response.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn action(&self) -> &ResponseAction {
        &self.action
    }

    pub fn is_next(&self) -> bool {
        self.action == ResponseAction::Next
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn into_parts(self) -> (ResponseAction, HeaderMap) {
        (self.action, self.headers)
    }
}

impl Default for EdgeResponse {
    fn default() -> Self {
        Self::next()
    }
}

/// The in-flight response of one request, shared by every middleware that
/// runs for it.
///
/// Clones point at the same response, so headers set by one middleware are
/// visible to the ones after it and to the host.
#[derive(Debug, Clone, Default)]
pub struct SharedResponse(Arc<Mutex<EdgeResponse>>);

impl SharedResponse {
    pub fn new(response: EdgeResponse) -> Self {
        Self(Arc::new(Mutex::new(response)))
    }

    /// Lock the response for reading or modification.
    ///
    /// Do not hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, EdgeResponse> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> EdgeResponse {
        self.lock().clone()
    }

    /// Swap in a new response, returning the previous one.
    pub fn replace(&self, response: EdgeResponse) -> EdgeResponse {
        std::mem::replace(&mut *self.lock(), response)
    }

    /// Whether both handles point at the same response.
    pub fn ptr_eq(&self, other: &SharedResponse) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<EdgeResponse> for SharedResponse {
    fn from(response: EdgeResponse) -> Self {
        Self::new(response)
    }
}

/// Build the response for a terminal action.
///
/// Returns `None` for `Next` and `Rewrite`, which continue to the host.
pub fn terminal_response(action: ResponseAction) -> Option<Response> {
    match action {
        ResponseAction::Next | ResponseAction::Rewrite(_) => None,
        ResponseAction::Redirect { location, status } => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = status;
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                Err(_) => {
                    tracing::error!(location = %location, "Redirect location is not a valid header value");
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                }
            }
            Some(response)
        }
        ResponseAction::Respond { status, body } => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            Some(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_next() {
        assert!(EdgeResponse::default().is_next());
        assert!(!EdgeResponse::rewrite("/x").is_next());
    }

    #[test]
    fn test_redirect_response() {
        let response = terminal_response(EdgeResponse::redirect("/login").into_parts().0).unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn test_passthrough_actions_are_not_terminal() {
        assert!(terminal_response(ResponseAction::Next).is_none());
        assert!(terminal_response(ResponseAction::Rewrite("/a".into())).is_none());
    }

    #[test]
    fn test_with_header_appends() {
        let response = EdgeResponse::next()
            .with_header(HeaderName::from_static("x-edge"), HeaderValue::from_static("1"))
            .with_header(HeaderName::from_static("x-edge"), HeaderValue::from_static("2"));
        assert_eq!(response.headers().get_all("x-edge").iter().count(), 2);
    }

    #[test]
    fn test_shared_response_clones_see_updates() {
        let shared = SharedResponse::default();
        let other = shared.clone();
        other
            .lock()
            .headers_mut()
            .insert("x-seen", HeaderValue::from_static("1"));

        assert!(shared.ptr_eq(&other));
        assert_eq!(shared.snapshot().headers().get("x-seen").unwrap(), "1");

        let previous = shared.replace(EdgeResponse::rewrite("/b"));
        assert!(previous.is_next());
        assert_eq!(other.snapshot().action(), &ResponseAction::Rewrite("/b".into()));
    }
}
