//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::http::{Request, StatusCode};
use edge_middleware::{from_fn, EdgeRequest, EdgeResponse, Middleware, ResponseAction};

/// Build a request view for `uri` with the given headers.
pub fn request(uri: &str, headers: &[(&str, &str)]) -> EdgeRequest {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    EdgeRequest::from(&builder.body(()).unwrap())
}

/// Middleware that always answers with `status` and `body`.
pub fn respond(status: StatusCode, body: &'static str) -> impl Middleware {
    from_fn(move |_ctx| async move { Ok(Some(EdgeResponse::respond(status, body))) })
}

/// Middleware that always passes.
pub fn pass() -> impl Middleware {
    from_fn(|_ctx| async { Ok(None) })
}

/// Records the names of middleware as they run.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn passing(&self, name: &'static str) -> impl Middleware {
        let log = self.clone();
        from_fn(move |_ctx| {
            log.0.lock().unwrap().push(name);
            async { Ok(None) }
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

/// Body of a `Respond` action, as UTF-8.
pub fn body_text(response: &EdgeResponse) -> Option<String> {
    match response.action() {
        ResponseAction::Respond { body, .. } => Some(String::from_utf8_lossy(body).into_owned()),
        _ => None,
    }
}
