//! Axum integration.
//!
//! # Responsibilities
//! - Run a composed chain in front of an axum service
//! - Apply the chain's answer: continue, rewrite the URI, or respond
//! - Drive `wait_until` background work after the chain finished
//!
//! # Design Decisions
//! - Chain errors become `500 Internal Server Error`; the inner service is
//!   not called
//! - A rewrite without its own query string keeps the original one
//! - Extra headers from the chain are applied to whatever response goes out
//!
//! Layers added with `Router::layer` run after routing, so a rewrite would
//! not reach the router. Wrap the router instead:
//!
//! ```ignore
//! let chain = Arc::new(compose_middlewares(specs)?);
//! let router = Router::new().route("/", get(handler));
//! let app = from_fn_with_state(chain, edge_middleware).layer(router);
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{uri::PathAndQuery, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::compose::ComposedMiddleware;
use crate::http::response::terminal_response;
use crate::http::{EdgeRequest, FetchEvent, ResponseAction};

pub async fn edge_middleware(
    State(chain): State<Arc<ComposedMiddleware>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let edge = EdgeRequest::from(&req);
    let event = FetchEvent::new(edge.path());

    let result = chain.handle(edge, event.clone()).await;

    if event.pending() > 0 {
        tokio::spawn(async move { event.drain().await });
    }

    let (action, headers) = match result {
        Ok(response) => response.into_parts(),
        Err(e) => {
            tracing::error!(path = %req.uri().path(), error = %e, "Middleware chain failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let mut response = match action {
        ResponseAction::Next => next.run(req).await,
        ResponseAction::Rewrite(destination) => match rewrite_uri(req.uri(), &destination) {
            Ok(uri) => {
                tracing::debug!(from = %req.uri(), to = %uri, "Rewriting request");
                *req.uri_mut() = uri;
                next.run(req).await
            }
            Err(e) => {
                tracing::error!(destination = %destination, error = %e, "Invalid rewrite destination");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
            }
        },
        terminal => match terminal_response(terminal) {
            Some(response) => response,
            None => next.run(req).await,
        },
    };

    response.headers_mut().extend(headers);
    response
}

/// Resolve a rewrite destination against the original request URI.
pub fn rewrite_uri(original: &Uri, destination: &str) -> Result<Uri, axum::http::Error> {
    let target: Uri = destination.parse()?;
    let Some(query) = original.query().filter(|_| target.query().is_none()) else {
        return Ok(target);
    };

    let mut parts = target.into_parts();
    let path = parts
        .path_and_query
        .as_ref()
        .map_or("/", |pq| pq.path())
        .to_string();
    parts.path_and_query = Some(PathAndQuery::try_from(format!("{}?{}", path, query))?);
    Ok(Uri::from_parts(parts)?)
}
