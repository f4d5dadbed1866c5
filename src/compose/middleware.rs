//! Middleware abstractions.
//!
//! A middleware inspects the [`RequestContext`] and either answers
//! (`Ok(Some(response))`), which stops the chain, or passes (`Ok(None)`).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::schema::OneOrMany;
use crate::error::Result;
use crate::http::{EdgeRequest, EdgeResponse, FetchEvent, SharedResponse};
use crate::routing::matcher::{Matcher, MatcherSpec};

/// Outcome of a single middleware: `Some` short-circuits the chain.
pub type MiddlewareResult = Result<Option<EdgeResponse>>;

/// Everything a middleware receives for one request.
///
/// Cloning is cheap and every clone refers to the same request, response
/// and event. A middleware that modifies `response` and passes is seen by
/// the middleware after it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request: Arc<EdgeRequest>,
    /// Response in flight. Top-level chains start from `EdgeResponse::next()`.
    pub response: SharedResponse,
    pub event: FetchEvent,
}

impl RequestContext {
    pub fn new(request: impl Into<Arc<EdgeRequest>>, event: FetchEvent) -> Self {
        Self {
            request: request.into(),
            response: SharedResponse::default(),
            event,
        }
    }

    /// Start from `response` instead of the default "continue" response.
    pub fn with_response(mut self, response: impl Into<SharedResponse>) -> Self {
        self.response = response.into();
        self
    }
}

/// A request handler that may short-circuit the chain.
pub trait Middleware: Send + Sync {
    fn call<'a>(&'a self, ctx: RequestContext) -> BoxFuture<'a, MiddlewareResult>;
}

/// Middleware built from an async closure. See [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

/// Create a middleware from an async closure.
///
/// ```ignore
/// let deny = from_fn(|_ctx| async {
///     Ok(Some(EdgeResponse::respond(StatusCode::FORBIDDEN, "denied")))
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    FnMiddleware { f }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    fn call<'a>(&'a self, ctx: RequestContext) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin((self.f)(ctx))
    }
}

/// Runs the inner middleware only when the matcher accepts the request.
///
/// A rejected request yields `Ok(None)`, so the chain continues.
pub struct GuardedMiddleware {
    middleware: Arc<dyn Middleware>,
    matcher: Arc<dyn Matcher>,
}

impl GuardedMiddleware {
    pub fn new(middleware: Arc<dyn Middleware>, matcher: Arc<dyn Matcher>) -> Self {
        Self { middleware, matcher }
    }
}

impl Middleware for GuardedMiddleware {
    fn call<'a>(&'a self, ctx: RequestContext) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            if self.matcher.matches(Arc::clone(&ctx.request)).await? {
                self.middleware.call(ctx).await
            } else {
                tracing::debug!(
                    path = %ctx.request.path(),
                    matcher = ?self.matcher,
                    "Matcher rejected request, skipping middleware"
                );
                Ok(None)
            }
        })
    }
}

/// A middleware registration.
#[derive(Clone)]
pub enum MiddlewareSpec {
    /// Always runs.
    Handler(Arc<dyn Middleware>),
    /// Runs only for requests accepted by the matcher(s).
    WithMatcher {
        middleware: Arc<dyn Middleware>,
        matcher: OneOrMany<MatcherSpec>,
    },
    /// Neither of the above; carries a description of what was passed.
    /// Dropped with a diagnostic.
    Unsupported(String),
}

impl MiddlewareSpec {
    pub fn handler(middleware: impl Middleware + 'static) -> Self {
        MiddlewareSpec::Handler(Arc::new(middleware))
    }

    pub fn with_matcher(middleware: impl Middleware + 'static, matcher: impl Into<MatcherSpec>) -> Self {
        MiddlewareSpec::WithMatcher {
            middleware: Arc::new(middleware),
            matcher: OneOrMany::One(matcher.into()),
        }
    }

    /// Gate on several matchers; all of them must accept the request.
    pub fn with_matchers(middleware: impl Middleware + 'static, matchers: Vec<MatcherSpec>) -> Self {
        MiddlewareSpec::WithMatcher {
            middleware: Arc::new(middleware),
            matcher: OneOrMany::Many(matchers),
        }
    }

    pub fn unsupported(value: impl fmt::Debug) -> Self {
        MiddlewareSpec::Unsupported(format!("{:?}", value))
    }
}

impl fmt::Debug for MiddlewareSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareSpec::Handler(_) => f.write_str("Handler(..)"),
            MiddlewareSpec::WithMatcher { matcher, .. } => f
                .debug_struct("WithMatcher")
                .field("matcher", matcher)
                .finish_non_exhaustive(),
            MiddlewareSpec::Unsupported(value) => f.debug_tuple("Unsupported").field(value).finish(),
        }
    }
}
