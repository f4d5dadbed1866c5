//! Middleware chain composition and execution.
//!
//! # Responsibilities
//! - Normalize middleware registrations, dropping invalid ones
//! - Bind matchers as guards
//! - Run middleware strictly in registration order, stopping at the first
//!   response
//! - Distinguish top-level from nested invocation when the chain runs out
//!
//! # Design Decisions
//! - The validated list is immutable; a chain is shared across requests
//!   without locks
//! - Top-level exhaustion yields the default "continue" response so the
//!   host always gets an answer; nested exhaustion yields nothing so the
//!   enclosing chain keeps going
//! - Middleware and matcher errors propagate unchanged

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::compose::middleware::{
    GuardedMiddleware, Middleware, MiddlewareResult, MiddlewareSpec, RequestContext,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::Result;
use crate::http::{EdgeRequest, EdgeResponse, FetchEvent};
use crate::observability::metrics;
use crate::routing::matcher::compose_matchers;

/// How a chain run terminated.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// The middleware at `position` answered; later ones never ran.
    ShortCircuited {
        position: usize,
        response: EdgeResponse,
    },
    /// Every middleware passed.
    Exhausted,
}

impl ChainOutcome {
    pub fn into_response(self) -> Option<EdgeResponse> {
        match self {
            ChainOutcome::ShortCircuited { response, .. } => Some(response),
            ChainOutcome::Exhausted => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ChainOutcome::ShortCircuited { .. } => "short_circuited",
            ChainOutcome::Exhausted => "exhausted",
        }
    }
}

/// A composed middleware chain.
pub struct ComposedMiddleware {
    middlewares: Vec<Arc<dyn Middleware>>,
    diagnostics: Diagnostics,
}

impl ComposedMiddleware {
    /// Number of middleware that survived validation.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Registrations dropped while composing this chain.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Top-level entry point, called by the host for each request.
    ///
    /// Always produces a response: the first middleware answer, or the
    /// in-flight response (a "continue" plus whatever the middleware set on
    /// it) when every middleware passed.
    pub async fn handle(
        &self,
        request: impl Into<Arc<EdgeRequest>>,
        event: FetchEvent,
    ) -> Result<EdgeResponse> {
        let ctx = RequestContext::new(request, event);
        let outcome = observe("top_level", self.run(&ctx).await)?;

        Ok(match outcome {
            ChainOutcome::ShortCircuited { response, .. } => response,
            ChainOutcome::Exhausted => ctx.response.snapshot(),
        })
    }

    /// Nested entry point, used when this chain runs inside another one.
    ///
    /// Reuses the caller's request, in-flight response and event, and
    /// returns `None` when every middleware passed. Changes made to the
    /// in-flight response stay visible to the caller.
    pub async fn handle_nested(&self, ctx: RequestContext) -> MiddlewareResult {
        let outcome = observe("nested", self.run(&ctx).await)?;
        Ok(outcome.into_response())
    }

    /// Run every middleware in order until one answers.
    pub async fn run(&self, ctx: &RequestContext) -> Result<ChainOutcome> {
        for (position, middleware) in self.middlewares.iter().enumerate() {
            if let Some(response) = middleware.call(ctx.clone()).await? {
                tracing::debug!(
                    position,
                    path = %ctx.request.path(),
                    action = ?response.action(),
                    "Middleware short-circuited chain"
                );
                return Ok(ChainOutcome::ShortCircuited { position, response });
            }
        }

        Ok(ChainOutcome::Exhausted)
    }
}

fn observe(mode: &'static str, outcome: Result<ChainOutcome>) -> Result<ChainOutcome> {
    match &outcome {
        Ok(o) => metrics::record_chain_outcome(mode, o.label()),
        Err(e) => {
            tracing::debug!(mode, error = %e, "Middleware chain failed");
            metrics::record_chain_outcome(mode, "failed");
        }
    }
    outcome
}

impl Middleware for ComposedMiddleware {
    fn call<'a>(&'a self, ctx: RequestContext) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(self.handle_nested(ctx))
    }
}

impl fmt::Debug for ComposedMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares", &self.middlewares.len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

fn normalize_one(
    index: usize,
    spec: MiddlewareSpec,
    diagnostics: &mut Diagnostics,
) -> Result<Option<Arc<dyn Middleware>>> {
    let middleware = match spec {
        MiddlewareSpec::Handler(middleware) => middleware,
        MiddlewareSpec::WithMatcher { middleware, matcher } => {
            match compose_matchers(&matcher, diagnostics)? {
                Some(matcher) => Arc::new(GuardedMiddleware::new(middleware, matcher)),
                None => middleware,
            }
        }
        MiddlewareSpec::Unsupported(value) => {
            diagnostics.report(
                DiagnosticKind::Middleware,
                index,
                "not a handler or a handler/matcher pair",
                value,
            );
            return Ok(None);
        }
    };
    Ok(Some(middleware))
}

/// Compose middleware registrations into a single chain.
///
/// Invalid registrations are dropped and recorded in
/// [`ComposedMiddleware::diagnostics`]. Fails only when a matcher pattern
/// cannot be compiled.
pub fn compose_middlewares<I>(specs: I) -> Result<ComposedMiddleware>
where
    I: IntoIterator<Item = MiddlewareSpec>,
{
    let mut diagnostics = Diagnostics::new();
    let mut middlewares = Vec::new();

    for (index, spec) in specs.into_iter().enumerate() {
        if let Some(middleware) = normalize_one(index, spec, &mut diagnostics)? {
            middlewares.push(middleware);
        }
    }

    tracing::debug!(
        registered = middlewares.len(),
        dropped = diagnostics.of_kind(DiagnosticKind::Middleware).count(),
        "Composed middleware chain"
    );

    Ok(ComposedMiddleware {
        middlewares,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::{HeaderValue, Request, StatusCode};

    use crate::compose::middleware::from_fn;
    use crate::config::schema::{MatcherConfig, OneOrMany};
    use crate::error::Error;
    use crate::routing::condition::RouteCondition;
    use crate::routing::matcher::MatcherSpec;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn request(uri: &str) -> EdgeRequest {
        EdgeRequest::from(&Request::builder().uri(uri).body(()).unwrap())
    }

    fn passing(name: &'static str, log: &Log) -> impl Middleware {
        let log = log.clone();
        from_fn(move |_ctx| {
            log.lock().unwrap().push(name);
            async { Ok(None) }
        })
    }

    fn answering(name: &'static str, log: &Log) -> impl Middleware {
        let log = log.clone();
        from_fn(move |_ctx| {
            log.lock().unwrap().push(name);
            async move { Ok(Some(EdgeResponse::respond(StatusCode::OK, name))) }
        })
    }

    fn body_of(response: &EdgeResponse) -> Option<&[u8]> {
        match response.action() {
            crate::http::ResponseAction::Respond { body, .. } => Some(body.as_ref()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_runs_in_registration_order() {
        let log = Log::default();
        let chain = compose_middlewares([
            MiddlewareSpec::handler(passing("a", &log)),
            MiddlewareSpec::handler(passing("b", &log)),
            MiddlewareSpec::handler(passing("c", &log)),
        ])
        .unwrap();

        chain.handle(request("/"), FetchEvent::default()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_response() {
        let log = Log::default();
        let chain = compose_middlewares([
            MiddlewareSpec::handler(passing("a", &log)),
            MiddlewareSpec::handler(answering("b", &log)),
            MiddlewareSpec::handler(answering("c", &log)),
        ])
        .unwrap();

        let response = chain.handle(request("/"), FetchEvent::default()).await.unwrap();
        assert_eq!(body_of(&response), Some(&b"b"[..]));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);

        let ctx = RequestContext::new(request("/"), FetchEvent::default());
        let outcome = chain.run(&ctx).await.unwrap();
        assert!(matches!(outcome, ChainOutcome::ShortCircuited { position: 1, .. }));
    }

    #[tokio::test]
    async fn test_top_level_exhaustion_returns_default() {
        let log = Log::default();
        let chain = compose_middlewares([
            MiddlewareSpec::handler(passing("a", &log)),
            MiddlewareSpec::handler(passing("b", &log)),
        ])
        .unwrap();

        let response = chain.handle(request("/"), FetchEvent::default()).await.unwrap();
        assert!(response.is_next());
    }

    #[tokio::test]
    async fn test_nested_exhaustion_returns_nothing() {
        let log = Log::default();
        let chain = compose_middlewares([
            MiddlewareSpec::handler(passing("a", &log)),
            MiddlewareSpec::handler(passing("b", &log)),
        ])
        .unwrap();

        let ctx = RequestContext::new(request("/"), FetchEvent::default());
        assert!(chain.handle_nested(ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nested_reuses_caller_response() {
        let chain = compose_middlewares([MiddlewareSpec::handler(from_fn(|ctx: RequestContext| async move {
            Ok(Some(ctx.response.snapshot()))
        }))])
        .unwrap();

        let ctx = RequestContext::new(request("/"), FetchEvent::default())
            .with_response(EdgeResponse::rewrite("/elsewhere"));
        let response = chain.handle_nested(ctx).await.unwrap().unwrap();
        assert_eq!(response, EdgeResponse::rewrite("/elsewhere"));
    }

    #[tokio::test]
    async fn test_matcher_gates_middleware() {
        let log = Log::default();
        let chain = compose_middlewares([MiddlewareSpec::with_matcher(
            answering("about", &log),
            "/about/:path",
        )])
        .unwrap();

        let hit = chain.handle(request("/about/x"), FetchEvent::default()).await.unwrap();
        assert_eq!(body_of(&hit), Some(&b"about"[..]));

        let miss = chain.handle(request("/other"), FetchEvent::default()).await.unwrap();
        assert!(miss.is_next());
        assert_eq!(*log.lock().unwrap(), vec!["about"]);
    }

    #[tokio::test]
    async fn test_has_and_missing_gate() {
        let log = Log::default();
        let has = compose_middlewares([MiddlewareSpec::with_matcher(
            answering("flagged", &log),
            MatcherConfig::new("/(.*)").has(RouteCondition::header("x-flag")),
        )])
        .unwrap();
        let missing = compose_middlewares([MiddlewareSpec::with_matcher(
            answering("unflagged", &log),
            MatcherConfig::new("/(.*)").missing(RouteCondition::header("x-flag")),
        )])
        .unwrap();

        let flagged = || {
            EdgeRequest::from(&Request::builder().uri("/x").header("x-flag", "1").body(()).unwrap())
        };

        assert!(!has.handle(flagged(), FetchEvent::default()).await.unwrap().is_next());
        assert!(has.handle(request("/x"), FetchEvent::default()).await.unwrap().is_next());
        assert!(missing.handle(flagged(), FetchEvent::default()).await.unwrap().is_next());
        assert!(!missing.handle(request("/x"), FetchEvent::default()).await.unwrap().is_next());
    }

    #[tokio::test]
    async fn test_invalid_registrations_are_dropped() {
        let log = Log::default();
        let with_invalid = compose_middlewares([
            MiddlewareSpec::unsupported(42),
            MiddlewareSpec::handler(answering("valid", &log)),
        ])
        .unwrap();
        let without = compose_middlewares([MiddlewareSpec::handler(answering("valid", &log))]).unwrap();

        assert_eq!(with_invalid.len(), 1);
        assert_eq!(with_invalid.diagnostics().len(), 1);
        let diagnostic = with_invalid.diagnostics().iter().next().unwrap();
        assert_eq!((diagnostic.kind, diagnostic.index), (DiagnosticKind::Middleware, 0));
        assert_eq!(diagnostic.value, "42");

        let a = with_invalid.handle(request("/"), FetchEvent::default()).await.unwrap();
        let b = without.handle(request("/"), FetchEvent::default()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_all_invalid_matchers_means_always_run() {
        let log = Log::default();
        let chain = compose_middlewares([MiddlewareSpec::with_matchers(
            answering("always", &log),
            vec![MatcherSpec::Unsupported(serde_json::json!(false))],
        )])
        .unwrap();

        assert!(!chain.handle(request("/anything"), FetchEvent::default()).await.unwrap().is_next());
        assert_eq!(chain.diagnostics().of_kind(DiagnosticKind::Matcher).count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_pattern_fails_composition() {
        let log = Log::default();
        let result = compose_middlewares([MiddlewareSpec::with_matcher(passing("a", &log), "admin")]);
        assert!(matches!(result, Err(Error::PatternMissingSlash { .. })));
    }

    #[tokio::test]
    async fn test_nested_chain_inside_chain() {
        let log = Log::default();
        let inner = compose_middlewares([
            MiddlewareSpec::handler(passing("inner-a", &log)),
            MiddlewareSpec::with_matcher(answering("deny", &log), "/admin/(.*)"),
        ])
        .unwrap();
        let outer = compose_middlewares([
            MiddlewareSpec::handler(inner),
            MiddlewareSpec::handler(answering("allow", &log)),
        ])
        .unwrap();

        let admin = outer.handle(request("/admin/users"), FetchEvent::default()).await.unwrap();
        assert_eq!(body_of(&admin), Some(&b"deny"[..]));

        let public = outer.handle(request("/public"), FetchEvent::default()).await.unwrap();
        assert_eq!(body_of(&public), Some(&b"allow"[..]));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["inner-a", "deny", "inner-a", "allow"]
        );
    }

    #[tokio::test]
    async fn test_middleware_errors_propagate() {
        let log = Log::default();
        let chain = compose_middlewares([
            MiddlewareSpec::handler(from_fn(|_ctx| async { Err(Error::handler("boom")) })),
            MiddlewareSpec::handler(answering("after", &log)),
        ])
        .unwrap();

        let result = chain.handle(request("/"), FetchEvent::default()).await;
        assert!(matches!(result, Err(Error::Handler(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_matchers_must_all_accept() {
        let log = Log::default();
        let chain = compose_middlewares([MiddlewareSpec::WithMatcher {
            middleware: Arc::new(answering("both", &log)),
            matcher: OneOrMany::Many(vec![
                MatcherSpec::from("/shop/:path*"),
                MatcherSpec::Config(MatcherConfig::new("/(.*)").has(RouteCondition::cookie("cart"))),
            ]),
        }])
        .unwrap();

        let without_cookie = chain.handle(request("/shop/item"), FetchEvent::default()).await.unwrap();
        assert!(without_cookie.is_next());

        let with_cookie = EdgeRequest::from(
            &Request::builder()
                .uri("/shop/item")
                .header("Cookie", "cart=1")
                .body(())
                .unwrap(),
        );
        let response = chain.handle(with_cookie, FetchEvent::default()).await.unwrap();
        assert_eq!(body_of(&response), Some(&b"both"[..]));
    }

    fn tagging(name: &'static str) -> impl Middleware {
        from_fn(move |ctx: RequestContext| {
            ctx.response
                .lock()
                .headers_mut()
                .append("x-seen-by", HeaderValue::from_static(name));
            async { Ok(None) }
        })
    }

    fn seen_by(response: &EdgeResponse) -> Vec<&str> {
        response
            .headers()
            .get_all("x-seen-by")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    #[tokio::test]
    async fn test_in_flight_response_is_shared_down_the_chain() {
        let chain = compose_middlewares([
            MiddlewareSpec::handler(tagging("first")),
            MiddlewareSpec::handler(from_fn(|ctx: RequestContext| async move {
                let seen = ctx.response.lock().headers().contains_key("x-seen-by");
                assert!(seen, "header set by the first middleware is missing");
                Ok(None)
            })),
            MiddlewareSpec::handler(tagging("third")),
        ])
        .unwrap();

        let response = chain.handle(request("/"), FetchEvent::default()).await.unwrap();
        assert!(response.is_next());
        assert_eq!(seen_by(&response), vec!["first", "third"]);
    }

    #[tokio::test]
    async fn test_nested_chain_modifies_caller_response() {
        let inner = compose_middlewares([MiddlewareSpec::handler(tagging("inner"))]).unwrap();
        let ctx = RequestContext::new(request("/"), FetchEvent::default());

        assert!(inner.handle_nested(ctx.clone()).await.unwrap().is_none());
        assert_eq!(seen_by(&ctx.response.snapshot()), vec!["inner"]);

        let outer = compose_middlewares([
            MiddlewareSpec::handler(tagging("outer")),
            MiddlewareSpec::handler(inner),
        ])
        .unwrap();
        let response = outer.handle(request("/"), FetchEvent::default()).await.unwrap();
        assert_eq!(seen_by(&response), vec!["outer", "inner"]);
    }
}
