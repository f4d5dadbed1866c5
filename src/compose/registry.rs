//! Named middleware handlers for config-driven chains.
//!
//! Config files can only name handlers; the registry maps those names to
//! middleware supplied by the embedding application.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::compose::chain::{compose_middlewares, ComposedMiddleware};
use crate::compose::middleware::{Middleware, MiddlewareSpec};
use crate::config::schema::ChainConfig;
use crate::error::Result;
use crate::routing::matcher::MatcherSpec;

/// Handlers available to a [`ChainConfig`], keyed by name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Middleware>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware + 'static) {
        self.handlers.insert(name.into(), Arc::new(middleware));
    }

    pub fn with(mut self, name: impl Into<String>, middleware: impl Middleware + 'static) -> Self {
        self.register(name, middleware);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.handlers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Turn config entries into registrations, in config order.
    ///
    /// Unknown handler names become unsupported registrations so the chain
    /// drops them with a diagnostic at the same index.
    pub fn specs(&self, config: &ChainConfig) -> Vec<MiddlewareSpec> {
        config
            .middleware
            .iter()
            .map(|entry| match (self.get(&entry.handler), &entry.matcher) {
                (None, _) => MiddlewareSpec::Unsupported(format!("unknown handler {:?}", entry.handler)),
                (Some(middleware), None) => MiddlewareSpec::Handler(middleware),
                (Some(middleware), Some(matcher)) => MiddlewareSpec::WithMatcher {
                    middleware,
                    matcher: matcher.clone().map(MatcherSpec::from),
                },
            })
            .collect()
    }

    /// Build a chain from a config.
    pub fn compose(&self, config: &ChainConfig) -> Result<ComposedMiddleware> {
        compose_middlewares(self.specs(config))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    use crate::compose::middleware::from_fn;
    use crate::config::schema::{MatcherEntry, MiddlewareEntry, OneOrMany};
    use crate::diagnostics::DiagnosticKind;
    use crate::http::{EdgeRequest, EdgeResponse, FetchEvent};

    fn registry() -> HandlerRegistry {
        HandlerRegistry::new()
            .with(
                "deny",
                from_fn(|_ctx| async { Ok(Some(EdgeResponse::respond(StatusCode::FORBIDDEN, "denied"))) }),
            )
            .with("pass", from_fn(|_ctx| async { Ok(None) }))
    }

    fn request(uri: &str) -> EdgeRequest {
        EdgeRequest::from(&Request::builder().uri(uri).body(()).unwrap())
    }

    #[tokio::test]
    async fn test_compose_from_config() {
        let mut config = ChainConfig::default();
        config.middleware = vec![
            MiddlewareEntry {
                handler: "pass".into(),
                matcher: None,
            },
            MiddlewareEntry {
                handler: "deny".into(),
                matcher: Some(OneOrMany::One(MatcherEntry::Pattern("/admin/:path*".into()))),
            },
        ];

        let chain = registry().compose(&config).unwrap();
        assert_eq!(chain.len(), 2);

        let denied = chain.handle(request("/admin/users"), FetchEvent::default()).await.unwrap();
        assert!(!denied.is_next());
        let open = chain.handle(request("/home"), FetchEvent::default()).await.unwrap();
        assert!(open.is_next());
    }

    #[test]
    fn test_unknown_handler_is_dropped() {
        let mut config = ChainConfig::default();
        config.middleware = vec![
            MiddlewareEntry {
                handler: "missing".into(),
                matcher: None,
            },
            MiddlewareEntry {
                handler: "pass".into(),
                matcher: None,
            },
        ];

        let chain = registry().compose(&config).unwrap();
        assert_eq!(chain.len(), 1);
        let dropped: Vec<_> = chain.diagnostics().of_kind(DiagnosticKind::Middleware).collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].index, 0);
        assert!(dropped[0].value.contains("missing"));
    }

    #[test]
    fn test_debug_lists_names() {
        assert_eq!(
            format!("{:?}", registry()),
            r#"HandlerRegistry { handlers: ["deny", "pass"] }"#
        );
    }
}
