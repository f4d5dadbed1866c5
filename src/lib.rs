//! Edge middleware composition for axum services.
//!
//! Build one request handler out of many: each middleware either answers
//! (short-circuiting the rest) or passes, and may be gated by matchers that
//! test the request path, headers, cookies, query parameters and host.
//!
//! # Architecture Overview
//!
//! ```text
//!     MiddlewareSpec list ──▶ compose ──▶ ComposedMiddleware
//!                               │               │
//!                               ▼               │ per request
//!                           routing             ▼
//!                      (path patterns,    ┌───────────┐   first answer
//!                       has / missing) ──▶│ guard  m1 │──────────────▶ EdgeResponse
//!                                         │ guard  m2 │
//!                                         │   ...     │   exhausted
//!                                         └───────────┘──────────────▶ next()
//! ```
//!
//! - [`routing`]: path patterns, route conditions, matcher composition
//! - [`compose`]: middleware chains, nesting, named handler registry
//! - [`http`]: request/response model and the axum adapter
//! - [`config`]: TOML chain definitions
//! - [`diagnostics`]: registrations dropped during composition
//! - [`observability`]: logging and metrics

pub mod compose;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod http;
pub mod observability;
pub mod routing;

pub use compose::{
    compose_middlewares, from_fn, ComposedMiddleware, HandlerRegistry, Middleware,
    MiddlewareResult, MiddlewareSpec, RequestContext,
};
pub use config::ChainConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{BoxError, Error, Result};
pub use http::{
    edge_middleware, EdgeRequest, EdgeResponse, FetchEvent, ResponseAction, SharedResponse,
};
pub use routing::{compose_matchers, Matcher, MatcherSpec, PathPattern};
