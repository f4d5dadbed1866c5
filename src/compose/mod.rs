//! Middleware composition subsystem.
//!
//! # Data Flow
//! ```text
//! MiddlewareSpec list (code or registry + ChainConfig)
//!     → chain.rs (drop invalid entries, bind matchers as guards)
//!     → ComposedMiddleware (immutable, shared via Arc)
//!     → per request: run in order, stop at first response
//! ```
//!
//! # Design Decisions
//! - A composed chain is itself a [`Middleware`], so chains nest
//! - Construction never fails on malformed registrations; they are dropped
//!   and kept as diagnostics

pub mod chain;
pub mod middleware;
pub mod registry;

pub use chain::{compose_middlewares, ChainOutcome, ComposedMiddleware};
pub use middleware::{
    from_fn, GuardedMiddleware, Middleware, MiddlewareResult, MiddlewareSpec, RequestContext,
};
pub use registry::HandlerRegistry;
