//! Request/response model and host integration.
//!
//! # Data Flow
//! ```text
//! axum Request
//!     → layer.rs (snapshot into EdgeRequest, create FetchEvent)
//!     → ComposedMiddleware::handle
//!     → EdgeResponse
//!     → layer.rs (continue, rewrite, redirect or answer)
//! ```

pub mod classify;
pub mod event;
pub mod layer;
pub mod request;
pub mod response;

pub use event::FetchEvent;
pub use layer::edge_middleware;
pub use request::EdgeRequest;
pub use response::{EdgeResponse, ResponseAction, SharedResponse};
