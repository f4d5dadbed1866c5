//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! matcher / composition engines produce:
//!     → tracing events (dropped registrations, short-circuits, rejects)
//!     → metrics.rs (chain outcomes, dropped registrations)
//!
//! Consumers:
//!     → logging.rs subscriber (stderr, pretty or JSON)
//!     → whatever metrics recorder the host installs
//! ```

pub mod logging;
pub mod metrics;
