//! Matcher engine.
//!
//! # Data Flow
//! ```text
//! MatcherSpec | [MatcherSpec]
//!     → matcher.rs (normalize each spec, drop invalid ones)
//!         → pattern.rs (compile path patterns, once)
//!         → condition.rs (validate has / missing clauses)
//!     → Option<Arc<dyn Matcher>>
//!
//! Per request:
//!     EdgeRequest → Matcher::matches → bool
//! ```
//!
//! # Design Decisions
//! - Matchers are compiled at composition time, immutable afterwards
//! - Only the path is tested by patterns; conditions read headers, cookies,
//!   query parameters and host
//! - Multiple matchers combine with short-circuit AND

pub mod condition;
pub mod matcher;
pub mod pattern;

pub use condition::{ConditionKind, RouteCondition};
pub use matcher::{compose_matchers, Matcher, MatcherSpec};
pub use pattern::PathPattern;
