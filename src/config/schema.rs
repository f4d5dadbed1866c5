//! Configuration schema definitions.
//!
//! This module defines the declarative form of a middleware chain. All types
//! derive Serde traits for deserialization from config files.
//!
//! ```toml
//! [observability]
//! log_level = "info"
//!
//! [[middleware]]
//! handler = "deny_all"
//! matcher = "/admin/(.*)"
//!
//! [[middleware]]
//! handler = "beta_banner"
//! matcher = { source = "/app/:path*", has = { type = "cookie", key = "beta" } }
//!
//! [[middleware]]
//! handler = "allow_all"
//! ```

use serde::{Deserialize, Serialize};

pub use crate::routing::condition::{ConditionKind, RouteCondition};

/// Root configuration for a composed middleware chain.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Middleware entries, in execution order.
    pub middleware: Vec<MiddlewareEntry>,
}

/// One registered middleware.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MiddlewareEntry {
    /// Name the handler was registered under.
    pub handler: String,

    /// Optional matcher(s) gating the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<OneOrMany<MatcherEntry>>,
}

/// A matcher as written in configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MatcherEntry {
    /// Path pattern, e.g. `"/about/:path*"`.
    Pattern(String),
    /// Pattern with `has` / `missing` clauses.
    Config(MatcherConfig),
    /// Anything else. Dropped with a diagnostic.
    Unsupported(serde_json::Value),
}

/// Structured matcher: a source pattern plus request conditions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatcherConfig {
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has: Option<OneOrMany<ConditionEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<OneOrMany<ConditionEntry>>,
}

impl MatcherConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            has: None,
            missing: None,
        }
    }

    /// Add a condition that must be present.
    pub fn has(mut self, condition: impl Into<ConditionEntry>) -> Self {
        push_entry(&mut self.has, condition.into());
        self
    }

    /// Add a condition that must be absent.
    pub fn missing(mut self, condition: impl Into<ConditionEntry>) -> Self {
        push_entry(&mut self.missing, condition.into());
        self
    }
}

fn push_entry(slot: &mut Option<OneOrMany<ConditionEntry>>, entry: ConditionEntry) {
    match slot {
        Some(entries) => entries.push(entry),
        None => *slot = Some(OneOrMany::One(entry)),
    }
}

/// A route condition as written in configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConditionEntry {
    Condition(RouteCondition),
    /// Anything that is not a condition table. Dropped with a diagnostic.
    Unsupported(serde_json::Value),
}

impl From<RouteCondition> for ConditionEntry {
    fn from(condition: RouteCondition) -> Self {
        ConditionEntry::Condition(condition)
    }
}

/// A scalar or a list of values.
///
/// `Many` is tried first so that catch-all element types never swallow a
/// whole list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Whether this was written as a list, even a one-element one.
    pub fn is_list(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn push(&mut self, item: T) {
        let items = match std::mem::replace(self, OneOrMany::Many(Vec::new())) {
            OneOrMany::One(first) => vec![first, item],
            OneOrMany::Many(mut items) => {
                items.push(item);
                items
            }
        };
        *self = OneOrMany::Many(items);
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> OneOrMany<U> {
        match self {
            OneOrMany::One(item) => OneOrMany::One(f(item)),
            OneOrMany::Many(items) => OneOrMany::Many(items.into_iter().map(f).collect()),
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directives (overridden by `RUST_LOG`).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_or_many_push() {
        let mut items = OneOrMany::One(1);
        assert!(!items.is_list());
        items.push(2);
        items.push(3);
        assert_eq!(items, OneOrMany::Many(vec![1, 2, 3]));
    }

    #[test]
    fn test_matcher_entry_shapes() {
        let entries: Vec<MatcherEntry> = serde_json::from_str(
            r#"["/about/:path", {"source": "/a", "has": {"type": "header", "key": "x"}}, 42]"#,
        )
        .unwrap();

        assert_eq!(entries[0], MatcherEntry::Pattern("/about/:path".into()));
        assert_eq!(
            entries[1],
            MatcherEntry::Config(MatcherConfig::new("/a").has(RouteCondition::header("x")))
        );
        assert!(matches!(entries[2], MatcherEntry::Unsupported(_)));
    }

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert!(config.middleware.is_empty());
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}
