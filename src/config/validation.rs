//! Configuration validation.
//!
//! # Responsibilities
//! - Normalize `has` / `missing` clauses, dropping malformed ones with a
//!   diagnostic
//! - Reject configs whose matcher patterns cannot compile, before any chain
//!   is built
//! - Validate observability settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Malformed registrations are diagnostics, not validation errors; only
//!   problems that would fail composition anyway are fatal here

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::{ChainConfig, ConditionEntry, MatcherEntry, OneOrMany, RouteCondition};
use crate::diagnostics::{describe, DiagnosticKind, Diagnostics};
use crate::routing::matcher::compile_source;

/// A fatal problem found in a chain configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// `observability.log_level` is not a valid filter directive.
    #[error("invalid log level `{level}`: {reason}")]
    LogLevel { level: String, reason: String },

    /// A matcher pattern does not compile.
    #[error("middleware[{entry}] matcher[{matcher}]: {source}")]
    Matcher {
        entry: usize,
        matcher: usize,
        source: crate::Error,
    },
}

/// Validate a chain configuration.
pub fn validate_config(config: &ChainConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::LogLevel {
            level: config.observability.log_level.clone(),
            reason: e.to_string(),
        });
    }

    for (entry, middleware) in config.middleware.iter().enumerate() {
        let Some(matchers) = &middleware.matcher else {
            continue;
        };
        for (matcher, spec) in matchers.as_slice().iter().enumerate() {
            let source = match spec {
                MatcherEntry::Pattern(pattern) => pattern,
                MatcherEntry::Config(config) => &config.source,
                MatcherEntry::Unsupported(_) => continue,
            };
            if let Err(source) = compile_source(source) {
                errors.push(ValidationError::Matcher {
                    entry,
                    matcher,
                    source,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Normalize a scalar-or-list of condition entries into valid conditions.
///
/// Entries that are not condition tables, or that break the key/value shape
/// rule, are dropped and reported.
pub fn validate_conditions(
    entries: Option<&OneOrMany<ConditionEntry>>,
    diagnostics: &mut Diagnostics,
) -> Vec<RouteCondition> {
    let Some(entries) = entries else {
        return Vec::new();
    };

    let mut valid = Vec::with_capacity(entries.len());
    for (index, entry) in entries.as_slice().iter().enumerate() {
        let checked = match entry {
            ConditionEntry::Condition(condition) => condition.check().map(|_| condition),
            ConditionEntry::Unsupported(_) => Err("not a route condition".to_string()),
        };

        match checked {
            Ok(condition) => valid.push(condition.clone()),
            Err(reason) => diagnostics.report(DiagnosticKind::Condition, index, reason, describe(entry)),
        }
    }
    valid
}
