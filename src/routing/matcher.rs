//! Request matching.
//!
//! # Responsibilities
//! - Normalize predicate, path-pattern and structured matcher specs into a
//!   single [`Matcher`]
//! - Match the request path against compiled patterns
//! - Evaluate `has` / `missing` conditions
//! - Combine multiple matchers with AND semantics
//!
//! # Design Decisions
//! - Patterns are compiled once, at composition time
//! - A pattern that does not start with `/` fails composition
//! - Invalid specs are dropped with a diagnostic; no valid spec means "no
//!   matcher", which callers treat as always matching
//! - A single valid matcher is returned as-is, without an AND wrapper

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::schema::{MatcherConfig, MatcherEntry, OneOrMany};
use crate::config::validation::validate_conditions;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{Error, Result};
use crate::http::EdgeRequest;
use crate::routing::condition::RouteCondition;
use crate::routing::pattern::PathPattern;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Resolves to true if the request matches.
    fn matches<'a>(&'a self, req: Arc<EdgeRequest>) -> BoxFuture<'a, Result<bool>>;
}

/// Adapts an async closure into a [`Matcher`].
pub struct FnMatcher<F> {
    f: F,
}

impl<F> FnMatcher<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnMatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMatcher").finish_non_exhaustive()
    }
}

impl<F, Fut> Matcher for FnMatcher<F>
where
    F: Fn(Arc<EdgeRequest>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    fn matches<'a>(&'a self, req: Arc<EdgeRequest>) -> BoxFuture<'a, Result<bool>> {
        Box::pin((self.f)(req))
    }
}

/// Matches the request path against a compiled pattern.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: PathPattern,
}

impl PatternMatcher {
    pub fn new(pattern: PathPattern) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    fn is_match(&self, req: &EdgeRequest) -> bool {
        self.pattern.is_match(req.path())
    }
}

impl Matcher for PatternMatcher {
    fn matches<'a>(&'a self, req: Arc<EdgeRequest>) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { Ok(self.is_match(&req)) })
    }
}

/// Matches a path pattern plus `has` / `missing` conditions.
#[derive(Debug, Clone)]
pub struct ConfigMatcher {
    source: PatternMatcher,
    has: Vec<RouteCondition>,
    missing: Vec<RouteCondition>,
}

impl ConfigMatcher {
    pub fn new(source: PathPattern, has: Vec<RouteCondition>, missing: Vec<RouteCondition>) -> Self {
        Self {
            source: PatternMatcher::new(source),
            has,
            missing,
        }
    }

    fn evaluate(&self, req: &EdgeRequest) -> Result<bool> {
        if !self.source.is_match(req) {
            return Ok(false);
        }

        for condition in &self.has {
            if !condition.is_satisfied_by(req)? {
                return Ok(false);
            }
        }

        for condition in &self.missing {
            if !condition.is_absent_from(req)? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl Matcher for ConfigMatcher {
    fn matches<'a>(&'a self, req: Arc<EdgeRequest>) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { self.evaluate(&req) })
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AllMatcher {
    matchers: Vec<Arc<dyn Matcher>>,
}

impl AllMatcher {
    pub fn new(matchers: Vec<Arc<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AllMatcher {
    fn matches<'a>(&'a self, req: Arc<EdgeRequest>) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            // Stops at the first rejection.
            for matcher in &self.matchers {
                if !matcher.matches(Arc::clone(&req)).await? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }
}

/// A matcher as registered by callers.
#[derive(Debug, Clone)]
pub enum MatcherSpec {
    /// Arbitrary predicate.
    Predicate(Arc<dyn Matcher>),
    /// Path pattern, e.g. `/about/:path*`.
    Pattern(String),
    /// Path pattern with `has` / `missing` conditions.
    Config(MatcherConfig),
    /// A value that is none of the above. Dropped with a diagnostic.
    Unsupported(serde_json::Value),
}

impl MatcherSpec {
    /// Wrap an async predicate.
    pub fn predicate<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<EdgeRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        MatcherSpec::Predicate(Arc::new(FnMatcher::new(f)))
    }

    fn describe(&self) -> String {
        match self {
            MatcherSpec::Predicate(m) => format!("{:?}", m),
            MatcherSpec::Pattern(p) => format!("{:?}", p),
            MatcherSpec::Config(c) => crate::diagnostics::describe(c),
            MatcherSpec::Unsupported(value) => value.to_string(),
        }
    }
}

impl From<&str> for MatcherSpec {
    fn from(pattern: &str) -> Self {
        MatcherSpec::Pattern(pattern.to_string())
    }
}

impl From<String> for MatcherSpec {
    fn from(pattern: String) -> Self {
        MatcherSpec::Pattern(pattern)
    }
}

impl From<MatcherConfig> for MatcherSpec {
    fn from(config: MatcherConfig) -> Self {
        MatcherSpec::Config(config)
    }
}

impl From<MatcherEntry> for MatcherSpec {
    fn from(entry: MatcherEntry) -> Self {
        match entry {
            MatcherEntry::Pattern(pattern) => MatcherSpec::Pattern(pattern),
            MatcherEntry::Config(config) => MatcherSpec::Config(config),
            MatcherEntry::Unsupported(value) => MatcherSpec::Unsupported(value),
        }
    }
}

/// Compile a matcher source pattern, enforcing the leading `/`.
pub fn compile_source(pattern: &str) -> Result<PathPattern> {
    if !pattern.starts_with('/') {
        return Err(Error::PatternMissingSlash {
            pattern: pattern.to_string(),
        });
    }
    PathPattern::compile(pattern)
}

fn compose_pattern(pattern: &str) -> Result<PatternMatcher> {
    compile_source(pattern).map(PatternMatcher::new)
}

fn compose_config(config: &MatcherConfig, diagnostics: &mut Diagnostics) -> Result<Arc<dyn Matcher>> {
    let has = validate_conditions(config.has.as_ref(), diagnostics);
    let missing = validate_conditions(config.missing.as_ref(), diagnostics);
    let source = compile_source(&config.source)?;

    if has.is_empty() && missing.is_empty() {
        return Ok(Arc::new(PatternMatcher::new(source)));
    }

    Ok(Arc::new(ConfigMatcher::new(source, has, missing)))
}

fn normalize_one(spec: &MatcherSpec, diagnostics: &mut Diagnostics) -> Result<Option<Arc<dyn Matcher>>> {
    let matcher: Arc<dyn Matcher> = match spec {
        MatcherSpec::Predicate(m) => Arc::clone(m),
        MatcherSpec::Pattern(pattern) => Arc::new(compose_pattern(pattern)?),
        MatcherSpec::Config(config) => compose_config(config, diagnostics)?,
        MatcherSpec::Unsupported(_) => return Ok(None),
    };
    Ok(Some(matcher))
}

/// Normalize one or many matcher specs into a single matcher.
///
/// Returns `Ok(None)` when no valid matcher remains; callers treat that as
/// matching every request. Fails only on patterns that cannot compile.
pub fn compose_matchers(
    specs: &OneOrMany<MatcherSpec>,
    diagnostics: &mut Diagnostics,
) -> Result<Option<Arc<dyn Matcher>>> {
    let mut matchers = Vec::with_capacity(specs.len());

    for (index, spec) in specs.as_slice().iter().enumerate() {
        match normalize_one(spec, diagnostics)? {
            Some(matcher) => matchers.push(matcher),
            None => diagnostics.report(
                DiagnosticKind::Matcher,
                index,
                "not a predicate, path pattern or matcher config",
                spec.describe(),
            ),
        }
    }

    Ok(match matchers.len() {
        0 => None,
        1 => matchers.pop(),
        _ => Some(Arc::new(AllMatcher::new(matchers))),
    })
}
