//! Error types shared by the matcher and composition engines.

use thiserror::Error;

/// Boxed error produced by user supplied middleware or matchers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that escape the engine.
///
/// Malformed registrations never show up here: they are dropped and reported
/// as [`Diagnostic`](crate::diagnostics::Diagnostic)s instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A path pattern matcher that does not start with `/`.
    #[error("matcher pattern <{pattern}> must start with a \"/\"")]
    PatternMissingSlash { pattern: String },

    /// A path pattern that could not be compiled.
    #[error("invalid matcher pattern <{pattern}>: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A route condition with a type that cannot be resolved against a request.
    #[error("unable to resolve {kind} -> {key}")]
    UnresolvableCondition { kind: String, key: String },

    /// A middleware or matcher implementation failed.
    #[error("middleware failed: {0}")]
    Handler(#[source] BoxError),
}

impl Error {
    /// Wrap an arbitrary failure raised inside a middleware or matcher.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Error::Handler(err.into())
    }
}
