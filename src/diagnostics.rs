//! Non-fatal registration diagnostics.
//!
//! Invalid middleware, matcher and condition registrations are dropped rather
//! than failing construction. Each drop is logged as a warning and collected
//! here so callers (and tests) can inspect what was discarded.

use std::fmt;

use serde::Serialize;

use crate::observability::metrics;

/// What kind of registration was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Middleware,
    Matcher,
    Condition,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Middleware => "middleware",
            DiagnosticKind::Matcher => "matcher",
            DiagnosticKind::Condition => "condition",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dropped registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Position of the offending entry within its list (0 for scalars).
    pub index: usize,
    pub reason: String,
    /// Human readable rendering of the value that was passed.
    pub value: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}[{}]: {} ({})",
            self.kind, self.index, self.reason, self.value
        )
    }
}

/// Ordered collection of diagnostics gathered while composing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dropped registration and emit it as a warning.
    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        index: usize,
        reason: impl Into<String>,
        value: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            index,
            reason: reason.into(),
            value: value.into(),
        };

        tracing::warn!(
            kind = %diagnostic.kind,
            index = diagnostic.index,
            value = %diagnostic.value,
            "Dropping invalid {} registration: {}",
            diagnostic.kind,
            diagnostic.reason
        );
        metrics::record_dropped_registration(kind);

        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Diagnostics of a single kind, in report order.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Render a registered value for a diagnostic, as JSON when possible.
pub(crate) fn describe<T: Serialize + fmt::Debug>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}
