//! Metrics emitted through the `metrics` facade.
//!
//! # Metrics
//! - `edge_middleware_chain_total` (counter): chain runs by outcome
//!   (`short_circuited`, `exhausted`, `failed`) and invocation mode
//! - `edge_middleware_dropped_registrations_total` (counter): invalid
//!   registrations discarded at composition time, by kind
//!
//! Installing a recorder/exporter is left to the host process.

use crate::diagnostics::DiagnosticKind;

/// Record how a chain run terminated.
pub fn record_chain_outcome(mode: &'static str, outcome: &'static str) {
    ::metrics::counter!(
        "edge_middleware_chain_total",
        "mode" => mode,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a registration dropped during composition.
pub fn record_dropped_registration(kind: DiagnosticKind) {
    ::metrics::counter!(
        "edge_middleware_dropped_registrations_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}
