//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries and host processes
//! - Select pretty or JSON output
//! - Honor `RUST_LOG`, falling back to the configured level
//! - Write to stderr, keeping stdout free for command output
//!
//! Library code only emits `tracing` events; it never installs a subscriber
//! on its own.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Install a global subscriber according to `config`.
///
/// Fails if a global subscriber has already been set.
pub fn init_tracing(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init()
}
