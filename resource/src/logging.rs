//! Diagnostics for the resource commands.
//!
//! Everything goes to stderr: stdout carries only the JSON response read by
//! the CI system, so a stray log line there would corrupt it.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`. Compact format on stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=tfe_resource=debug tfe-resource check < payload.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
