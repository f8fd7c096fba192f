//! Development-time tracing for debugging the CLI.
//!
//! Diagnostics go to stderr via `RUST_LOG`; the document and JSON reports on
//! stdout are the product output and are never mixed with log lines.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=markform=debug markform fill intake.md
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
