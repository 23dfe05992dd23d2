//! Diagnostic tracing for the station CLI.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. It is separate from
//! operator-facing console output and from the results written to the store.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn` when unset.
///
/// # Example
/// ```bash
/// RUST_LOG=station=debug station run --target 4
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
