//! Diagnostic tracing for autofix runs.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. The one-line
//! result summaries printed by the CLI go to stdout and are unaffected.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. `verbose` raises the crate's own
/// events to `info` when `RUST_LOG` is unset.
///
/// ```bash
/// RUST_LOG=autofix=debug autofix ci
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,autofix=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
