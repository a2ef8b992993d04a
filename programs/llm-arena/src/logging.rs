//! Diagnostics via `tracing`.
//!
//! Match output (rounds, summary) goes to stdout through the reporter;
//! everything here goes to stderr and is controlled by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset, which still shows
/// random fallbacks for language-model agents.
///
/// # Example
/// ```bash
/// RUST_LOG=match_logic=debug llm-arena --iterations 5
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
