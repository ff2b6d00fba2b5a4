//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// The log level comes from `RUST_LOG` (e.g. `RUST_LOG=rse=debug,warn`),
/// defaulting to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
