//! Log subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Filter directive to use: `RUST_LOG` wins, then `--verbose`, then the
/// configured level.
pub fn filter(verbose: bool, configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { configured };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install a compact subscriber writing to stderr, so stdout stays
/// machine-readable. A second call is a no-op.
pub fn init(verbose: bool, configured: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, configured))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
