//! Opt-in `tracing` subscriber setup.
//!
//! The library only emits events; binaries and test harnesses decide whether
//! and how to collect them. `RUST_LOG` always overrides the default level.

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install a compact stderr subscriber.
///
/// Returns `false` when a global subscriber was already installed, so calling
/// this from several tests is harmless.
pub fn init_logging(verbose: bool) -> bool {
    let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .try_init()
        .is_ok()
}

/// Install a JSON-lines stderr subscriber for log collectors
pub fn init_json_logging(verbose: bool) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .json()
        .try_init()
        .is_ok()
}
