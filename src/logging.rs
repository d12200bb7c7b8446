//! Logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the embedding application. [`init_logging`] is a convenience for binaries
//! and tests.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber at `level`, or as JSON lines when `json`
/// is set. `RUST_LOG` overrides the level when present.
///
/// Returns `false` if a global subscriber was already installed, which makes it
/// safe to call from every test.
pub fn init_logging(level: Level, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true);
    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
