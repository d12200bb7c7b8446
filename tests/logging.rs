//! Tests for subscriber installation.

use rowpipe::logging::init_logging;
use tracing::Level;

#[test]
fn test_init_logging_only_installs_once() {
    assert!(init_logging(Level::DEBUG, false));
    assert!(!init_logging(Level::INFO, true));
    tracing::info!(stage = "test", "logging installed");
}
