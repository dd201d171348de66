//! Diagnostic logging to stderr.
//!
//! Stdout carries the hook response, so every log line goes to stderr.

use std::io;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`warn`, `claude_guard=debug`, ...).
pub const LOG_ENV: &str = "CLAUDE_GUARD_LOG";

/// Filter used when `CLAUDE_GUARD_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Install the stderr subscriber. Calling it twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
