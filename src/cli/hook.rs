//! `claude-guard hook` command implementation.

use crate::cli::open_store;
use crate::config::{Config, load_config};
use crate::error::Result;
use crate::hooks::{HookInput, HookKind, HookOutput, dispatch_hook};
use serde::Serialize;
use std::io::{self, Read, Write};

/// Run a hook command.
///
/// Reads JSON from stdin, dispatches to the lifecycle handler and writes
/// exactly one JSON object to stdout. Bad input, a broken config or an
/// unusable store all still produce the continuation response.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn run(hook_name: &str) -> Result<()> {
    let mut raw = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut raw) {
        tracing::warn!(error = %e, "failed to read hook input");
    }

    let output = respond(hook_name, &raw);
    write_json(&output)
}

/// Produce the response for one raw hook payload.
fn respond(hook_name: &str, raw: &str) -> HookOutput {
    let fallback = || HookKind::parse(hook_name).map_or_else(HookOutput::continue_session, HookOutput::for_kind);

    let input = match serde_json::from_str::<HookInput>(raw) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(hook = hook_name, error = %e, "failed to parse hook input");
            return fallback();
        }
    };

    let config = load_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config unreadable, using defaults");
        Config::default()
    });

    match open_store(&config) {
        Ok(store) => dispatch_hook(hook_name, input, &store, &config),
        Err(e) => {
            tracing::warn!(path = %config.storage.path.display(), error = %e, "storage init failed");
            fallback()
        }
    }
}

/// Write a serializable value as JSON to stdout.
fn write_json<T: Serialize>(output: &T) -> Result<()> {
    let json = serde_json::to_string(output)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(json.as_bytes())?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}
