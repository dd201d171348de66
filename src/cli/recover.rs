//! `claude-guard recover` command implementation.

use crate::cli::load;
use crate::core::recovery::build_recovery_context;
use crate::error::{Error, Result};
use crate::storage::Database;

/// Run the recover command.
///
/// Prints the recovery narrative that a new session would receive for this
/// session, whatever its status.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the session is not found.
pub fn run(id_or_prefix: &str) -> Result<()> {
    let (config, store) = load()?;
    let context = narrative(
        Database::new(&store),
        id_or_prefix,
        config.recovery.max_summaries,
    )?;
    println!("{context}");
    Ok(())
}

fn narrative(db: Database<'_>, id_or_prefix: &str, max_summaries: usize) -> Result<String> {
    db.find_session(id_or_prefix)
        .and_then(|session| build_recovery_context(db, &session.id, max_summaries))
        .ok_or_else(|| Error::SessionNotFound(id_or_prefix.to_string()))
}
