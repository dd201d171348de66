//! `claude-guard show` command implementation.

use crate::cli::load;
use crate::error::{Error, Result};
use crate::storage::Database;
use serde_json::{Value, json};

/// Run the show command.
///
/// Dumps the session record, heartbeat, summaries and token ledger as JSON.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the session is not found.
pub fn run(id_or_prefix: &str) -> Result<()> {
    let (_, store) = load()?;
    let dump = dump(Database::new(&store), id_or_prefix)?;
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}

fn dump(db: Database<'_>, id_or_prefix: &str) -> Result<Value> {
    let session = db
        .find_session(id_or_prefix)
        .ok_or_else(|| Error::SessionNotFound(id_or_prefix.to_string()))?;
    let current = db.store().get_current_state(&session.id)?;
    let summaries = db.get_summaries(&session.id);
    let tokens = db.get_token_ledger(&session.id);

    Ok(json!({
        "session": session,
        "current": current,
        "summaries": summaries,
        "tokens": tokens,
    }))
}
