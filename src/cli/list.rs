//! `claude-guard list` command implementation.

use crate::cli::{format_local_time, load};
use crate::core::state::Session;
use crate::error::Result;
use crate::storage::Database;

/// Default number of sessions to show.
const DEFAULT_LIMIT: usize = 20;

/// Run the list command.
///
/// Shows recent sessions with their status, start time, turns and project.
///
/// # Errors
///
/// Returns an error if the config or store cannot be opened.
pub fn run(limit: Option<usize>) -> Result<()> {
    let (_, store) = load()?;
    let sessions = Database::new(&store).get_recent_sessions(limit.unwrap_or(DEFAULT_LIMIT));

    if sessions.is_empty() {
        println!("No sessions found.");
        println!("\nSessions are stored in: {}", store.base_dir().display());
        return Ok(());
    }

    println!(
        "{:<38} {:<10} {:<17} {:>6}  Project",
        "Session ID", "Status", "Started", "Turns"
    );
    println!("{}", "─".repeat(100));
    for session in &sessions {
        println!("{}", format_row(session));
    }
    println!("{}", "─".repeat(100));
    println!("Showing {} session(s)", sessions.len());

    Ok(())
}

fn format_row(session: &Session) -> String {
    format!(
        "{:<38} {:<10} {:<17} {:>6}  {}",
        session.id,
        session.status.to_string(),
        format_local_time(session.started_at),
        session.total_turns,
        if session.project_path.is_empty() {
            "(unknown)"
        } else {
            session.project_path.as_str()
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn list_empty_store() {
        let store = MemoryBackend::new();
        assert!(Database::new(&store).get_recent_sessions(10).is_empty());
    }

    #[test]
    fn list_respects_limit() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);
        for i in 0..5 {
            db.create_session(&format!("session-{i}"), "/proj");
        }

        assert_eq!(db.get_recent_sessions(3).len(), 3);
    }

    #[test]
    fn row_shows_status_turns_and_project() {
        let mut session = Session::new("session-1", "/home/me/app");
        session.total_turns = 42;

        let row = format_row(&session);
        assert!(row.starts_with("session-1 "));
        assert!(row.contains("active"));
        assert!(row.contains("    42  /home/me/app"));
    }

    #[test]
    fn row_without_project() {
        let row = format_row(&Session::new("s", ""));
        assert!(row.ends_with("(unknown)"));
    }
}
