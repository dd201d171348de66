//! `claude-guard status` command implementation.

use crate::cli::{format_count, format_local_time, load};
use crate::core::state::SessionStatus;
use crate::error::Result;
use crate::storage::{Database, FileBackend, TokenFilter};

/// Run the status command.
///
/// # Errors
///
/// Returns an error if the config or store cannot be opened.
pub fn run() -> Result<()> {
    let (_, store) = load()?;
    println!("{}", render(&store));
    Ok(())
}

fn render(store: &FileBackend) -> String {
    let db = Database::new(store);
    let mut lines = vec![
        "=== claude-guard status ===".to_string(),
        String::new(),
        format!("Data directory: {}", store.base_dir().display()),
        String::new(),
    ];
    lines.extend(session_lines(db));
    lines.join("\n")
}

fn session_lines(db: Database<'_>) -> Vec<String> {
    let sessions = db.get_recent_sessions(usize::MAX);
    let count = |status: SessionStatus| sessions.iter().filter(|s| s.status == status).count();
    let tokens = db.get_token_stats(&TokenFilter::default());

    let mut lines = vec![
        "Sessions:".to_string(),
        format!("  Total: {}", sessions.len()),
        format!("  Active: {}", count(SessionStatus::Active)),
        format!("  Completed: {}", count(SessionStatus::Completed)),
        format!("  Crashed: {}", count(SessionStatus::Crashed)),
        String::new(),
        format!("Tracked tokens: {}", format_count(tokens.total_tokens())),
    ];
    if let Some(last) = sessions.first() {
        lines.push(format!("Last session: {}", format_local_time(last.started_at)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn status_counts_sessions_by_status() {
        let temp = TempDir::new().unwrap();
        let store = FileBackend::new(temp.path().to_path_buf()).unwrap();
        let db = Database::new(&store);
        db.create_session("a", "");
        db.create_session("b", "");
        db.create_session("c", "");
        db.mark_completed("b");
        db.mark_crashed("c");
        db.add_token_usage("a", 1, 1_000, 500, None);

        let report = render(&store);
        assert!(report.contains(&format!("Data directory: {}", temp.path().display())));
        assert!(report.contains("  Total: 3"));
        assert!(report.contains("  Active: 1"));
        assert!(report.contains("  Completed: 1"));
        assert!(report.contains("  Crashed: 1"));
        assert!(report.contains("Tracked tokens: 1,500"));
        assert!(report.contains("Last session: "));
    }

    #[test]
    fn status_of_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = FileBackend::new(temp.path().to_path_buf()).unwrap();

        let report = render(&store);
        assert!(report.contains("  Total: 0"));
        assert!(report.contains("Tracked tokens: 0"));
        assert!(!report.contains("Last session"));
    }
}
