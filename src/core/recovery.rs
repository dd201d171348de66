//! Recovery narrative for a session that ended abnormally.

use crate::storage::Database;

/// First line of every recovery narrative.
pub const RECOVERY_HEADER: &str = "[Session recovery - abnormal termination detected]";

/// Build the recovery narrative for a session.
///
/// Includes the last `max_summaries` summaries (most recent last), the last
/// known turn and tool, and the token usage. Returns `None` if the session
/// does not exist.
#[must_use]
pub fn build_recovery_context(
    db: Database<'_>,
    session_id: &str,
    max_summaries: usize,
) -> Option<String> {
    let session = db.get_session(session_id)?;
    let summaries = db.get_summaries(session_id);
    let current = db.store().get_current_state(session_id).unwrap_or_else(|e| {
        tracing::warn!(session_id, error = %e, "recovery: heartbeat unreadable");
        None
    });
    let ledger = db.get_token_ledger(session_id).unwrap_or_default();

    let mut lines = vec![RECOVERY_HEADER.to_string(), String::new()];
    if !session.project_path.is_empty() {
        lines.push(format!("Project: {}", session.project_path));
        lines.push(String::new());
    }

    if !summaries.is_empty() {
        let skip = summaries.len().saturating_sub(max_summaries);
        lines.push("## Work history:".to_string());
        lines.extend(
            summaries
                .iter()
                .skip(skip)
                .map(|s| format!("- Turn {}: {}", s.range_label(), s.summary)),
        );
        lines.push(String::new());
    }

    if let Some(current) = &current {
        let tool = if current.last_tool.is_empty() {
            "N/A"
        } else {
            current.last_tool.as_str()
        };
        lines.push(format!("## Last state (Turn {}):", current.turn));
        lines.push(format!("- Last tool: {tool}"));
        if let Some(path) = current.last_file_path() {
            lines.push(format!("- Last file: {path}"));
        }
        lines.push("- Status: interrupted".to_string());
        lines.push(String::new());
    }

    lines.push(format!(
        "## Token usage: {} (input: {} / output: {})",
        ledger.total_tokens(),
        ledger.input_tokens,
        ledger.output_tokens
    ));
    lines.push(String::new());
    lines.push("Continue the work based on the context above.".to_string());

    Some(lines.join("\n"))
}
