//! Crash detection.
//!
//! A session is considered crashed when it is still active but its
//! heartbeat has gone stale. A session that never wrote a heartbeat is not
//! crashed; it simply never ran a tool.

use crate::core::state::{CurrentState, Session};
use chrono::{DateTime, Duration, Utc};

/// Whether a heartbeat is older than `timeout`.
///
/// Returns `false` when there is no heartbeat.
#[must_use]
pub fn is_stale(current: Option<&CurrentState>, now: DateTime<Utc>, timeout: Duration) -> bool {
    current.is_some_and(|state| now.signed_duration_since(state.updated_at) > timeout)
}

/// A crashed session together with its last heartbeat.
#[derive(Debug, Clone)]
pub struct CrashedSession {
    /// The session record.
    pub session: Session,
    /// Its last heartbeat.
    pub last_seen: DateTime<Utc>,
}

/// Pick the crashed session that was alive most recently.
#[must_use]
pub fn most_recent(crashed: &[CrashedSession]) -> Option<&CrashedSession> {
    crashed.iter().max_by_key(|c| c.last_seen)
}
