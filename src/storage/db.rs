//! Fail-safe facade over a [`SessionStore`].
//!
//! Every operation degrades to a safe default (`None`, empty, `false`, zero
//! stats) when the backend fails, logging the fault to stderr. This store
//! backs a fire-and-forget hook pipeline; a storage fault must never block
//! the host CLI.

use crate::core::state::{Session, SessionPatch, SessionStatus, Summary, TokenLedger};
use crate::error::Result;
use crate::storage::traits::SessionStore;
use chrono::{DateTime, Utc};
use std::ops::AddAssign;

/// Filter for [`Database::get_token_stats`].
#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    /// Restrict to one session.
    pub session_id: Option<String>,
    /// Only observations recorded at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only observations recorded at or before this time.
    pub to: Option<DateTime<Utc>>,
}

impl TokenFilter {
    /// Filter for a single session, all time.
    #[must_use]
    pub fn session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            ..Self::default()
        }
    }

    /// Filter for a time window across all sessions.
    #[must_use]
    pub fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            session_id: None,
            from: Some(from),
            to: Some(to),
        }
    }

    fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// Aggregate token usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenStats {
    /// Sessions with at least one matching observation.
    pub sessions: u64,
    /// Sum of the last matching turn number per session.
    pub turns: u64,
    /// Sum of the latest matching context size per session.
    pub input_tokens: u64,
    /// Sum of matching output tokens.
    pub output_tokens: u64,
}

impl TokenStats {
    /// Input plus output.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

impl AddAssign for TokenStats {
    fn add_assign(&mut self, other: Self) {
        self.sessions = self.sessions.saturating_add(other.sessions);
        self.turns = self.turns.saturating_add(other.turns);
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Token usage of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    /// Session identifier.
    pub session_id: String,
    /// Last model the session used.
    pub model: Option<String>,
    /// Matching usage of this session alone.
    pub stats: TokenStats,
}

/// The persistent-store contract used by the lifecycle controller and reports.
#[derive(Clone, Copy)]
pub struct Database<'a> {
    store: &'a dyn SessionStore,
}

impl<'a> Database<'a> {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(store: &'a dyn SessionStore) -> Self {
        Self { store }
    }

    /// The underlying backend.
    #[must_use]
    pub fn store(&self) -> &'a dyn SessionStore {
        self.store
    }

    /// Get a session, `None` if absent or unreadable.
    #[must_use]
    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        or_default("get_session", self.store.get_session(session_id))
    }

    /// Create an active session.
    ///
    /// Idempotent: if a record already exists it is left untouched and
    /// `false` is returned.
    pub fn create_session(&self, session_id: &str, project_path: &str) -> bool {
        match self.store.get_session(session_id) {
            Ok(Some(_)) => return false,
            Ok(None) => {}
            // An unreadable record is not overwritten either
            Err(e) => {
                tracing::warn!(session_id, error = %e, "create_session: existing record unreadable");
                return false;
            }
        }
        let session = Session::new(session_id, project_path);
        succeeded("create_session", self.store.put_session(&session))
    }

    /// Merge a partial update into a session. `false` if the session is unknown.
    pub fn update_session(&self, session_id: &str, patch: &SessionPatch) -> bool {
        let result = self.store.get_session(session_id).and_then(|found| {
            let Some(mut session) = found else {
                return Ok(false);
            };
            patch.apply(&mut session);
            self.store.put_session(&session).map(|()| true)
        });
        or_default("update_session", result)
    }

    /// Mark a session completed.
    pub fn mark_completed(&self, session_id: &str) -> bool {
        self.mark_terminal(session_id, SessionStatus::Completed)
    }

    /// Mark a session crashed.
    pub fn mark_crashed(&self, session_id: &str) -> bool {
        self.mark_terminal(session_id, SessionStatus::Crashed)
    }

    fn mark_terminal(&self, session_id: &str, status: SessionStatus) -> bool {
        self.update_session(
            session_id,
            &SessionPatch {
                status: Some(status),
                ended_at: Some(Some(Utc::now())),
                ..SessionPatch::default()
            },
        )
    }

    /// Record one token usage observation.
    ///
    /// `input_tokens` is the latest context size and replaces the previous
    /// value; `output_tokens` is added to the running total.
    pub fn add_token_usage(
        &self,
        session_id: &str,
        turn: u64,
        input_tokens: u64,
        output_tokens: u64,
        model: Option<&str>,
    ) -> bool {
        let result = self.store.get_token_ledger(session_id).and_then(|found| {
            let mut ledger = found.unwrap_or_else(|| TokenLedger::new(session_id));
            ledger.record(turn, input_tokens, output_tokens, model, Utc::now());
            self.store.put_token_ledger(&ledger)
        });
        succeeded("add_token_usage", result)
    }

    /// Get a session's token ledger.
    #[must_use]
    pub fn get_token_ledger(&self, session_id: &str) -> Option<TokenLedger> {
        or_default("get_token_ledger", self.store.get_token_ledger(session_id))
    }

    /// Save a session's token ledger.
    pub fn put_token_ledger(&self, ledger: &TokenLedger) -> bool {
        succeeded("put_token_ledger", self.store.put_token_ledger(ledger))
    }

    /// Aggregate token usage. Returns zeros when nothing matches.
    #[must_use]
    pub fn get_token_stats(&self, filter: &TokenFilter) -> TokenStats {
        self.get_token_stats_by_session(filter)
            .iter()
            .fold(TokenStats::default(), |mut total, s| {
                total += s.stats;
                total
            })
    }

    /// Token usage per session, for sessions with matching observations.
    #[must_use]
    pub fn get_token_stats_by_session(&self, filter: &TokenFilter) -> Vec<SessionTokens> {
        let ledgers = match &filter.session_id {
            Some(id) => self
                .store
                .get_token_ledger(id)
                .map(|l| l.into_iter().collect::<Vec<_>>()),
            None => self.store.list_token_ledgers(),
        };
        let ledgers: Vec<TokenLedger> = or_default("get_token_stats", ledgers);

        ledgers
            .into_iter()
            .filter_map(|ledger| {
                let mut stats = TokenStats::default();
                let mut last = None;
                for observation in ledger
                    .observations
                    .iter()
                    .filter(|o| filter.contains(o.recorded_at))
                {
                    stats.output_tokens = stats.output_tokens.saturating_add(observation.output_tokens);
                    last = Some(observation);
                }
                let last = last?;
                stats.sessions = 1;
                stats.turns = last.turn;
                stats.input_tokens = last.input_tokens;
                Some(SessionTokens {
                    session_id: ledger.session_id,
                    model: ledger.model,
                    stats,
                })
            })
            .collect()
    }

    /// Append a summary for a turn range.
    #[allow(clippy::too_many_arguments)]
    pub fn add_summary(
        &self,
        session_id: &str,
        turn_start: u64,
        turn_end: u64,
        text: &str,
        files_read: &[String],
        files_modified: &[String],
        tokens_used: u64,
    ) -> bool {
        let summary = Summary {
            turn_start,
            turn_end,
            summary: text.to_string(),
            files_read: files_read.to_vec(),
            files_modified: files_modified.to_vec(),
            tokens_used,
            created_at: Utc::now(),
        };
        self.append_summary(session_id, &summary)
    }

    /// Append an already built summary.
    pub fn append_summary(&self, session_id: &str, summary: &Summary) -> bool {
        succeeded("add_summary", self.store.append_summary(session_id, summary))
    }

    /// Summaries of a session, ordered by `turn_start`.
    #[must_use]
    pub fn get_summaries(&self, session_id: &str) -> Vec<Summary> {
        let mut summaries = or_default("get_summaries", self.store.get_summaries(session_id));
        summaries.sort_by_key(|s| s.turn_start);
        summaries
    }

    /// Sessions whose status is active.
    #[must_use]
    pub fn get_active_sessions(&self) -> Vec<Session> {
        self.all_sessions()
            .into_iter()
            .filter(Session::is_active)
            .collect()
    }

    /// Most recently started sessions first.
    #[must_use]
    pub fn get_recent_sessions(&self, limit: usize) -> Vec<Session> {
        let mut sessions = self.all_sessions();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        sessions
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn get_session_count(&self) -> usize {
        self.all_sessions().len()
    }

    /// Find a session by exact ID or unique ID prefix.
    #[must_use]
    pub fn find_session(&self, id_or_prefix: &str) -> Option<Session> {
        if let Some(session) = self.get_session(id_or_prefix) {
            return Some(session);
        }
        let mut matches = self
            .all_sessions()
            .into_iter()
            .filter(|s| s.id.starts_with(id_or_prefix));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    fn all_sessions(&self) -> Vec<Session> {
        or_default("list_sessions", self.store.list_sessions())
    }
}

/// Unwrap a backend result, logging and defaulting on failure.
fn or_default<T: Default>(op: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(op, error = %e, "storage operation failed");
        T::default()
    })
}

/// Whether a backend write succeeded, logging on failure.
fn succeeded(op: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(op, error = %e, "storage operation failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{CurrentState, TurnEvent};
    use crate::error::Error;
    use crate::storage::MemoryBackend;
    use chrono::Duration;

    /// Backend where every operation fails.
    struct BrokenBackend;

    fn broken<T>() -> Result<T> {
        Err(Error::Storage(std::io::Error::other("disk on fire")))
    }

    impl SessionStore for BrokenBackend {
        fn get_session(&self, _: &str) -> Result<Option<Session>> {
            broken()
        }
        fn put_session(&self, _: &Session) -> Result<()> {
            broken()
        }
        fn list_sessions(&self) -> Result<Vec<Session>> {
            broken()
        }
        fn get_current_state(&self, _: &str) -> Result<Option<CurrentState>> {
            broken()
        }
        fn put_current_state(&self, _: &str, _: &CurrentState) -> Result<()> {
            broken()
        }
        fn append_summary(&self, _: &str, _: &Summary) -> Result<()> {
            broken()
        }
        fn get_summaries(&self, _: &str) -> Result<Vec<Summary>> {
            broken()
        }
        fn get_token_ledger(&self, _: &str) -> Result<Option<TokenLedger>> {
            broken()
        }
        fn put_token_ledger(&self, _: &TokenLedger) -> Result<()> {
            broken()
        }
        fn list_token_ledgers(&self) -> Result<Vec<TokenLedger>> {
            broken()
        }
        fn get_pending_turns(&self, _: &str) -> Result<Vec<TurnEvent>> {
            broken()
        }
        fn append_pending_turn(&self, _: &str, _: &TurnEvent) -> Result<()> {
            broken()
        }
        fn clear_pending_turns(&self, _: &str) -> Result<()> {
            broken()
        }
    }

    #[test]
    fn create_session_is_idempotent() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);

        assert!(db.create_session("s1", "/project"));
        assert!(db.update_session(
            "s1",
            &SessionPatch {
                total_turns: Some(4),
                ..Default::default()
            }
        ));
        assert!(!db.create_session("s1", "/other"));

        let session = db.get_session("s1").unwrap();
        assert_eq!(session.total_turns, 4);
        assert_eq!(session.project_path, "/project");
        assert_eq!(db.get_session_count(), 1);
    }

    #[test]
    fn update_unknown_session_reports_failure() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);
        assert!(!db.update_session("ghost", &SessionPatch::default()));
        assert_eq!(db.get_session_count(), 0);
    }

    #[test]
    fn mark_transitions_set_ended_at() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);
        db.create_session("a", "");
        db.create_session("b", "");

        assert!(db.mark_completed("a"));
        assert!(db.mark_crashed("b"));

        let a = db.get_session("a").unwrap();
        assert_eq!(a.status, SessionStatus::Completed);
        assert!(a.ended_at.is_some());
        assert_eq!(db.get_session("b").unwrap().status, SessionStatus::Crashed);
        assert!(db.get_active_sessions().is_empty());
    }

    #[test]
    fn token_usage_input_is_latest_output_is_summed() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);

        db.add_token_usage("s", 3, 100, 10, Some("claude-sonnet-4"));
        db.add_token_usage("s", 6, 250, 20, None);

        let stats = db.get_token_stats(&TokenFilter::session("s"));
        assert_eq!(stats.input_tokens, 250);
        assert_eq!(stats.output_tokens, 30);
        assert_eq!(stats.turns, 6);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.total_tokens(), 280);
    }

    #[test]
    fn token_stats_window_filters_observations() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);
        let now = Utc::now();

        let mut old = TokenLedger::new("old");
        old.record(5, 1_000, 100, None, now - Duration::days(3));
        store.put_token_ledger(&old).unwrap();

        let mut recent = TokenLedger::new("recent");
        recent.record(2, 500, 50, None, now - Duration::hours(2));
        store.put_token_ledger(&recent).unwrap();

        let day = db.get_token_stats(&TokenFilter::window(now - Duration::days(1), now));
        assert_eq!(day.sessions, 1);
        assert_eq!(day.input_tokens, 500);
        assert_eq!(day.output_tokens, 50);

        let all = db.get_token_stats(&TokenFilter::default());
        assert_eq!(all.sessions, 2);
        assert_eq!(all.input_tokens, 1_500);
    }

    #[test]
    fn token_stats_zero_when_nothing_matches() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);
        assert_eq!(
            db.get_token_stats(&TokenFilter::session("missing")),
            TokenStats::default()
        );
    }

    #[test]
    fn summaries_round_trip_in_turn_order() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);

        // Written out of order on purpose
        db.add_summary("s", 6, 10, "second", &[], &[], 0);
        db.add_summary(
            "s",
            1,
            5,
            "first",
            &["/a.rs".to_string()],
            &["/b.rs".to_string()],
            42,
        );

        let summaries = db.get_summaries("s");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].summary, "first");
        assert_eq!(summaries[0].files_read, vec!["/a.rs".to_string()]);
        assert_eq!(summaries[0].files_modified, vec!["/b.rs".to_string()]);
        assert_eq!(summaries[0].tokens_used, 42);
        assert_eq!(summaries[1].summary, "second");
        assert!(summaries[1].files_read.is_empty());
        assert!(summaries[1].files_modified.is_empty());
    }

    #[test]
    fn recent_sessions_newest_first() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);
        let now = Utc::now();

        for (id, age) in [("old", 3), ("new", 1), ("mid", 2)] {
            let mut session = Session::new(id, "");
            session.started_at = now - Duration::hours(age);
            store.put_session(&session).unwrap();
        }

        let recent: Vec<String> = db.get_recent_sessions(2).into_iter().map(|s| s.id).collect();
        assert_eq!(recent, vec!["new".to_string(), "mid".to_string()]);
    }

    #[test]
    fn find_session_by_unique_prefix() {
        let store = MemoryBackend::new();
        let db = Database::new(&store);
        db.create_session("abc123", "");
        db.create_session("abd456", "");

        assert_eq!(db.find_session("abc").unwrap().id, "abc123");
        assert!(db.find_session("ab").is_none()); // Ambiguous
        assert!(db.find_session("zzz").is_none());
    }

    #[test]
    fn broken_backend_degrades_to_defaults() {
        let store = BrokenBackend;
        let db = Database::new(&store);

        assert!(db.get_session("s").is_none());
        assert!(!db.create_session("s", ""));
        assert!(!db.update_session("s", &SessionPatch::default()));
        assert!(!db.mark_completed("s"));
        assert!(!db.mark_crashed("s"));
        assert!(!db.add_token_usage("s", 1, 1, 1, None));
        assert_eq!(db.get_token_stats(&TokenFilter::default()), TokenStats::default());
        assert!(!db.add_summary("s", 1, 5, "x", &[], &[], 0));
        assert!(db.get_summaries("s").is_empty());
        assert!(db.get_active_sessions().is_empty());
        assert!(db.get_recent_sessions(5).is_empty());
        assert_eq!(db.get_session_count(), 0);
    }
}
