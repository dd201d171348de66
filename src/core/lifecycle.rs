//! Session lifecycle state machine.
//!
//! A session is `active` from its first start until it either ends normally
//! (`completed`) or is found with a stale heartbeat by a later start
//! (`crashed`). Either terminal status returns to `active` when the same
//! session id starts again.

use crate::config::Config;
use crate::core::crash::{self, CrashedSession};
use crate::core::recovery::build_recovery_context;
use crate::core::session_dir::SessionDir;
use crate::core::state::{
    CurrentState, Session, SessionPatch, SessionStatus, Summary, TokenLedger, TurnEvent,
};
use crate::core::summarizer::{generate_summary_with, should_summarize};
use crate::core::transcript;
use crate::error::Result;
use crate::hooks::{HookEvent, HookOutput};
use crate::storage::{Database, SessionStore};
use chrono::Utc;
use serde_json::Value;
use std::path::Path;

/// Digest of a closing summary when nothing about the tail is known.
pub const SESSION_ENDED_DIGEST: &str = "Session ended";

/// Handles lifecycle events against one store.
#[derive(Clone, Copy)]
pub struct Lifecycle<'a> {
    store: &'a dyn SessionStore,
    config: &'a Config,
}

impl<'a> Lifecycle<'a> {
    /// Create a controller over `store`.
    #[must_use]
    pub fn new(store: &'a dyn SessionStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    fn db(&self) -> Database<'a> {
        Database::new(self.store)
    }

    /// Handle one parsed event.
    ///
    /// # Errors
    ///
    /// Returns an error if a session directory write fails.
    pub fn handle(&self, event: &HookEvent) -> Result<HookOutput> {
        match event {
            HookEvent::SessionStart {
                session_id,
                cwd,
                source,
            } => self.session_start(session_id, cwd, source.as_deref()),
            HookEvent::PostToolUse {
                session_id,
                tool_name,
                tool_input,
                tool_use_id,
                cwd,
            } => self.post_tool_use(session_id, tool_name, tool_input, tool_use_id, cwd),
            HookEvent::Stop {
                session_id,
                transcript_path,
            } => self.stop(session_id, transcript_path.as_deref()),
            HookEvent::SessionEnd { session_id, reason } => {
                self.session_end(session_id, reason.as_deref())
            }
        }
    }

    /// Start or resume a session, then look for crashed ones.
    ///
    /// # Errors
    ///
    /// Infallible in practice; storage faults degrade to defaults.
    pub fn session_start(
        &self,
        session_id: &str,
        cwd: &str,
        source: Option<&str>,
    ) -> Result<HookOutput> {
        let db = self.db();

        match db.get_session(session_id) {
            None => {
                if db.create_session(session_id, cwd) {
                    db.put_token_ledger(&TokenLedger::new(session_id));
                    if let Some(source) = source {
                        db.update_session(
                            session_id,
                            &SessionPatch {
                                source: Some(source.to_string()),
                                ..SessionPatch::default()
                            },
                        );
                    }
                    tracing::info!(session_id, cwd, "session created");
                }
            }
            Some(session) if session.status.is_terminal() => {
                db.update_session(
                    session_id,
                    &SessionPatch {
                        status: Some(SessionStatus::Active),
                        ended_at: Some(None),
                        resumed_count: Some(session.resumed_count.saturating_add(1)),
                        source: source.map(str::to_string),
                        ..SessionPatch::default()
                    },
                );
                tracing::info!(
                    session_id,
                    previous = %session.status,
                    "session resumed"
                );
            }
            Some(_) => {}
        }

        let crashed = self.detect_crashes(session_id);
        let context = crash::most_recent(&crashed).and_then(|c| {
            tracing::warn!(
                session_id = %c.session.id,
                last_seen = %c.last_seen,
                "recovering from crashed session"
            );
            build_recovery_context(db, &c.session.id, self.config.recovery.max_summaries)
        });

        Ok(HookOutput::session_start(context))
    }

    /// Mark every other active session with a stale heartbeat as crashed.
    fn detect_crashes(&self, current_session: &str) -> Vec<CrashedSession> {
        let db = self.db();
        let now = Utc::now();
        let timeout = self.config.lifecycle.crash_timeout();

        let mut crashed = Vec::new();
        for session in db.get_active_sessions() {
            if session.id == current_session {
                continue;
            }
            let heartbeat = match SessionDir::new(self.store, &session.id).current_state() {
                Ok(Some(state)) => state,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "heartbeat unreadable");
                    continue;
                }
            };
            if !crash::is_stale(Some(&heartbeat), now, timeout) {
                continue;
            }
            if db.mark_crashed(&session.id) {
                tracing::info!(session_id = %session.id, "session marked crashed");
                crashed.push(CrashedSession {
                    session,
                    last_seen: heartbeat.updated_at,
                });
            }
        }
        crashed
    }

    /// Record a tool-use turn and summarize when the interval is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the heartbeat, turn buffer or summary log cannot
    /// be written.
    pub fn post_tool_use(
        &self,
        session_id: &str,
        tool_name: &str,
        tool_input: &Value,
        tool_use_id: &str,
        cwd: &str,
    ) -> Result<HookOutput> {
        let db = self.db();
        let Some(session) = db.get_session(session_id) else {
            tracing::debug!(session_id, "post-tool-use for unknown session");
            return Ok(HookOutput::continue_session());
        };

        let turn = session.total_turns.saturating_add(1);
        let dir = SessionDir::new(self.store, session_id);
        let current = dir.save_current_state(CurrentState::for_turn(
            turn,
            tool_name,
            tool_input,
            tool_use_id,
            cwd,
        ))?;

        let mut buffer = dir.load_turns()?;
        buffer.push(TurnEvent::new(turn, tool_name, tool_input.clone()))?;

        if should_summarize(
            turn,
            session.last_summary_turn,
            self.config.lifecycle.interval(),
        ) {
            let start = session.last_summary_turn.saturating_add(1);
            let summary = if buffer.covers(start, turn) {
                generate_summary_with(
                    &buffer.slice(start, turn),
                    start,
                    turn,
                    &self.config.summarizer,
                )
            } else {
                closing_summary(Some(&current), start, turn)
            };
            self.close_range(&session, &summary, turn)?;
            buffer.clear()?;
        }

        Ok(HookOutput::continue_session())
    }

    /// Account tokens from the transcript and summarize the unsummarized tail.
    ///
    /// The session stays active; only a session end completes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the summary log or turn buffer cannot be written.
    pub fn stop(&self, session_id: &str, transcript_path: Option<&Path>) -> Result<HookOutput> {
        let db = self.db();
        let Some(session) = db.get_session(session_id) else {
            tracing::debug!(session_id, "stop for unknown session");
            return Ok(HookOutput::continue_session());
        };

        if let Some(path) = transcript_path {
            self.record_transcript_usage(&session, path);
        }

        let dir = SessionDir::new(self.store, session_id);
        let current = dir.current_state()?;
        let current_turn = current
            .as_ref()
            .map_or(session.total_turns, |c| c.turn.max(session.total_turns));

        if current_turn > session.last_summary_turn {
            let start = session.last_summary_turn.saturating_add(1);
            let mut buffer = dir.load_turns()?;
            let summary = if buffer.covers(start, current_turn) {
                generate_summary_with(
                    &buffer.slice(start, current_turn),
                    start,
                    current_turn,
                    &self.config.summarizer,
                )
            } else {
                closing_summary(current.as_ref(), start, current_turn)
            };
            self.close_range(&session, &summary, current_turn)?;
            buffer.clear()?;
        }

        Ok(HookOutput::continue_session())
    }

    /// Fold transcript usage not counted before into the token ledger.
    fn record_transcript_usage(&self, session: &Session, path: &Path) {
        let db = self.db();
        let parsed = transcript::read_transcript(path);
        let mut ledger = db
            .get_token_ledger(&session.id)
            .unwrap_or_else(|| TokenLedger::new(&session.id));

        let usage = transcript::tally(&parsed, ledger.transcript_lines);
        if usage.is_empty() {
            return;
        }

        ledger.record(
            session.total_turns,
            usage.input_tokens.unwrap_or(ledger.input_tokens),
            usage.output_tokens,
            usage.model.as_deref(),
            Utc::now(),
        );
        ledger.transcript_lines = usage.settled_lines;
        if db.put_token_ledger(&ledger) {
            tracing::debug!(
                session_id = %session.id,
                input = ledger.input_tokens,
                output = ledger.output_tokens,
                "token usage recorded"
            );
        }
    }

    /// Persist a summary and advance the high-water mark to `turn_end`.
    fn close_range(&self, session: &Session, summary: &Summary, turn_end: u64) -> Result<()> {
        SessionDir::new(self.store, &session.id).append_summary(summary)?;
        self.db().update_session(
            &session.id,
            &SessionPatch {
                total_turns: Some(turn_end),
                last_summary_turn: Some(turn_end),
                ..SessionPatch::default()
            },
        );
        tracing::debug!(
            session_id = %session.id,
            turns = %summary.range_label(),
            "summary written"
        );
        Ok(())
    }

    /// Complete an active session.
    ///
    /// # Errors
    ///
    /// Infallible in practice; storage faults degrade to defaults.
    pub fn session_end(&self, session_id: &str, reason: Option<&str>) -> Result<HookOutput> {
        let db = self.db();
        if db.get_session(session_id).is_some_and(|s| s.is_active())
            && db.mark_completed(session_id)
        {
            tracing::info!(session_id, reason = reason.unwrap_or(""), "session completed");
        }
        Ok(HookOutput::continue_session())
    }
}

/// Summary for a tail whose turns were not buffered.
fn closing_summary(current: Option<&CurrentState>, turn_start: u64, turn_end: u64) -> Summary {
    let last_tool = current.filter(|c| !c.last_tool.is_empty());
    let path = last_tool.and_then(CurrentState::last_file_path);

    Summary {
        turn_start,
        turn_end,
        summary: last_tool.map_or_else(
            || SESSION_ENDED_DIGEST.to_string(),
            |c| format!("Final: {} on {}", c.last_tool, path.unwrap_or("unknown")),
        ),
        files_read: Vec::new(),
        files_modified: path.map(str::to_string).into_iter().collect(),
        tokens_used: 0,
        created_at: Utc::now(),
    }
}
