//! Per-session auxiliary state: heartbeat, summary log and pending turns.

use crate::core::state::{CurrentState, SessionPatch, Summary, TurnEvent};
use crate::error::Result;
use crate::storage::SessionStore;
use chrono::Utc;

/// Handle on one session's auxiliary files.
#[derive(Clone, Copy)]
pub struct SessionDir<'a> {
    store: &'a dyn SessionStore,
    session_id: &'a str,
}

impl<'a> SessionDir<'a> {
    /// Open the directory of a session.
    #[must_use]
    pub fn new(store: &'a dyn SessionStore, session_id: &'a str) -> Self {
        Self { store, session_id }
    }

    /// Overwrite the heartbeat.
    ///
    /// Stamps `updated_at` with the current time and mirrors the turn number
    /// into the session record's `total_turns`.
    pub fn save_current_state(&self, mut state: CurrentState) -> Result<CurrentState> {
        state.updated_at = Utc::now();
        self.store.put_current_state(self.session_id, &state)?;

        if let Some(mut session) = self.store.get_session(self.session_id)? {
            SessionPatch {
                total_turns: Some(state.turn),
                ..SessionPatch::default()
            }
            .apply(&mut session);
            self.store.put_session(&session)?;
        }
        Ok(state)
    }

    /// Last heartbeat, if one was written.
    pub fn current_state(&self) -> Result<Option<CurrentState>> {
        self.store.get_current_state(self.session_id)
    }

    /// Append a summary to the log.
    pub fn append_summary(&self, summary: &Summary) -> Result<()> {
        self.store.append_summary(self.session_id, summary)
    }

    /// All readable summaries, ordered by `turn_start`.
    pub fn summaries(&self) -> Result<Vec<Summary>> {
        let mut summaries = self.store.get_summaries(self.session_id)?;
        summaries.sort_by_key(|s| s.turn_start);
        Ok(summaries)
    }

    /// Load the pending turns written by earlier invocations.
    pub fn load_turns(&self) -> Result<TurnBuffer<'a>> {
        let turns = self.store.get_pending_turns(self.session_id)?;
        Ok(TurnBuffer {
            dir: *self,
            turns,
        })
    }
}

/// Turns not yet folded into a summary.
///
/// Loaded at the start of an invocation; every change is written through to
/// the session directory before it is visible here.
pub struct TurnBuffer<'a> {
    dir: SessionDir<'a>,
    turns: Vec<TurnEvent>,
}

impl TurnBuffer<'_> {
    /// Record a turn.
    pub fn push(&mut self, turn: TurnEvent) -> Result<()> {
        self.dir
            .store
            .append_pending_turn(self.dir.session_id, &turn)?;
        self.turns.push(turn);
        Ok(())
    }

    /// Buffered turns within `[turn_start, turn_end]`, in turn order.
    ///
    /// A turn recorded twice (a double-fired hook) appears once, last write wins.
    #[must_use]
    pub fn slice(&self, turn_start: u64, turn_end: u64) -> Vec<TurnEvent> {
        let mut selected: Vec<TurnEvent> = Vec::new();
        for turn in self
            .turns
            .iter()
            .filter(|t| (turn_start..=turn_end).contains(&t.turn))
        {
            match selected.iter_mut().find(|s| s.turn == turn.turn) {
                Some(existing) => *existing = turn.clone(),
                None => selected.push(turn.clone()),
            }
        }
        selected.sort_by_key(|t| t.turn);
        selected
    }

    /// Whether every turn in `[turn_start, turn_end]` is buffered.
    #[must_use]
    pub fn covers(&self, turn_start: u64, turn_end: u64) -> bool {
        turn_start <= turn_end
            && (turn_start..=turn_end).all(|n| self.turns.iter().any(|t| t.turn == n))
    }

    /// Drop every buffered turn.
    pub fn clear(&mut self) -> Result<()> {
        self.dir.store.clear_pending_turns(self.dir.session_id)?;
        self.turns.clear();
        Ok(())
    }

    /// Number of buffered turn events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
