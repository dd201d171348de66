//! In-memory storage backend for testing.

use crate::core::state::{CurrentState, Session, Summary, TokenLedger, TurnEvent};
use crate::error::Result;
use crate::storage::traits::SessionStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage backend for testing.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, Session>>,
    current: RwLock<HashMap<String, CurrentState>>,
    summaries: RwLock<HashMap<String, Vec<Summary>>>,
    ledgers: RwLock<HashMap<String, TokenLedger>>,
    pending: RwLock<HashMap<String, Vec<TurnEvent>>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryBackend {
    fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions.get(session_id).cloned())
    }

    fn put_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions.values().cloned().collect())
    }

    fn get_current_state(&self, session_id: &str) -> Result<Option<CurrentState>> {
        let current = self.current.read().unwrap();
        Ok(current.get(session_id).cloned())
    }

    fn put_current_state(&self, session_id: &str, state: &CurrentState) -> Result<()> {
        let mut current = self.current.write().unwrap();
        current.insert(session_id.to_string(), state.clone());
        Ok(())
    }

    fn append_summary(&self, session_id: &str, summary: &Summary) -> Result<()> {
        let mut summaries = self.summaries.write().unwrap();
        summaries
            .entry(session_id.to_string())
            .or_default()
            .push(summary.clone());
        Ok(())
    }

    fn get_summaries(&self, session_id: &str) -> Result<Vec<Summary>> {
        let summaries = self.summaries.read().unwrap();
        Ok(summaries.get(session_id).cloned().unwrap_or_default())
    }

    fn get_token_ledger(&self, session_id: &str) -> Result<Option<TokenLedger>> {
        let ledgers = self.ledgers.read().unwrap();
        Ok(ledgers.get(session_id).cloned())
    }

    fn put_token_ledger(&self, ledger: &TokenLedger) -> Result<()> {
        let mut ledgers = self.ledgers.write().unwrap();
        ledgers.insert(ledger.session_id.clone(), ledger.clone());
        Ok(())
    }

    fn list_token_ledgers(&self) -> Result<Vec<TokenLedger>> {
        let ledgers = self.ledgers.read().unwrap();
        Ok(ledgers.values().cloned().collect())
    }

    fn get_pending_turns(&self, session_id: &str) -> Result<Vec<TurnEvent>> {
        let pending = self.pending.read().unwrap();
        Ok(pending.get(session_id).cloned().unwrap_or_default())
    }

    fn append_pending_turn(&self, session_id: &str, turn: &TurnEvent) -> Result<()> {
        let mut pending = self.pending.write().unwrap();
        pending
            .entry(session_id.to_string())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    fn clear_pending_turns(&self, session_id: &str) -> Result<()> {
        let mut pending = self.pending.write().unwrap();
        pending.remove(session_id);
        Ok(())
    }
}
