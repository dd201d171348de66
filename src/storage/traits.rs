//! Storage trait definitions.

use crate::core::state::{CurrentState, Session, Summary, TokenLedger, TurnEvent};
use crate::error::Result;

/// Storage backend for session records and per-session files.
///
/// Backends report failures as errors; [`crate::storage::Database`] turns
/// them into safe defaults for the hook pipeline.
pub trait SessionStore: Send + Sync {
    /// Get a session record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Save a session record, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put_session(&self, session: &Session) -> Result<()>;

    /// List every readable session record, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Get the heartbeat snapshot for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_current_state(&self, session_id: &str) -> Result<Option<CurrentState>>;

    /// Overwrite the heartbeat snapshot for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put_current_state(&self, session_id: &str, state: &CurrentState) -> Result<()>;

    /// Append one summary to the session's summary log.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn append_summary(&self, session_id: &str, summary: &Summary) -> Result<()>;

    /// Read the session's summary log in write order. Unreadable entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_summaries(&self, session_id: &str) -> Result<Vec<Summary>>;

    /// Get the token ledger for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_token_ledger(&self, session_id: &str) -> Result<Option<TokenLedger>>;

    /// Save the token ledger for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put_token_ledger(&self, ledger: &TokenLedger) -> Result<()>;

    /// List every readable token ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn list_token_ledgers(&self) -> Result<Vec<TokenLedger>>;

    /// Read the pending (not yet summarized) turns of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_pending_turns(&self, session_id: &str) -> Result<Vec<TurnEvent>>;

    /// Append one pending turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn append_pending_turn(&self, session_id: &str, turn: &TurnEvent) -> Result<()>;

    /// Drop all pending turns.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn clear_pending_turns(&self, session_id: &str) -> Result<()>;
}
