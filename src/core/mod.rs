//! Session lifecycle, crash recovery and token accounting.

pub mod crash;
pub mod lifecycle;
pub mod recovery;
pub mod session_dir;
pub mod state;
pub mod stats;
pub mod summarizer;
pub mod transcript;

pub use lifecycle::Lifecycle;
pub use recovery::build_recovery_context;
pub use session_dir::{SessionDir, TurnBuffer};
pub use state::{
    CurrentState, Session, SessionPatch, SessionStatus, Summary, TokenLedger, TokenObservation,
    TruncatedInput, TurnEvent, TurnStatus,
};
pub use summarizer::{generate_summary, should_summarize};
