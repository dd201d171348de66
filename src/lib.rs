//! claude-guard - Session guard for Claude Code.
//!
//! Keeps a durable record of every session from lifecycle hooks: a heartbeat
//! per tool use, rolling summaries of what was done, and token usage. When a
//! session dies without ending, the next one to start is told where it left off.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
