//! Storage backends for session state.

pub mod db;
pub mod file;
pub mod memory;
pub mod traits;

pub use db::{Database, SessionTokens, TokenFilter, TokenStats};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use traits::SessionStore;
