//! Hook input/output types and dispatch.

pub mod input;
pub mod output;
pub mod runner;

pub use input::{HookEvent, HookInput, HookKind};
pub use output::{HookOutput, HookSpecificOutput};
pub use runner::dispatch_hook;
