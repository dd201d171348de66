//! Hook dispatch logic.

use crate::config::Config;
use crate::core::Lifecycle;
use crate::hooks::{HookEvent, HookInput, HookKind, HookOutput};
use crate::storage::SessionStore;

/// Dispatch a hook by name.
///
/// Never fails: unknown hooks, input without a session id and handler
/// errors all produce the continuation response for the event.
pub fn dispatch_hook(
    name: &str,
    input: HookInput,
    store: &dyn SessionStore,
    config: &Config,
) -> HookOutput {
    let Some(kind) = HookKind::parse(name).or_else(|| HookKind::parse(&input.hook_event_name))
    else {
        tracing::warn!(hook = name, "unknown hook");
        return HookOutput::continue_session();
    };

    if input.session_id.is_empty() {
        tracing::debug!(hook = %kind, "no session id, nothing to do");
        return HookOutput::for_kind(kind);
    }

    let event = HookEvent::from_input(kind, input);
    match Lifecycle::new(store, config).handle(&event) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(
                hook = %kind,
                session_id = event.session_id(),
                error = %e,
                "hook failed"
            );
            HookOutput::for_kind(kind)
        }
    }
}
