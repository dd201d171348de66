//! Hook output types.

use crate::hooks::input::HookKind;
use serde::Serialize;

/// Output returned from hooks. The host always continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOutput {
    /// Whether the host should continue. Always `true`.
    #[serde(rename = "continue")]
    pub continue_: bool,

    /// Event-specific payload.
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

/// Event-specific part of a [`HookOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookSpecificOutput {
    /// Event the payload belongs to.
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,

    /// Context to inject into the conversation.
    #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl HookOutput {
    /// Plain continuation.
    #[must_use]
    pub fn continue_session() -> Self {
        Self {
            continue_: true,
            hook_specific_output: None,
        }
    }

    /// Session start response, optionally carrying recovery context.
    #[must_use]
    pub fn session_start(additional_context: Option<String>) -> Self {
        Self {
            continue_: true,
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: HookKind::SessionStart.as_str().to_string(),
                additional_context,
            }),
        }
    }

    /// The response an event gets when nothing else applies.
    #[must_use]
    pub fn for_kind(kind: HookKind) -> Self {
        match kind {
            HookKind::SessionStart => Self::session_start(None),
            HookKind::PostToolUse | HookKind::Stop | HookKind::SessionEnd => {
                Self::continue_session()
            }
        }
    }

    /// Injected context, if any.
    #[must_use]
    pub fn additional_context(&self) -> Option<&str> {
        self.hook_specific_output
            .as_ref()
            .and_then(|h| h.additional_context.as_deref())
    }
}
