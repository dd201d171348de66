//! Hook input parsing.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Raw input received from Claude Code hooks.
///
/// Every field is optional. A string field that carries a non-string value
/// (number, object, null) reads as empty rather than failing the parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    /// Session identifier.
    #[serde(deserialize_with = "lenient_string")]
    pub session_id: String,

    /// Current working directory.
    #[serde(deserialize_with = "lenient_string")]
    pub cwd: String,

    /// Source of session start (startup, resume, clear, compact).
    #[serde(deserialize_with = "lenient_string")]
    pub source: String,

    /// Tool name (post-tool-use).
    #[serde(deserialize_with = "lenient_string")]
    pub tool_name: String,

    /// Tool input (post-tool-use).
    pub tool_input: Value,

    /// Tool invocation id (post-tool-use).
    #[serde(deserialize_with = "lenient_string")]
    pub tool_use_id: String,

    /// Path of the session transcript (stop).
    #[serde(alias = "transcript_reference", deserialize_with = "lenient_string")]
    pub transcript_path: String,

    /// Why the session ended (session-end).
    #[serde(deserialize_with = "lenient_string")]
    pub reason: String,

    /// Event name as reported by the host.
    #[serde(deserialize_with = "lenient_string")]
    pub hook_event_name: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// The lifecycle events this crate handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// A session started or resumed.
    SessionStart,
    /// A tool finished running.
    PostToolUse,
    /// The assistant finished responding.
    Stop,
    /// The session ended normally.
    SessionEnd,
}

impl HookKind {
    /// Parse a hook name, kebab-case (`post-tool-use`) or `PascalCase` (`PostToolUse`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "session-start" | "SessionStart" => Some(Self::SessionStart),
            "post-tool-use" | "PostToolUse" => Some(Self::PostToolUse),
            "stop" | "Stop" => Some(Self::Stop),
            "session-end" | "SessionEnd" => Some(Self::SessionEnd),
            _ => None,
        }
    }

    /// Event name in the host's `PascalCase` form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::PostToolUse => "PostToolUse",
            Self::Stop => "Stop",
            Self::SessionEnd => "SessionEnd",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed lifecycle event with the fields its handler needs.
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    /// See [`HookKind::SessionStart`].
    SessionStart {
        session_id: String,
        cwd: String,
        source: Option<String>,
    },
    /// See [`HookKind::PostToolUse`].
    PostToolUse {
        session_id: String,
        tool_name: String,
        tool_input: Value,
        tool_use_id: String,
        cwd: String,
    },
    /// See [`HookKind::Stop`].
    Stop {
        session_id: String,
        transcript_path: Option<PathBuf>,
    },
    /// See [`HookKind::SessionEnd`].
    SessionEnd {
        session_id: String,
        reason: Option<String>,
    },
}

impl HookEvent {
    /// Build the event of the given kind from raw input.
    #[must_use]
    pub fn from_input(kind: HookKind, input: HookInput) -> Self {
        let non_empty = |s: String| (!s.is_empty()).then_some(s);
        match kind {
            HookKind::SessionStart => Self::SessionStart {
                session_id: input.session_id,
                cwd: input.cwd,
                source: non_empty(input.source),
            },
            HookKind::PostToolUse => Self::PostToolUse {
                session_id: input.session_id,
                tool_name: input.tool_name,
                tool_input: input.tool_input,
                tool_use_id: input.tool_use_id,
                cwd: input.cwd,
            },
            HookKind::Stop => Self::Stop {
                session_id: input.session_id,
                transcript_path: non_empty(input.transcript_path).map(PathBuf::from),
            },
            HookKind::SessionEnd => Self::SessionEnd {
                session_id: input.session_id,
                reason: non_empty(input.reason),
            },
        }
    }

    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> HookKind {
        match self {
            Self::SessionStart { .. } => HookKind::SessionStart,
            Self::PostToolUse { .. } => HookKind::PostToolUse,
            Self::Stop { .. } => HookKind::Stop,
            Self::SessionEnd { .. } => HookKind::SessionEnd,
        }
    }

    /// Session the event belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionStart { session_id, .. }
            | Self::PostToolUse { session_id, .. }
            | Self::Stop { session_id, .. }
            | Self::SessionEnd { session_id, .. } => session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_minimal_input() {
        let json = r#"{"session_id": "test-123", "cwd": "/tmp"}"#;
        let input: HookInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.session_id, "test-123");
        assert_eq!(input.cwd, "/tmp");
        assert!(input.tool_name.is_empty());
        assert_eq!(input.tool_input, Value::Null);
    }

    #[test]
    fn missing_session_id_defaults_to_empty() {
        let input: HookInput = serde_json::from_str(r#"{"cwd": "/tmp"}"#).unwrap();
        assert!(input.session_id.is_empty());
    }

    #[test]
    fn non_string_fields_degrade_to_empty() {
        let json = r#"{"session_id": 42, "cwd": {"nested": true}, "tool_name": null, "source": ["x"]}"#;
        let input: HookInput = serde_json::from_str(json).unwrap();
        assert!(input.session_id.is_empty());
        assert!(input.cwd.is_empty());
        assert!(input.tool_name.is_empty());
        assert!(input.source.is_empty());
    }

    #[test]
    fn transcript_reference_alias() {
        let json = r#"{"session_id": "s", "transcript_reference": "/t.jsonl"}"#;
        let input: HookInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.transcript_path, "/t.jsonl");
    }

    #[test]
    fn extra_fields_ignored() {
        let json = r#"{"session_id": "test-123", "tool_response": {"ok": true}, "unknown_field": 1}"#;
        assert!(serde_json::from_str::<HookInput>(json).is_ok());
    }

    #[test]
    fn malformed_json_fails() {
        let json = r#"{"session_id": "test-123", cwd: /tmp}"#;
        assert!(serde_json::from_str::<HookInput>(json).is_err());
    }

    #[test]
    fn hook_kind_accepts_both_spellings() {
        assert_eq!(HookKind::parse("session-start"), Some(HookKind::SessionStart));
        assert_eq!(HookKind::parse("SessionStart"), Some(HookKind::SessionStart));
        assert_eq!(HookKind::parse("post-tool-use"), Some(HookKind::PostToolUse));
        assert_eq!(HookKind::parse("PostToolUse"), Some(HookKind::PostToolUse));
        assert_eq!(HookKind::parse("Stop"), Some(HookKind::Stop));
        assert_eq!(HookKind::parse("session-end"), Some(HookKind::SessionEnd));
        assert_eq!(HookKind::parse("user-prompt"), None);
        assert_eq!(HookKind::PostToolUse.to_string(), "PostToolUse");
    }

    #[test]
    fn event_from_input() {
        let input: HookInput = serde_json::from_value(json!({
            "session_id": "s1",
            "cwd": "/proj",
            "tool_name": "Edit",
            "tool_input": {"file_path": "/proj/a.rs"},
            "tool_use_id": "toolu_1",
            "transcript_path": "",
        }))
        .unwrap();

        let event = HookEvent::from_input(HookKind::PostToolUse, input.clone());
        assert_eq!(event.kind(), HookKind::PostToolUse);
        assert_eq!(event.session_id(), "s1");
        let HookEvent::PostToolUse { tool_input, .. } = &event else {
            panic!("expected post-tool-use event");
        };
        assert_eq!(tool_input["file_path"], "/proj/a.rs");

        let stop = HookEvent::from_input(HookKind::Stop, input);
        assert_eq!(
            stop,
            HookEvent::Stop {
                session_id: "s1".to_string(),
                transcript_path: None,
            }
        );
    }
}
