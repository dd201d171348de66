//! Session state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Session record stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Session identifier (from Claude Code).
    pub id: String,

    /// Working directory at session start.
    #[serde(default)]
    pub project_path: String,

    /// When the session was first started.
    pub started_at: DateTime<Utc>,

    /// When the session reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Lifecycle status.
    pub status: SessionStatus,

    /// Number of tool-use turns seen so far.
    #[serde(default)]
    pub total_turns: u64,

    /// Highest turn already folded into a summary.
    #[serde(default)]
    pub last_summary_turn: u64,

    /// Source of the most recent start (startup, resume, clear, compact).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// How many times the session was resumed from a terminal status.
    #[serde(default)]
    pub resumed_count: u32,
}

impl Session {
    /// Create a new active session.
    #[must_use]
    pub fn new(id: &str, project_path: &str) -> Self {
        Self {
            id: id.to_string(),
            project_path: project_path.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: SessionStatus::Active,
            total_turns: 0,
            last_summary_turn: 0,
            source: None,
            resumed_count: 0,
        }
    }

    /// Whether the session is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session is running (or crashed without being detected yet).
    Active,
    /// Session ended cleanly.
    Completed,
    /// Session was abandoned without a clean end.
    Crashed,
}

impl SessionStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// Partial update for a [`Session`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    /// New project path.
    pub project_path: Option<String>,
    /// New status.
    pub status: Option<SessionStatus>,
    /// New end time; `Some(None)` clears it.
    pub ended_at: Option<Option<DateTime<Utc>>>,
    /// New turn count (never decreases the stored value).
    pub total_turns: Option<u64>,
    /// New summary high-water mark (clamped to `total_turns`).
    pub last_summary_turn: Option<u64>,
    /// New start source.
    pub source: Option<String>,
    /// New resume counter.
    pub resumed_count: Option<u32>,
}

impl SessionPatch {
    /// Merge this patch into a session.
    pub fn apply(&self, session: &mut Session) {
        if let Some(path) = &self.project_path {
            session.project_path.clone_from(path);
        }
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(ended_at) = self.ended_at {
            session.ended_at = ended_at;
        }
        if let Some(turns) = self.total_turns {
            session.total_turns = session.total_turns.max(turns);
        }
        if let Some(turn) = self.last_summary_turn {
            session.last_summary_turn = turn.min(session.total_turns);
        }
        if let Some(source) = &self.source {
            session.source = Some(source.clone());
        }
        if let Some(count) = self.resumed_count {
            session.resumed_count = count;
        }
    }
}

/// Live turn snapshot, rewritten on every tool use. Its `updated_at` is the heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentState {
    /// Last turn number.
    pub turn: u64,

    /// Last tool name.
    #[serde(default)]
    pub last_tool: String,

    /// Last tool input (truncated if large).
    #[serde(default)]
    pub last_tool_input: TruncatedInput,

    /// Last tool invocation id.
    #[serde(default)]
    pub last_tool_id: String,

    /// Working directory at the time of the turn.
    #[serde(default)]
    pub cwd: String,

    /// Coarse status.
    #[serde(default)]
    pub status: TurnStatus,

    /// Heartbeat timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CurrentState {
    /// Snapshot for a tool-use turn.
    #[must_use]
    pub fn for_turn(turn: u64, tool: &str, input: &Value, tool_id: &str, cwd: &str) -> Self {
        Self {
            turn,
            last_tool: tool.to_string(),
            last_tool_input: TruncatedInput::from_value(input.clone()),
            last_tool_id: tool_id.to_string(),
            cwd: cwd.to_string(),
            status: TurnStatus::InProgress,
            updated_at: Utc::now(),
        }
    }

    /// File path touched by the last tool, if its input carried one.
    #[must_use]
    pub fn last_file_path(&self) -> Option<&str> {
        file_path_of(&self.last_tool_input.value)
    }
}

/// Coarse turn status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// A turn is in flight.
    #[default]
    InProgress,
}

/// One tool-use event, buffered until folded into a [`Summary`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnEvent {
    /// Turn number.
    pub turn: u64,

    /// Tool name.
    #[serde(default)]
    pub tool_name: String,

    /// Tool input payload.
    #[serde(default)]
    pub tool_input: Value,

    /// Input tokens attributed to this turn, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,

    /// Output tokens attributed to this turn, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,

    /// When the turn happened.
    pub timestamp: DateTime<Utc>,
}

impl TurnEvent {
    /// Create a turn event without token counts.
    #[must_use]
    pub fn new(turn: u64, tool_name: &str, tool_input: Value) -> Self {
        Self {
            turn,
            tool_name: tool_name.to_string(),
            tool_input,
            input_tokens: None,
            output_tokens: None,
            timestamp: Utc::now(),
        }
    }
}

/// Immutable digest of a contiguous turn range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    /// First turn covered (inclusive).
    pub turn_start: u64,

    /// Last turn covered (inclusive).
    pub turn_end: u64,

    /// Human-readable digest.
    pub summary: String,

    /// Files read during the range.
    #[serde(default)]
    pub files_read: Vec<String>,

    /// Files modified during the range.
    #[serde(default)]
    pub files_modified: Vec<String>,

    /// Tokens attributed to the range.
    #[serde(default)]
    pub tokens_used: u64,

    /// When the summary was created.
    pub created_at: DateTime<Utc>,
}

impl Summary {
    /// Turn range label, e.g. `6-10`.
    #[must_use]
    pub fn range_label(&self) -> String {
        format!("{}-{}", self.turn_start, self.turn_end)
    }
}

/// One token usage observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenObservation {
    /// Turn at which the observation was taken.
    pub turn: u64,

    /// Context size at this point (latest, not a delta).
    pub input_tokens: u64,

    /// Output tokens produced since the previous observation.
    pub output_tokens: u64,

    /// Model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// When the observation was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Per-session token ledger.
///
/// `input_tokens` is the latest observed context size and is replaced on each
/// observation; `output_tokens` accumulates.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TokenLedger {
    /// Session identifier.
    pub session_id: String,

    /// Latest observed context size.
    #[serde(default)]
    pub input_tokens: u64,

    /// Cumulative output tokens.
    #[serde(default)]
    pub output_tokens: u64,

    /// Last model seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Individual observations, oldest first.
    #[serde(default)]
    pub observations: Vec<TokenObservation>,

    /// Transcript lines already accounted.
    #[serde(default)]
    pub transcript_lines: u64,
}

impl TokenLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..Self::default()
        }
    }

    /// Record one observation.
    pub fn record(
        &mut self,
        turn: u64,
        input_tokens: u64,
        output_tokens: u64,
        model: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.input_tokens = input_tokens;
        self.output_tokens = self.output_tokens.saturating_add(output_tokens);
        if let Some(model) = model {
            self.model = Some(model.to_string());
        }
        self.updated_at = Some(now);
        self.observations.push(TokenObservation {
            turn,
            input_tokens,
            output_tokens,
            model: model.map(str::to_string),
            recorded_at: now,
        });
    }

    /// Latest context size plus cumulative output.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Tool input with truncation for large payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TruncatedInput {
    /// The input value (truncated if needed).
    pub value: Value,

    /// True if the original input was truncated.
    pub truncated: bool,

    /// SHA-256 hash of the original full input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<String>,

    /// Original size in bytes (if truncated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<usize>,
}

impl TruncatedInput {
    /// Maximum serialized size kept in a heartbeat.
    const MAX_SIZE: usize = 4 * 1024;

    /// Longest string kept once truncation kicks in.
    const MAX_STRING: usize = 200;

    /// Create a `TruncatedInput` from a JSON value, truncating if necessary.
    #[must_use]
    pub fn from_value(input: Value) -> Self {
        let serialized = serde_json::to_string(&input).unwrap_or_default();

        if serialized.len() <= Self::MAX_SIZE {
            return Self {
                value: input,
                truncated: false,
                original_hash: None,
                original_size: None,
            };
        }

        Self {
            value: shrink_value(&input, Self::MAX_SIZE),
            truncated: true,
            original_hash: Some(sha256_hex(&serialized)),
            original_size: Some(serialized.len()),
        }
    }
}

impl Default for TruncatedInput {
    fn default() -> Self {
        Self {
            value: Value::Null,
            truncated: false,
            original_hash: None,
            original_size: None,
        }
    }
}

/// Compute SHA-256 hash and return as hex string.
fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Shrink a JSON value to fit a byte budget, keeping its shape.
fn shrink_value(value: &Value, budget: usize) -> Value {
    match value {
        Value::String(s) if s.len() > budget.min(TruncatedInput::MAX_STRING) => {
            let kept: String = s.chars().take(TruncatedInput::MAX_STRING.min(budget)).collect();
            Value::String(format!("{kept}... [truncated, {} bytes total]", s.len()))
        }
        Value::Object(map) => {
            let per_key = budget / map.len().max(1);
            map.iter()
                .map(|(k, v)| (k.clone(), shrink_value(v, per_key)))
                .collect::<serde_json::Map<_, _>>()
                .into()
        }
        Value::Array(items) if items.len() > 10 => {
            let mut kept: Vec<Value> = items
                .iter()
                .take(10)
                .map(|v| shrink_value(v, budget / 10))
                .collect();
            kept.push(Value::String(format!("... [{} more items]", items.len() - 10)));
            Value::Array(kept)
        }
        other => other.clone(),
    }
}

/// Extract the file path a tool input refers to.
#[must_use]
pub fn file_path_of(input: &Value) -> Option<&str> {
    ["file_path", "notebook_path", "path"]
        .iter()
        .find_map(|key| input.get(key).and_then(Value::as_str))
        .filter(|p| !p.is_empty())
}
