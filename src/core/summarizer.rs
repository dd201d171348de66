//! Rule-based turn summarizer.
//!
//! Reduces a batch of [`TurnEvent`]s to a short digest plus the files that
//! were read and modified. No I/O and no model calls.

use crate::config::SummarizerConfig;
use crate::core::state::{Summary, TurnEvent, file_path_of};
use chrono::Utc;
use glob::Pattern;
use serde_json::Value;

/// Digest used when a batch has no tool activity.
pub const EMPTY_DIGEST: &str = "No tool usage recorded";

/// Characters of a command or query kept in a description.
const SNIPPET_LEN: usize = 30;

/// Whether the turns since the last summary reach the interval.
#[must_use]
pub fn should_summarize(current_turn: u64, last_summary_turn: u64, interval: u32) -> bool {
    current_turn.saturating_sub(last_summary_turn) >= u64::from(interval.max(1))
}

/// Summarize a batch of turns with the default rules.
#[must_use]
pub fn generate_summary(turns: &[TurnEvent], turn_start: u64, turn_end: u64) -> Summary {
    generate_summary_with(turns, turn_start, turn_end, &SummarizerConfig::default())
}

/// Summarize a batch of turns with explicit rules.
#[must_use]
pub fn generate_summary_with(
    turns: &[TurnEvent],
    turn_start: u64,
    turn_end: u64,
    config: &SummarizerConfig,
) -> Summary {
    let digest = extract_key_actions(turns, config.max_actions);
    Summary {
        turn_start,
        turn_end,
        summary: if digest.is_empty() {
            EMPTY_DIGEST.to_string()
        } else {
            digest
        },
        files_read: collect_files(turns, &config.read_tools),
        files_modified: collect_files(turns, &config.write_tools),
        tokens_used: turns.iter().fold(0u64, |acc, t| {
            acc.saturating_add(t.input_tokens.unwrap_or(0))
                .saturating_add(t.output_tokens.unwrap_or(0))
        }),
        created_at: Utc::now(),
    }
}

/// Distinct action descriptions, in first-seen order, capped and joined.
fn extract_key_actions(turns: &[TurnEvent], max_actions: usize) -> String {
    let mut actions: Vec<String> = Vec::new();
    for turn in turns.iter().filter(|t| !t.tool_name.is_empty()) {
        let action = describe_tool(&turn.tool_name, &turn.tool_input);
        if !actions.contains(&action) {
            actions.push(action);
        }
    }
    actions.truncate(max_actions);
    actions.join(". ")
}

/// Describe one tool use in a few words.
#[must_use]
pub fn describe_tool(tool_name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or("");
    let file = || file_path_of(input).map_or("file", basename);

    match tool_name {
        "Read" => format!("Read {}", file()),
        "Write" => format!("Created {}", file()),
        "Edit" | "MultiEdit" | "NotebookEdit" => format!("Modified {}", file()),
        "Bash" => describe_command(field("command")),
        "Glob" => format!("Searched files: {}", field("pattern")),
        "Grep" => format!("Searched content: {}", field("pattern")),
        "Task" => "Subagent task".to_string(),
        "WebFetch" => "Fetched URL".to_string(),
        "WebSearch" => format!("Web search: {}", snippet(field("query"))),
        other => format!("Used {other}"),
    }
}

/// Classify a shell command by its leading program.
fn describe_command(command: &str) -> String {
    let cmd = strip_env_prefix(command.trim());

    for tool in ["npm", "git", "cargo"] {
        if let Some(rest) = cmd.strip_prefix(tool).and_then(|r| r.strip_prefix(' ')) {
            return format!("{tool}: {}", snippet(rest));
        }
    }

    if cmd == "cd" || cmd.starts_with("cd ") {
        return "Changed directory".to_string();
    }

    if cmd.chars().count() > SNIPPET_LEN {
        format!("Ran: {}...", snippet(cmd))
    } else {
        format!("Ran: {cmd}")
    }
}

/// Drop `env` and leading `VAR=value` assignments from a command.
fn strip_env_prefix(cmd: &str) -> &str {
    let mut rest = cmd.strip_prefix("env ").unwrap_or(cmd).trim_start();
    loop {
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_end];
        let is_assignment = word
            .split_once('=')
            .is_some_and(|(name, _)| is_env_name(name));
        if !is_assignment || word_end == rest.len() {
            return rest;
        }
        rest = rest[word_end..].trim_start();
    }
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn snippet(s: &str) -> String {
    s.chars().take(SNIPPET_LEN).collect()
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Distinct file paths touched by tools matching any of the patterns.
fn collect_files(turns: &[TurnEvent], patterns: &[String]) -> Vec<String> {
    let patterns: Vec<Pattern> = patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();

    let mut files: Vec<String> = Vec::new();
    for turn in turns {
        if !patterns.iter().any(|p| p.matches(&turn.tool_name)) {
            continue;
        }
        if let Some(path) = file_path_of(&turn.tool_input) {
            if !files.iter().any(|f| f == path) {
                files.push(path.to_string());
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn turn(n: u64, tool: &str, input: Value) -> TurnEvent {
        TurnEvent::new(n, tool, input)
    }

    #[test]
    fn describes_file_tools_by_basename() {
        assert_eq!(
            describe_tool("Read", &json!({"file_path": "/src/core/state.rs"})),
            "Read state.rs"
        );
        assert_eq!(
            describe_tool("Write", &json!({"file_path": "/tmp/new.txt"})),
            "Created new.txt"
        );
        assert_eq!(
            describe_tool("Edit", &json!({"file_path": "C:\\work\\main.rs"})),
            "Modified main.rs"
        );
        assert_eq!(describe_tool("Read", &json!({})), "Read file");
    }

    #[test]
    fn classifies_shell_commands() {
        let bash = |cmd: &str| describe_tool("Bash", &json!({ "command": cmd }));

        assert_eq!(bash("npm install --save-dev vitest"), "npm: install --save-dev vitest");
        assert_eq!(bash("git status"), "git: status");
        assert_eq!(bash("cargo test --all"), "cargo: test --all");
        assert_eq!(bash("cd /tmp"), "Changed directory");
        assert_eq!(bash("ls -la"), "Ran: ls -la");
        assert_eq!(
            bash("find . -name '*.rs' -exec grep -l unwrap {} +"),
            "Ran: find . -name '*.rs' -exec grep..."
        );
    }

    #[test]
    fn strips_env_assignments_before_classifying() {
        let bash = |cmd: &str| describe_tool("Bash", &json!({ "command": cmd }));

        assert_eq!(bash("RUST_LOG=debug cargo run"), "cargo: run");
        assert_eq!(bash("env GIT_PAGER=cat git log"), "git: log");
        assert_eq!(bash("FOO=1"), "Ran: FOO=1");
    }

    #[test]
    fn describes_search_and_web_tools() {
        assert_eq!(
            describe_tool("Glob", &json!({"pattern": "**/*.rs"})),
            "Searched files: **/*.rs"
        );
        assert_eq!(
            describe_tool("Grep", &json!({"pattern": "fn main"})),
            "Searched content: fn main"
        );
        assert_eq!(describe_tool("Task", &json!({})), "Subagent task");
        assert_eq!(describe_tool("WebFetch", &json!({"url": "x"})), "Fetched URL");
        assert_eq!(
            describe_tool(
                "WebSearch",
                &json!({"query": "rust atomic file rename semantics on windows"})
            ),
            "Web search: rust atomic file rename semant"
        );
        assert_eq!(describe_tool("mcp__github__list", &json!({})), "Used mcp__github__list");
    }

    #[test]
    fn digest_dedups_and_caps_at_five() {
        let turns = vec![
            turn(1, "Read", json!({"file_path": "/a.rs"})),
            turn(2, "Read", json!({"file_path": "/a.rs"})),
            turn(3, "Edit", json!({"file_path": "/a.rs"})),
            turn(4, "Bash", json!({"command": "cargo build"})),
            turn(5, "Glob", json!({"pattern": "*.md"})),
            turn(6, "Grep", json!({"pattern": "TODO"})),
            turn(7, "Task", json!({})),
        ];

        let summary = generate_summary(&turns, 1, 7);
        assert_eq!(
            summary.summary,
            "Read a.rs. Modified a.rs. cargo: build. Searched files: *.md. Searched content: TODO"
        );
    }

    #[test]
    fn empty_batch_has_placeholder_digest() {
        let summary = generate_summary(&[], 1, 5);
        assert_eq!(summary.summary, EMPTY_DIGEST);
        assert!(summary.files_read.is_empty());
        assert!(summary.files_modified.is_empty());
        assert_eq!(summary.tokens_used, 0);
        assert_eq!((summary.turn_start, summary.turn_end), (1, 5));
    }

    #[test]
    fn turns_without_tool_name_are_ignored() {
        let turns = vec![turn(1, "", json!({"file_path": "/a"}))];
        assert_eq!(generate_summary(&turns, 1, 1).summary, EMPTY_DIGEST);
    }

    #[test]
    fn collects_read_and_modified_files() {
        let turns = vec![
            turn(1, "Read", json!({"file_path": "/src/lib.rs"})),
            turn(2, "Read", json!({"file_path": "/src/lib.rs"})),
            turn(3, "Write", json!({"file_path": "/src/new.rs"})),
            turn(4, "Edit", json!({"file_path": "/src/lib.rs"})),
            turn(5, "NotebookEdit", json!({"notebook_path": "/nb.ipynb"})),
            turn(6, "Bash", json!({"command": "cat /etc/hosts"})),
        ];

        let summary = generate_summary(&turns, 1, 6);
        assert_eq!(summary.files_read, vec!["/src/lib.rs".to_string()]);
        assert_eq!(
            summary.files_modified,
            vec![
                "/src/new.rs".to_string(),
                "/src/lib.rs".to_string(),
                "/nb.ipynb".to_string()
            ]
        );
    }

    #[test]
    fn custom_tool_patterns_classify_files() {
        let config = SummarizerConfig {
            read_tools: vec!["mcp__fs__read*".to_string()],
            ..SummarizerConfig::default()
        };
        let turns = vec![turn(1, "mcp__fs__read_file", json!({"path": "/docs/a.md"}))];

        let summary = generate_summary_with(&turns, 1, 1, &config);
        assert_eq!(summary.files_read, vec!["/docs/a.md".to_string()]);
    }

    #[test]
    fn sums_per_turn_tokens() {
        let mut a = turn(1, "Read", json!({}));
        a.input_tokens = Some(100);
        a.output_tokens = Some(20);
        let mut b = turn(2, "Read", json!({}));
        b.output_tokens = Some(5);

        assert_eq!(generate_summary(&[a, b], 1, 2).tokens_used, 125);
    }

    #[test]
    fn token_sum_saturates() {
        let mut a = turn(1, "Read", json!({}));
        a.input_tokens = Some(u64::MAX);
        a.output_tokens = Some(1);
        let mut b = turn(2, "Read", json!({}));
        b.output_tokens = Some(u64::MAX);

        assert_eq!(generate_summary(&[a, b], 1, 2).tokens_used, u64::MAX);
    }

    #[test]
    fn should_summarize_at_interval() {
        assert!(!should_summarize(4, 0, 5));
        assert!(should_summarize(5, 0, 5));
        assert!(!should_summarize(7, 5, 5));
        assert!(should_summarize(10, 5, 5));
        // Stale high-water mark never underflows
        assert!(!should_summarize(3, 8, 5));
    }

    proptest! {
        #[test]
        fn digest_never_exceeds_cap(tools in prop::collection::vec("[A-Za-z]{1,12}", 0..40)) {
            let turns: Vec<TurnEvent> = tools
                .iter()
                .enumerate()
                .map(|(i, t)| turn(i as u64 + 1, t, json!({})))
                .collect();
            let summary = generate_summary(&turns, 1, turns.len() as u64);
            let parts = if summary.summary == EMPTY_DIGEST {
                0
            } else {
                summary.summary.split(". ").count()
            };
            prop_assert!(parts <= 5);
        }

        #[test]
        fn threshold_fires_once_per_crossing(interval in 1u32..20, turns in 1u64..200) {
            let mut last = 0u64;
            let mut fired = 0u64;
            for current in 1..=turns {
                if should_summarize(current, last, interval) {
                    prop_assert_eq!(current - last, u64::from(interval));
                    last = current;
                    fired += 1;
                }
            }
            prop_assert_eq!(fired, turns / u64::from(interval));
        }
    }
}
