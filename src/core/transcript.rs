//! Transcript usage extraction.
//!
//! The host writes a JSONL transcript per session. Each assistant record may
//! carry a message id and a usage block. The same message id is repeated
//! across records (one per content block), so records are keyed and only the
//! first occurrence of a key counts. The ledger remembers how many lines were
//! already accounted; a later read counts only records first seen past that
//! mark.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One usage-bearing transcript record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// Dedup key: message id, else record uuid, else line position.
    pub key: String,
    /// Zero-based line of the first record with this key.
    pub line: u64,
    /// Context size for this request (fresh plus cached input).
    pub input_tokens: u64,
    /// Output tokens produced by this response.
    pub output_tokens: u64,
    /// Model identifier.
    pub model: Option<String>,
}

/// Records parsed from a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Usage records, first occurrence per key, in file order.
    pub records: Vec<UsageRecord>,
    /// Lines that are final: newline terminated, or a last line that parsed.
    pub settled_lines: u64,
}

/// Usage contributed by a transcript read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptUsage {
    /// Last observed context size among newly counted records.
    pub input_tokens: Option<u64>,
    /// Output tokens from newly counted records.
    pub output_tokens: u64,
    /// Last model seen.
    pub model: Option<String>,
    /// Records counted by this read.
    pub records: usize,
    /// Line mark to store once this usage is recorded.
    pub settled_lines: u64,
}

impl TranscriptUsage {
    /// Whether this read adds anything to the ledger.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

#[derive(Debug, Deserialize)]
struct Line {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

/// Read usage records from a transcript file.
///
/// A missing or unreadable file is treated as an empty transcript. A torn
/// last line, even one cut inside a multibyte character, is skipped.
#[must_use]
pub fn read_transcript(path: &Path) -> Transcript {
    match fs::read(path) {
        Ok(content) => parse_transcript(content),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "transcript unreadable, treating as empty");
            Transcript::default()
        }
    }
}

/// Parse usage records from raw transcript bytes.
#[must_use]
pub fn parse_transcript(content: impl AsRef<[u8]>) -> Transcript {
    let content = content.as_ref();
    let mut seen = HashSet::new();
    let mut transcript = Transcript::default();
    let mut lines = content.split(|&b| b == b'\n').peekable();
    let mut index: u64 = 0;

    while let Some(raw) = lines.next() {
        let terminated = lines.peek().is_some();
        let line = index;
        index += 1;

        if raw.trim_ascii().is_empty() {
            if terminated {
                transcript.settled_lines = index;
            }
            continue;
        }
        let Ok(parsed) = serde_json::from_slice::<Line>(raw) else {
            if terminated {
                transcript.settled_lines = index;
            }
            continue;
        };
        transcript.settled_lines = index;

        let (message_id, model, usage) = match parsed.message {
            Some(message) => (
                message.id,
                message.model,
                message.usage.or(parsed.usage),
            ),
            None => (None, None, parsed.usage),
        };
        let Some(usage) = usage else {
            continue;
        };

        let key = message_id
            .or(parsed.message_id)
            .or(parsed.uuid)
            .unwrap_or_else(|| format!("line:{line}"));
        if !seen.insert(key.clone()) {
            continue;
        }

        transcript.records.push(UsageRecord {
            key,
            line,
            input_tokens: usage
                .input_tokens
                .saturating_add(usage.cache_creation_input_tokens)
                .saturating_add(usage.cache_read_input_tokens),
            output_tokens: usage.output_tokens,
            model,
        });
    }

    transcript
}

/// Combine the records first seen at or past `accounted_lines`.
///
/// Input is the last such record's context size (it is cumulative per
/// request, so summing would double count). Output sums them.
#[must_use]
pub fn tally(transcript: &Transcript, accounted_lines: u64) -> TranscriptUsage {
    let mut usage = TranscriptUsage {
        settled_lines: transcript.settled_lines.max(accounted_lines),
        ..TranscriptUsage::default()
    };

    for record in transcript.records.iter().filter(|r| r.line >= accounted_lines) {
        usage.input_tokens = Some(record.input_tokens);
        if record.model.is_some() {
            usage.model.clone_from(&record.model);
        }
        usage.output_tokens = usage.output_tokens.saturating_add(record.output_tokens);
        usage.records += 1;
    }

    usage
}
