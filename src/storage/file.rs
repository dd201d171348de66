//! File-based storage backend.
//!
//! Layout under the base directory:
//!
//! ```text
//! sessions/<id>/session.json     session record
//! sessions/<id>/current.json     heartbeat snapshot
//! sessions/<id>/summaries.jsonl  append-only summary log
//! sessions/<id>/tokens.json      token ledger
//! sessions/<id>/turns.jsonl      pending turn buffer
//! ```

use crate::core::state::{CurrentState, Session, Summary, TokenLedger, TurnEvent};
use crate::error::{Error, Result};
use crate::storage::traits::SessionStore;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use uuid::Uuid;

const SESSION_FILE: &str = "session.json";
const CURRENT_FILE: &str = "current.json";
const SUMMARIES_FILE: &str = "summaries.jsonl";
const TOKENS_FILE: &str = "tokens.json";
const TURNS_FILE: &str = "turns.jsonl";

static SESSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,128}$").expect("valid session id pattern"));

/// File-based storage backend with atomic writes.
#[derive(Debug)]
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    /// Create a new file backend.
    ///
    /// Creates the sessions directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the sessions directory cannot be created.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(base_dir.join("sessions"))?;
        Ok(Self { base_dir })
    }

    /// Base directory of this backend.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn sessions_dir(&self) -> PathBuf {
        self.base_dir.join("sessions")
    }

    /// Get the directory holding a session's files.
    fn session_dir(&self, session_id: &str) -> Result<PathBuf> {
        if !is_valid_session_id(session_id) {
            return Err(Error::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.sessions_dir().join(session_id))
    }

    fn session_file(&self, session_id: &str, name: &str) -> Result<PathBuf> {
        Ok(self.session_dir(session_id)?.join(name))
    }

    /// Read every session directory's copy of one file.
    fn read_all<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let sessions_dir = self.sessions_dir();
        let mut items = Vec::new();

        if !sessions_dir.exists() {
            return Ok(items);
        }

        for entry in fs::read_dir(&sessions_dir)? {
            let path = entry?.path().join(name);
            if !path.is_file() {
                continue;
            }
            match read_json::<T>(&path) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file"),
            }
        }

        Ok(items)
    }
}

/// Whether a session ID can safely be used as a directory name.
#[must_use]
pub fn is_valid_session_id(session_id: &str) -> bool {
    SESSION_ID_RE.is_match(session_id) && session_id != "." && session_id != ".."
}

impl SessionStore for FileBackend {
    fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        read_json(&self.session_file(session_id, SESSION_FILE)?)
    }

    fn put_session(&self, session: &Session) -> Result<()> {
        write_json_atomic(&self.session_file(&session.id, SESSION_FILE)?, session)
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        self.read_all(SESSION_FILE)
    }

    fn get_current_state(&self, session_id: &str) -> Result<Option<CurrentState>> {
        read_json(&self.session_file(session_id, CURRENT_FILE)?)
    }

    fn put_current_state(&self, session_id: &str, state: &CurrentState) -> Result<()> {
        write_json_atomic(&self.session_file(session_id, CURRENT_FILE)?, state)
    }

    fn append_summary(&self, session_id: &str, summary: &Summary) -> Result<()> {
        append_json_line(&self.session_file(session_id, SUMMARIES_FILE)?, summary)
    }

    fn get_summaries(&self, session_id: &str) -> Result<Vec<Summary>> {
        read_json_lines(&self.session_file(session_id, SUMMARIES_FILE)?)
    }

    fn get_token_ledger(&self, session_id: &str) -> Result<Option<TokenLedger>> {
        read_json(&self.session_file(session_id, TOKENS_FILE)?)
    }

    fn put_token_ledger(&self, ledger: &TokenLedger) -> Result<()> {
        write_json_atomic(&self.session_file(&ledger.session_id, TOKENS_FILE)?, ledger)
    }

    fn list_token_ledgers(&self) -> Result<Vec<TokenLedger>> {
        self.read_all(TOKENS_FILE)
    }

    fn get_pending_turns(&self, session_id: &str) -> Result<Vec<TurnEvent>> {
        read_json_lines(&self.session_file(session_id, TURNS_FILE)?)
    }

    fn append_pending_turn(&self, session_id: &str, turn: &TurnEvent) -> Result<()> {
        append_json_line(&self.session_file(session_id, TURNS_FILE)?, turn)
    }

    fn clear_pending_turns(&self, session_id: &str) -> Result<()> {
        let path = self.session_file(session_id, TURNS_FILE)?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Read a JSON document, `None` if the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Replace a JSON document atomically.
///
/// Writes a uniquely named temp file next to the target, syncs it, then
/// renames it over the target. Concurrent writers never share a temp file.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage(io::Error::other("path has no parent")))?;
    fs::create_dir_all(dir)?;

    let name = path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let temp = dir.join(format!(".{name}.{}.tmp", Uuid::new_v4()));

    let contents = serde_json::to_vec_pretty(value)?;
    let write = || -> io::Result<()> {
        let mut file = File::create(&temp)?;
        file.write_all(&contents)?;
        file.sync_all()?;
        fs::rename(&temp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&temp);
        Error::Storage(e)
    })
}

/// Append one JSON line and sync it.
///
/// If a previous writer left a torn line without a trailing newline, a
/// newline is written first so the new record stays parseable.
fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .read(true)
        .create(true)
        .append(true)
        .open(path)?;

    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            line.insert(0, b'\n');
        }
    }

    file.write_all(&line)?;
    file.sync_data()?;
    Ok(())
}

/// Read a JSON-lines file, skipping lines that fail to parse.
fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    // Bytes, not a string: a torn tail may end inside a multibyte character
    let contents = fs::read(path)?;
    let items = contents
        .split(|&b| b == b'\n')
        .filter(|line| !line.trim_ascii().is_empty())
        .filter_map(|line| match serde_json::from_slice(line) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping torn line");
                None
            }
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::SessionStatus;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_backend() -> (FileBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path().to_path_buf()).unwrap();
        (backend, temp_dir)
    }

    fn summary(start: u64, end: u64) -> Summary {
        Summary {
            turn_start: start,
            turn_end: end,
            summary: format!("turns {start}-{end}"),
            files_read: vec![],
            files_modified: vec!["/src/lib.rs".to_string()],
            tokens_used: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn creates_sessions_directory() {
        let temp_dir = TempDir::new().unwrap();
        let _backend = FileBackend::new(temp_dir.path().to_path_buf()).unwrap();
        assert!(temp_dir.path().join("sessions").exists());
    }

    #[test]
    fn get_missing_session() {
        let (store, _temp) = create_test_backend();
        assert!(store.get_session("nonexistent").unwrap().is_none());
    }

    #[test]
    fn put_and_get_session() {
        let (store, _temp) = create_test_backend();
        store.put_session(&Session::new("test-123", "/tmp")).unwrap();

        let retrieved = store.get_session("test-123").unwrap().unwrap();
        assert_eq!(retrieved.id, "test-123");
        assert_eq!(retrieved.status, SessionStatus::Active);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let (store, temp_dir) = create_test_backend();
        store.put_session(&Session::new("test-123", "")).unwrap();

        let dir = temp_dir.path().join("sessions").join("test-123");
        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["session.json".to_string()]);
    }

    #[test]
    fn rejects_path_traversal_ids() {
        let (store, _temp) = create_test_backend();
        for bad in ["..", ".", "../etc", "a/b", ""] {
            let result = store.get_session(bad);
            assert!(
                matches!(result, Err(Error::InvalidSessionId(_))),
                "accepted {bad:?}"
            );
        }
        assert!(is_valid_session_id("0f3c2a1e-5b7d-4c8e-9a6b-1d2e3f4a5b6c"));
    }

    #[test]
    fn list_sessions_skips_corrupted_records() {
        let (store, temp_dir) = create_test_backend();
        store.put_session(&Session::new("valid", "")).unwrap();

        let sessions_dir = temp_dir.path().join("sessions");
        for (name, contents) in [
            ("corrupted", "{ not json }"),
            ("empty", ""),
            ("partial", r#"{"id": "partial", "status": "#),
            ("wrong-schema", r#"{"name": "x"}"#),
        ] {
            fs::create_dir_all(sessions_dir.join(name)).unwrap();
            fs::write(sessions_dir.join(name).join("session.json"), contents).unwrap();
        }
        // A stray file at the top level is ignored as well
        fs::write(sessions_dir.join("orphan.tmp"), "{}").unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "valid");
    }

    #[test]
    fn get_session_corrupted_returns_error() {
        let (store, temp_dir) = create_test_backend();
        let dir = temp_dir.path().join("sessions").join("corrupted");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("session.json"), "{ invalid }").unwrap();

        assert!(store.get_session("corrupted").is_err());
    }

    #[test]
    fn summaries_append_in_order() {
        let (store, _temp) = create_test_backend();
        store.append_summary("s", &summary(1, 5)).unwrap();
        store.append_summary("s", &summary(6, 10)).unwrap();

        let summaries = store.get_summaries("s").unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].turn_start, 1);
        assert_eq!(summaries[1].turn_start, 6);
        assert!(summaries[0].files_read.is_empty());
    }

    #[test]
    fn torn_summary_line_is_skipped_and_next_append_survives() {
        let (store, temp_dir) = create_test_backend();
        store.append_summary("s", &summary(1, 5)).unwrap();

        // Simulate a crash mid-append: a partial record without newline
        let path = temp_dir
            .path()
            .join("sessions")
            .join("s")
            .join("summaries.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"turn_start": 6, "turn_e"#).unwrap();
        drop(file);

        assert_eq!(store.get_summaries("s").unwrap().len(), 1);

        store.append_summary("s", &summary(6, 10)).unwrap();
        let summaries = store.get_summaries("s").unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].turn_end, 10);
    }

    #[test]
    fn torn_multibyte_tail_keeps_earlier_summaries() {
        let (store, temp_dir) = create_test_backend();
        let mut first = summary(1, 5);
        first.summary = "Read 설정.rs".to_string();
        store.append_summary("s", &first).unwrap();

        // Cut in the middle of a three-byte character
        let path = temp_dir
            .path()
            .join("sessions")
            .join("s")
            .join("summaries.jsonl");
        let partial = r#"{"turn_start":6,"summary":"설"#.as_bytes();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&partial[..partial.len() - 2]).unwrap();
        drop(file);

        let summaries = store.get_summaries("s").unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].summary, "Read 설정.rs");

        store.append_summary("s", &summary(6, 10)).unwrap();
        assert_eq!(store.get_summaries("s").unwrap().len(), 2);
    }

    #[test]
    fn pending_turns_roundtrip_and_clear() {
        let (store, _temp) = create_test_backend();
        store
            .append_pending_turn("s", &TurnEvent::new(1, "Read", json!({"file_path": "/a"})))
            .unwrap();
        store
            .append_pending_turn("s", &TurnEvent::new(2, "Bash", json!({"command": "ls"})))
            .unwrap();

        let turns = store.get_pending_turns("s").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].tool_name, "Bash");

        store.clear_pending_turns("s").unwrap();
        assert!(store.get_pending_turns("s").unwrap().is_empty());
        // Clearing twice is fine
        store.clear_pending_turns("s").unwrap();
    }

    #[test]
    fn token_ledgers_listed_across_sessions() {
        let (store, _temp) = create_test_backend();
        let mut a = TokenLedger::new("a");
        a.record(1, 100, 10, None, Utc::now());
        store.put_token_ledger(&a).unwrap();
        store.put_token_ledger(&TokenLedger::new("b")).unwrap();

        let ledgers = store.list_token_ledgers().unwrap();
        assert_eq!(ledgers.len(), 2);
        assert_eq!(store.get_token_ledger("a").unwrap().unwrap(), a);
    }

    #[test]
    fn current_state_overwritten_in_place() {
        let (store, _temp) = create_test_backend();
        let first = CurrentState::for_turn(1, "Read", &json!({}), "t1", "/");
        let second = CurrentState::for_turn(2, "Edit", &json!({}), "t2", "/");
        store.put_current_state("s", &first).unwrap();
        store.put_current_state("s", &second).unwrap();

        let current = store.get_current_state("s").unwrap().unwrap();
        assert_eq!(current.turn, 2);
        assert_eq!(current.last_tool, "Edit");
    }
}
