//! CLI command implementations.

pub mod hook;
pub mod list;
pub mod recover;
pub mod show;
pub mod stats;
pub mod status;

use crate::config::{Config, load_config};
use crate::error::Result;
use crate::storage::FileBackend;
use chrono::{DateTime, Local, Utc};

/// Open the configured file store.
fn open_store(config: &Config) -> Result<FileBackend> {
    FileBackend::new(config.storage.path.clone())
}

/// Load configuration for a reporting command.
fn load() -> Result<(Config, FileBackend)> {
    let config = load_config()?;
    let store = open_store(&config)?;
    Ok((config, store))
}

/// Format UTC time as local time for display.
fn format_local_time(utc: DateTime<Utc>) -> String {
    let local: DateTime<Local> = utc.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Thousands separators for token counts.
fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Last path component of a project directory.
fn project_name(path: &str) -> &str {
    path.rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or("N/A")
}

/// First eight characters of a session id.
fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_count_groups_thousands() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn project_name_takes_last_component() {
        assert_eq!(project_name("/home/me/work/app"), "app");
        assert_eq!(project_name("C:\\work\\app\\"), "app");
        assert_eq!(project_name(""), "N/A");
    }

    #[test]
    fn short_id_truncates() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
