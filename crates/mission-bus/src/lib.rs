// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mission-bus

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::Utc;
use serde_json::Value;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Errors raised by message bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// An I/O error occurred reading or writing a mailbox file.
    #[error("message bus i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A mailbox file's content was not a JSON array.
    #[error("mailbox file {0} did not contain a JSON array")]
    NotAnArray(PathBuf),
    /// A mailbox file could not be parsed as JSON.
    #[error("mailbox json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Default base directory for role mailboxes when none is supplied.
pub const DEFAULT_BASE: &str = "role_messages";

fn mailbox_path(role: &str, base: Option<&Path>) -> PathBuf {
    let base = base.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_BASE));
    base.join(format!("{role}.json"))
}

/// Load the ordered array of messages for `path`, or an empty vector if the
/// file does not exist yet.
///
/// # Errors
///
/// Returns [`BusError`] if the file exists but cannot be read or parsed, or
/// if its content is valid JSON but not an array.
pub fn read(path: impl AsRef<Path>) -> Result<Vec<Value>, BusError> {
    let path = path.as_ref();
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(&raw)?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(BusError::NotAnArray(path.to_path_buf())),
    }
}

/// Append `message` to the JSON array at `path`, stamping it with an
/// ISO-8601 UTC `ts` field if the message lacks one, and rewrite the whole
/// file atomically.
///
/// # Errors
///
/// Returns [`BusError`] if the existing file cannot be read/parsed or the
/// new content cannot be written.
pub fn append(path: impl AsRef<Path>, mut message: Value) -> Result<(), BusError> {
    let path = path.as_ref();
    let mut messages = read(path)?;

    if let Value::Object(map) = &mut message {
        map.entry("ts").or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    }
    messages.push(message);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(&messages)?;
    write_atomic(path, body.as_bytes())?;
    tracing::debug!(target: "mission.bus", path = %path.display(), count = messages.len(), "mailbox appended");
    Ok(())
}

/// Append `payload` to `role`'s mailbox under `base` (or [`DEFAULT_BASE`]),
/// returning the mailbox path written to.
///
/// # Errors
///
/// Returns [`BusError`] on any underlying read/write/parse failure.
pub fn send(role: &str, payload: Value, base: Option<&Path>) -> Result<PathBuf, BusError> {
    let path = mailbox_path(role, base);
    append(&path, payload)?;
    Ok(path)
}

/// Return the latest message for `role` under `base` (or [`DEFAULT_BASE`])
/// with its `ts` field stripped, or an empty object if the mailbox is
/// absent or empty.
///
/// # Errors
///
/// Returns [`BusError`] if the mailbox file exists but cannot be
/// read/parsed.
pub fn receive(role: &str, base: Option<&Path>) -> Result<Value, BusError> {
    let path = mailbox_path(role, base);
    let messages = read(&path)?;
    let Some(mut latest) = messages.into_iter().last() else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    if let Value::Object(map) = &mut latest {
        map.remove("ts");
    }
    Ok(latest)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp_path = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("mailbox"),
        uuid::Uuid::new_v4()
    ));
    {
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
}
