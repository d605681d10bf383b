// SPDX-License-Identifier: MIT OR Apache-2.0
//! mission-evidence
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The Evidence Emitter (spec §4.10): a best-effort, append-only JSON-lines
//! log used by CI to correlate orchestrator steps post-hoc. Every record
//! names the files it touched together with their SHA-256 digest, so a CI
//! job can verify an artifact wasn't silently swapped between steps.
//!
//! Writes here must never fail the caller — evidence is advisory, not
//! load-bearing. Every fallible operation is swallowed and logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Default path for the CI-visible evidence log, relative to the process's
/// working directory, per spec §6 "On-disk formats".
pub const DEFAULT_EVIDENCE_PATH: &str = "observability/policy/ci_evidence.jsonl";

/// A file referenced by an [`EvidenceRecord`], together with its digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    /// Path to the file, as recorded by the emitting component.
    pub path: String,
    /// 64 lowercase hex character SHA-256 digest of the file's content.
    pub sha256: String,
}

impl FileRef {
    /// Build a [`FileRef`] by hashing the file at `path` on disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `path` cannot be read.
    pub fn from_disk(path: impl Into<String>) -> std::io::Result<Self> {
        let path = path.into();
        let bytes = std::fs::read(&path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Self { path, sha256: format!("{:x}", hasher.finalize()) })
    }

    /// Build a [`FileRef`] from an already-known digest, without touching
    /// disk (for synthetic/content-addressed artifacts).
    #[must_use]
    pub fn with_digest(path: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self { path: path.into(), sha256: sha256.into() }
    }
}

/// One line of the evidence log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// When this record was written.
    pub ts: DateTime<Utc>,
    /// Event name (e.g. `"orchestrator_run"`, `"orchestrator_chat_attach"`).
    pub event: String,
    /// Files this step touched, with their digests.
    #[serde(default)]
    pub files: Vec<FileRef>,
    /// Short status tag (e.g. `"ok"`, `"failed"`).
    pub status: String,
    /// Free-form human-readable note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Optional numeric metrics (duration, exit code, byte counts, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}

/// Fluent builder for an [`EvidenceRecord`], mirroring the teacher's
/// builder-style construction of rich structured values.
pub struct EvidenceRecordBuilder {
    record: EvidenceRecord,
}

impl EvidenceRecordBuilder {
    /// Start building a record for `event`, stamped with the current time.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            record: EvidenceRecord {
                ts: Utc::now(),
                event: event.into(),
                files: Vec::new(),
                status: "ok".to_string(),
                note: None,
                metrics: None,
            },
        }
    }

    /// Attach a file reference.
    #[must_use]
    pub fn file(mut self, file: FileRef) -> Self {
        self.record.files.push(file);
        self
    }

    /// Set the status tag.
    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.record.status = status.into();
        self
    }

    /// Attach a free-form note.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.record.note = Some(note.into());
        self
    }

    /// Attach a metrics document.
    #[must_use]
    pub fn metrics(mut self, metrics: serde_json::Value) -> Self {
        self.record.metrics = Some(metrics);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> EvidenceRecord {
        self.record
    }
}

/// Append-only writer for the CI evidence log.
#[derive(Debug, Clone)]
pub struct EvidenceEmitter {
    path: PathBuf,
}

impl Default for EvidenceEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVIDENCE_PATH)
    }
}

impl EvidenceEmitter {
    /// Write to a specific path, rather than [`DEFAULT_EVIDENCE_PATH`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path this emitter appends to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` to the evidence log. Best-effort: any failure
    /// (missing directory, serialization error, disk full) is logged at
    /// `warn` and swallowed — evidence emission must never fail the caller.
    pub fn emit(&self, record: &EvidenceRecord) {
        if let Err(err) = self.try_emit(record) {
            tracing::warn!(
                target: "mission.evidence",
                event = %record.event,
                error = %err,
                "failed to append evidence record"
            );
        }
    }

    fn try_emit(&self, record: &EvidenceRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = std::fs::OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// Read every record currently in the log, in append order. Used by
    /// tests and CI tooling; not part of the hot write path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read, or a
    /// JSON error if a line fails to parse.
    pub fn read_all(&self) -> std::io::Result<Vec<EvidenceRecord>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn emit_appends_one_line_per_record() {
        let dir = tempdir().unwrap();
        let emitter = EvidenceEmitter::new(dir.path().join("ci_evidence.jsonl"));
        emitter.emit(&EvidenceRecordBuilder::new("orchestrator_run").status("ok").build());
        emitter.emit(&EvidenceRecordBuilder::new("orchestrator_chat_attach").status("ok").build());
        let all = emitter.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event, "orchestrator_run");
        assert_eq!(all[1].event, "orchestrator_chat_attach");
    }

    #[test]
    fn file_ref_from_disk_hashes_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, b"{\"steps\":[]}").unwrap();
        let file_ref = FileRef::from_disk(path.to_string_lossy().to_string()).unwrap();
        assert_eq!(file_ref.sha256.len(), 64);
    }

    #[test]
    fn emit_swallows_errors_when_path_is_unwritable() {
        // Pointing at a path whose parent is a file (not a directory) makes
        // every write fail; `emit` must not panic or propagate.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let emitter = EvidenceEmitter::new(blocker.join("ci_evidence.jsonl"));
        emitter.emit(&EvidenceRecordBuilder::new("orchestrator_run").build());
    }

    #[test]
    fn read_all_on_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let emitter = EvidenceEmitter::new(dir.path().join("missing.jsonl"));
        assert!(emitter.read_all().unwrap().is_empty());
    }

    #[test]
    fn builder_attaches_files_and_metrics() {
        let record = EvidenceRecordBuilder::new("workflow_run")
            .file(FileRef::with_digest("plan.json", "a".repeat(64)))
            .status("ok")
            .note("completed cleanly")
            .metrics(serde_json::json!({"duration_ms": 42}))
            .build();
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.metrics.unwrap()["duration_ms"], 42);
    }
}
