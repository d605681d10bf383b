// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mission-audit
//!
//! A hash-chained, append-only event log. Every appended record extends a
//! rolling SHA-256 fold over all prior lines, so any edit to a historical
//! line is detectable without re-reading every record from the start of
//! time — only the current chain hash and the manifest are needed.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use mission_core::AuditRecord;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Errors raised by audit chain operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The record serialized to JSON containing an embedded newline.
    #[error("audit record serialized with an embedded newline")]
    EmbeddedNewline,
    /// An I/O error occurred reading or writing the manifest or chain file.
    #[error("audit i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be serialized to JSON.
    #[error("audit serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of a [`AuditChain::verify`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The recomputed chain hash matches the stored chain hash.
    Ok,
    /// The recomputed chain hash does not match; the manifest was tampered
    /// with or the chain file is stale.
    Tamper {
        /// Hash recorded in `manifest.sha256` (`None` if the file is absent/empty).
        expected: Option<String>,
        /// Hash recomputed by folding the current manifest content.
        computed: Option<String>,
    },
}

impl VerifyOutcome {
    /// `true` when the chain is intact.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Outcome of a best-effort [`AuditChain::sign`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    /// A detached signature was written to the given path.
    Signed(PathBuf),
    /// Signing was skipped; the reason is a short machine-readable tag
    /// (e.g. `"skip:no-signing-key"`).
    Skipped(String),
}

/// The environment variable naming a signing key file, per the orchestrator's
/// signing key locator contract.
pub const SIGNING_KEY_ENV: &str = "MISSION_SIGNING_KEY";

/// A disk-backed, hash-chained append-only event log.
///
/// Layout, rooted at a directory:
/// - `manifest.jsonl` — one JSON object per line, LF-terminated.
/// - `manifest.sha256` — hex rolling hash of the manifest's current content.
/// - `manifest.sig` — optional detached signature, written by [`AuditChain::sign`].
#[derive(Debug, Clone)]
pub struct AuditChain {
    manifest_path: PathBuf,
    chain_path: PathBuf,
    sig_path: PathBuf,
}

impl AuditChain {
    /// Open (or prepare to create) a chain rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            manifest_path: dir.join("manifest.jsonl"),
            chain_path: dir.join("manifest.sha256"),
            sig_path: dir.join("manifest.sig"),
        }
    }

    /// Path to the manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Path to the chain hash file.
    #[must_use]
    pub fn chain_path(&self) -> &Path {
        &self.chain_path
    }

    /// Append a record to the manifest, folding it into the rolling hash.
    ///
    /// Returns the new chain hash. Failure during the rename step leaves the
    /// previous manifest/chain pair untouched and consistent.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the record cannot be serialized, serializes
    /// with an embedded newline, or the manifest/chain files cannot be
    /// written.
    pub fn append(&self, record: &AuditRecord) -> Result<String, AuditError> {
        let line = serde_json::to_string(record)?;
        if line.contains('\n') {
            return Err(AuditError::EmbeddedNewline);
        }

        let mut content = self.read_manifest_raw()?;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&line);
        content.push('\n');

        let previous = self.read_chain_hash()?;
        let new_hash = fold_one(previous.as_deref(), &line);

        if let Some(parent) = self.manifest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_atomic(&self.manifest_path, content.as_bytes())?;
        write_atomic(&self.chain_path, new_hash.as_bytes())?;

        tracing::debug!(target: "mission.audit", event = %record.event, hash = %new_hash, "audit record appended");
        Ok(new_hash)
    }

    /// Recompute the chain hash by refolding every line currently in the
    /// manifest and compare it to the stored chain hash.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the manifest or chain file cannot be read.
    pub fn verify(&self) -> Result<VerifyOutcome, AuditError> {
        let lines = self.read_lines()?;
        let computed = fold_all(&lines);
        let expected = self.read_chain_hash()?;
        if computed == expected {
            Ok(VerifyOutcome::Ok)
        } else {
            Ok(VerifyOutcome::Tamper { expected, computed })
        }
    }

    /// Recompute and persist the chain hash from the manifest's current
    /// content, without attempting to resurrect any missing lines.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the manifest cannot be read or the chain
    /// file cannot be written.
    pub fn rebuild(&self) -> Result<Option<String>, AuditError> {
        let lines = self.read_lines()?;
        let new_hash = fold_all(&lines);
        match &new_hash {
            Some(hash) => write_atomic(&self.chain_path, hash.as_bytes())?,
            None => write_atomic(&self.chain_path, b"")?,
        }
        tracing::warn!(target: "mission.audit", hash = ?new_hash, "audit chain rebuilt");
        Ok(new_hash)
    }

    /// Best-effort detached signature over the manifest file.
    ///
    /// Looks for a signing key file path in the [`SIGNING_KEY_ENV`]
    /// environment variable. When absent, signing is skipped with reason
    /// `"skip:no-signing-key"` rather than treated as an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] only if a signing key is present but the
    /// manifest or signature file cannot be read/written.
    pub fn sign(&self) -> Result<SignOutcome, AuditError> {
        let Ok(key_path) = std::env::var(SIGNING_KEY_ENV) else {
            return Ok(SignOutcome::Skipped("skip:no-signing-key".to_string()));
        };
        let key_bytes = match std::fs::read(&key_path) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(SignOutcome::Skipped("skip:unreadable-signing-key".to_string())),
        };
        let manifest_bytes = match std::fs::read(&self.manifest_path) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(SignOutcome::Skipped("skip:no-manifest".to_string())),
        };

        let mut hasher = Sha256::new();
        hasher.update(&manifest_bytes);
        hasher.update(b"\0");
        hasher.update(&key_bytes);
        let signature = hex::encode(hasher.finalize());

        write_atomic(&self.sig_path, signature.as_bytes())?;
        Ok(SignOutcome::Signed(self.sig_path.clone()))
    }

    fn read_manifest_raw(&self) -> Result<String, AuditError> {
        match std::fs::read_to_string(&self.manifest_path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_lines(&self) -> Result<Vec<String>, AuditError> {
        let raw = self.read_manifest_raw()?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    fn read_chain_hash(&self) -> Result<Option<String>, AuditError> {
        match std::fs::read_to_string(&self.chain_path) {
            Ok(s) => {
                let s = s.trim().to_string();
                if s.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(s))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn fold_one(previous: Option<&str>, line: &str) -> String {
    match previous {
        None => mission_core::sha256_hex(line.as_bytes()),
        Some(prev) => {
            let mut buf = Vec::with_capacity(prev.len() + 1 + line.len());
            buf.extend_from_slice(prev.as_bytes());
            buf.push(b'\n');
            buf.extend_from_slice(line.as_bytes());
            mission_core::sha256_hex(&buf)
        }
    }
}

fn fold_all(lines: &[String]) -> Option<String> {
    let mut acc: Option<String> = None;
    for line in lines {
        if line.is_empty() {
            continue;
        }
        acc = Some(fold_one(acc.as_deref(), line));
    }
    acc
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp_path = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("audit"),
        uuid::Uuid::new_v4()
    ));
    {
        let mut f = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
}

/// A minimal hex encoder, avoiding a dependency on the `hex` crate for a
/// single call site.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write as _;
        let mut s = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

/// A generic atomic append-only JSON-lines log, for components (such as the
/// signal pipeline's dangerous-command log) that need append-only JSONL
/// durability without hash chaining.
pub struct JsonlAppender {
    path: PathBuf,
}

impl JsonlAppender {
    /// Create an appender writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one JSON-serializable value as a new line.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the value cannot be serialized or the file
    /// cannot be written.
    pub fn append<T: serde::Serialize>(&self, value: &T) -> Result<(), AuditError> {
        let line = serde_json::to_string(value)?;
        if line.contains('\n') {
            return Err(AuditError::EmbeddedNewline);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(event: &str) -> AuditRecord {
        AuditRecord {
            ts: Utc::now(),
            actor: "engine".to_string(),
            event: event.to_string(),
            rule_ids: vec![],
            policy_refs: vec![],
            reasoning_digest: None,
            inputs_hash: None,
            outputs_hash: None,
            approval_state: None,
            approvals_row_id: None,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn append_then_verify_succeeds() {
        let dir = tempdir().unwrap();
        let chain = AuditChain::new(dir.path());
        chain.append(&record("PLAN")).unwrap();
        chain.append(&record("APPLY")).unwrap();
        assert!(chain.verify().unwrap().is_ok());
    }

    #[test]
    fn tampering_with_a_line_is_detected() {
        let dir = tempdir().unwrap();
        let chain = AuditChain::new(dir.path());
        chain.append(&record("PLAN")).unwrap();
        chain.append(&record("TEST")).unwrap();
        chain.append(&record("APPLY")).unwrap();

        let mut content = std::fs::read_to_string(chain.manifest_path()).unwrap();
        content = content.replacen("TEST", "TSET", 1);
        std::fs::write(chain.manifest_path(), content).unwrap();

        let outcome = chain.verify().unwrap();
        assert!(!outcome.is_ok());
    }

    #[test]
    fn rebuild_then_verify_is_consistent() {
        let dir = tempdir().unwrap();
        let chain = AuditChain::new(dir.path());
        chain.append(&record("PLAN")).unwrap();
        chain.append(&record("APPLY")).unwrap();

        let mut content = std::fs::read_to_string(chain.manifest_path()).unwrap();
        content = content.replacen("PLAN", "PLAX", 1);
        std::fs::write(chain.manifest_path(), content).unwrap();
        assert!(!chain.verify().unwrap().is_ok());

        chain.rebuild().unwrap();
        assert!(chain.verify().unwrap().is_ok());
    }

    #[test]
    fn jsonl_appender_writes_one_line_per_call() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dangerous.jsonl");
        let appender = JsonlAppender::new(&path);
        appender.append(&serde_json::json!({"event": "dangerous_command"})).unwrap();
        appender.append(&serde_json::json!({"event": "approval_required"})).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
