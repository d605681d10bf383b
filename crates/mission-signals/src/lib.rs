// SPDX-License-Identifier: MIT OR Apache-2.0
//! mission-signals
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The Signal Pipeline (spec §4.7): classifies notable internal and
//! external events into queryable, approval-gated [`Signal`] records.
//! Built on top of [`mission_store::SignalRepo`]; this crate's job is the
//! pipeline logic on top of that storage — status transitions, and import
//! of externally-produced dangerous-command logs — not persistence itself.

use chrono::Utc;
use mission_core::{Signal, SignalSeverity, SignalStatus};
use mission_store::{SignalRepo, StoreError};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

/// Errors raised while creating, listing, or transitioning signals.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The requested transition is illegal from the signal's current status.
    ///
    /// Per [`mission_core::SignalStatus::can_transition_to`], only a
    /// `Pending` signal may transition, and only to a terminal state.
    #[error("signal {id} is not pending (status transitions require MO-C004 review)")]
    NotPending {
        /// Signal that was targeted.
        id: Uuid,
    },
    /// The dangerous-command log at the given path could not be read.
    #[error("failed to read dangerous command log {path}: {source}")]
    Import {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// One line of an externally-produced dangerous-command JSONL log, as
/// emitted by agent backends via `mission-audit`'s `JsonlAppender`.
#[derive(Debug, Deserialize)]
struct DangerousCommandRecord {
    event: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map an imported record's `event` tag to a [`SignalSeverity`], per spec
/// §4.7's dangerous-command classification.
fn classify_event(event: &str) -> SignalSeverity {
    match event {
        "dangerous_command" | "approval_required" => SignalSeverity::Warning,
        "failing_test" => SignalSeverity::Error,
        "self_heal_failed" => SignalSeverity::Critical,
        _ => SignalSeverity::Info,
    }
}

/// The Signal Pipeline: create, list, and transition [`Signal`] records,
/// plus import externally-produced dangerous-command logs.
pub struct SignalPipeline<'a> {
    repo: SignalRepo<'a>,
}

impl<'a> SignalPipeline<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a sqlx::SqlitePool) -> Self {
        Self { repo: SignalRepo::new(pool) }
    }

    /// Create a new `Pending` signal.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Store`] on any underlying database failure.
    pub async fn create(
        &self,
        project_id: Uuid,
        mission_id: Option<Uuid>,
        kind: impl Into<String>,
        severity: SignalSeverity,
        message: impl Into<String>,
    ) -> Result<Signal, SignalError> {
        let signal = Signal {
            id: Uuid::new_v4(),
            project_id,
            mission_id,
            kind: kind.into(),
            severity,
            status: SignalStatus::Pending,
            message: message.into(),
            created_at: Utc::now(),
        };
        self.repo.create(&signal).await?;
        tracing::info!(
            target: "mission.signals",
            signal_id = %signal.id,
            kind = %signal.kind,
            severity = ?signal.severity,
            "signal created"
        );
        Ok(signal)
    }

    /// List signals, optionally filtered by project, status, and/or kind,
    /// newest first, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Store`] on any underlying database failure.
    pub async fn list(
        &self,
        project_id: Option<Uuid>,
        status: Option<SignalStatus>,
        kind: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Signal>, SignalError> {
        Ok(self.repo.list(project_id, status, kind, limit).await?)
    }

    /// Transition a pending signal to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::NotPending`] (MO-C004) if `signal.status`
    /// cannot legally move to `next`, or [`SignalError::Store`] if the
    /// signal does not exist or the update fails.
    pub async fn transition(&self, id: Uuid, next: SignalStatus) -> Result<Signal, SignalError> {
        let current = self.repo.get(id).await?;
        if !current.status.can_transition_to(next) {
            return Err(SignalError::NotPending { id });
        }
        self.repo.set_status(id, next).await?;
        tracing::info!(
            target: "mission.signals",
            signal_id = %id,
            from = ?current.status,
            to = ?next,
            "signal transitioned"
        );
        Ok(Signal { status: next, ..current })
    }

    /// Read a dangerous-command JSONL log from `path` and create one
    /// `Pending` signal per line, capped at `max_rows`. Malformed lines are
    /// skipped and logged rather than aborting the import.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Import`] if `path` cannot be read, or
    /// [`SignalError::Store`] if persisting a signal fails.
    pub async fn import_dangerous(
        &self,
        path: impl AsRef<Path>,
        project_id: Uuid,
        mission_id: Option<Uuid>,
        max_rows: usize,
    ) -> Result<usize, SignalError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| SignalError::Import { path: path.display().to_string(), source })?;

        let mut imported = 0usize;
        for line in raw.lines().filter(|l| !l.trim().is_empty()).take(max_rows) {
            let record: DangerousCommandRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(
                        target: "mission.signals",
                        error = %err,
                        "skipping malformed dangerous command log line"
                    );
                    continue;
                }
            };
            let message = record
                .message
                .or(record.command)
                .unwrap_or_else(|| record.event.clone());
            self.create(
                project_id,
                mission_id,
                record.event.as_str(),
                classify_event(&record.event),
                message,
            )
            .await?;
            imported += 1;
        }
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn pool() -> sqlx::SqlitePool {
        mission_store::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_list_round_trips() {
        let pool = pool().await;
        let pipeline = SignalPipeline::new(&pool);
        let project_id = Uuid::new_v4();
        let created = pipeline
            .create(project_id, None, "dangerous_command", SignalSeverity::Warning, "rm -rf /")
            .await
            .unwrap();
        assert_eq!(created.status, SignalStatus::Pending);

        let listed = pipeline.list(Some(project_id), None, None, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
    }

    #[tokio::test]
    async fn transition_from_pending_succeeds() {
        let pool = pool().await;
        let pipeline = SignalPipeline::new(&pool);
        let project_id = Uuid::new_v4();
        let created = pipeline
            .create(project_id, None, "dangerous_command", SignalSeverity::Warning, "rm -rf /")
            .await
            .unwrap();

        let updated = pipeline.transition(created.id, SignalStatus::Approved).await.unwrap();
        assert_eq!(updated.status, SignalStatus::Approved);
    }

    #[tokio::test]
    async fn transition_from_non_pending_is_rejected() {
        let pool = pool().await;
        let pipeline = SignalPipeline::new(&pool);
        let project_id = Uuid::new_v4();
        let created = pipeline
            .create(project_id, None, "dangerous_command", SignalSeverity::Warning, "rm -rf /")
            .await
            .unwrap();
        pipeline.transition(created.id, SignalStatus::Denied).await.unwrap();

        let err = pipeline.transition(created.id, SignalStatus::Approved).await.unwrap_err();
        assert!(matches!(err, SignalError::NotPending { id } if id == created.id));
    }

    #[tokio::test]
    async fn import_dangerous_creates_one_signal_per_line() {
        let pool = pool().await;
        let pipeline = SignalPipeline::new(&pool);
        let project_id = Uuid::new_v4();

        let dir = tempdir().unwrap();
        let log_path = dir.path().join("dangerous.jsonl");
        std::fs::write(
            &log_path,
            concat!(
                "{\"event\":\"dangerous_command\",\"command\":\"rm -rf /\"}\n",
                "{\"event\":\"failing_test\",\"message\":\"suite red\"}\n",
                "not json at all\n",
            ),
        )
        .unwrap();

        let imported = pipeline.import_dangerous(&log_path, project_id, None, 100).await.unwrap();
        assert_eq!(imported, 2);

        let listed = pipeline.list(Some(project_id), None, None, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|s| s.severity == SignalSeverity::Error));
    }

    #[tokio::test]
    async fn import_dangerous_respects_max_rows() {
        let pool = pool().await;
        let pipeline = SignalPipeline::new(&pool);
        let project_id = Uuid::new_v4();

        let dir = tempdir().unwrap();
        let log_path = dir.path().join("dangerous.jsonl");
        std::fs::write(
            &log_path,
            "{\"event\":\"dangerous_command\"}\n{\"event\":\"dangerous_command\"}\n{\"event\":\"dangerous_command\"}\n",
        )
        .unwrap();

        let imported = pipeline.import_dangerous(&log_path, project_id, None, 2).await.unwrap();
        assert_eq!(imported, 2);
    }
}
