// SPDX-License-Identifier: MIT OR Apache-2.0
//! The workflow run trace writer (spec §4.6.4): one JSON object per line,
//! `{ts, event, ...payload}`, appended to
//! `<trace_dir>/workflow_run_<run_id>.jsonl`. Writes are line-buffered
//! append; corruption handling is out of scope, the trace is advisory.

use crate::error::EngineError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Appends trace events for one [`mission_core::WorkflowRun`] attempt.
pub struct TraceWriter {
    path: PathBuf,
}

impl TraceWriter {
    /// Trace log path for `run_id` under `trace_dir`, per spec §4.6.4.
    #[must_use]
    pub fn path_for(trace_dir: &Path, run_id: Uuid) -> PathBuf {
        trace_dir.join(format!("workflow_run_{run_id}.jsonl"))
    }

    /// Bind to the trace log for `run_id` under `trace_dir`.
    #[must_use]
    pub fn new(trace_dir: &Path, run_id: Uuid) -> Self {
        Self { path: Self::path_for(trace_dir, run_id) }
    }

    /// URI recorded on [`mission_core::WorkflowRun::trace_uri`].
    #[must_use]
    pub fn uri(&self) -> String {
        self.path.display().to_string()
    }

    /// Append one `{ts, event, ...payload}` line.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Trace`] if the line cannot be written.
    pub async fn emit(
        &self,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        let mut line = serde_json::json!({"ts": Utc::now(), "event": event});
        if let (Some(target), serde_json::Value::Object(extra)) = (line.as_object_mut(), payload) {
            target.extend(extra);
        }
        let serialized = serde_json::to_string(&line).unwrap_or_default();

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| EngineError::Trace {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|source| EngineError::Trace { path: self.path.display().to_string(), source })?;
        f.write_all(format!("{serialized}\n").as_bytes()).await.map_err(|source| {
            EngineError::Trace { path: self.path.display().to_string(), source }
        })?;
        Ok(())
    }
}
