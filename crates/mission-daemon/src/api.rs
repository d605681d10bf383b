// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP control-plane API types.
//!
//! This module defines the request/response envelopes and error type used
//! by the daemon REST API (spec §6). Handlers in [`crate::routes`] convert
//! these to/from the domain types in `mission-core`/`mission-store` and
//! delegate every non-trivial decision to `mission-engine`/`mission-signals`.

use chrono::{DateTime, Utc};
use mission_core::{RunMode, RunStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Missions
// ---------------------------------------------------------------------------

/// Summary row returned by `GET /api/missions`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MissionSummary {
    /// Mission identifier.
    pub id: Uuid,
    /// Mission title.
    pub title: String,
    /// Current status.
    pub status: RunStatus,
    /// Execution strategy.
    pub run_mode: RunMode,
    /// Number of task groups.
    pub task_group_count: usize,
    /// Number of artifacts recorded.
    pub artifact_count: usize,
    /// When the mission was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/missions`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateMissionRequest {
    /// Human-readable project key; the project is created if absent.
    pub project_slug: String,
    /// Mission title.
    pub title: String,
    /// Optional free-text summary, stored in `context.summary`.
    #[serde(default)]
    pub summary: Option<String>,
    /// Initial status. Defaults to `pending`.
    #[serde(default)]
    pub status: Option<RunStatus>,
}

/// Response body for `POST /missions/{id}/run`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunAcceptedResponse {
    /// The mission that was started.
    pub mission_id: Uuid,
    /// Final mission status once the run completed.
    pub status: RunStatus,
    /// Identifier of the workflow run record.
    pub run_id: Uuid,
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Request body for `POST /missions/{id}/artifacts`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateArtifactRequest {
    /// Artifact type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Stable path identifying this artifact's content.
    pub path: String,
    /// Schema/format version of the artifact content.
    pub version: String,
    /// 64 lowercase hex character SHA-256 digest of the content.
    pub sha256: String,
    /// Visibility scope. Defaults to `mission`.
    #[serde(default)]
    pub scope: Option<mission_core::Scope>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque metadata document.
    #[serde(default)]
    pub content_meta: serde_json::Value,
    /// If present, also creates a [`mission_core::Knowledge`] entry
    /// summarizing this artifact.
    #[serde(default)]
    pub knowledge_summary: Option<String>,
    /// Tags applied to the derived knowledge entry.
    #[serde(default)]
    pub knowledge_tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Request body for `POST /api/signals`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSignalRequest {
    /// Owning project.
    pub project_id: Uuid,
    /// Owning mission, if the signal is mission-scoped.
    #[serde(default)]
    pub mission_id: Option<Uuid>,
    /// Signal type tag (e.g. `"dangerous_command"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Severity.
    pub severity: mission_core::SignalSeverity,
    /// Human-readable message.
    pub message: String,
}

/// Query parameters for `GET /api/signals`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListSignalsQuery {
    /// Filter by owning project.
    pub project: Option<Uuid>,
    /// Filter by status.
    pub status: Option<mission_core::SignalStatus>,
    /// Filter by type tag.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Maximum rows returned. Defaults to 100.
    pub limit: Option<i64>,
}

/// Request body for `POST /api/signals/import/dangerous`.
#[derive(Clone, Debug, Deserialize)]
pub struct ImportDangerousRequest {
    /// Path to the dangerous-command JSONL log.
    pub path: String,
    /// Owning project, by id.
    #[serde(default)]
    pub project_id: Option<Uuid>,
    /// Owning project, by human key (resolved/created if `project_id` is
    /// absent).
    #[serde(default)]
    pub project: Option<String>,
    /// Mission to scope the imported signals to, if any.
    #[serde(default)]
    pub mission_id: Option<Uuid>,
    /// Maximum rows to import.
    pub max_rows: usize,
}

/// Response body for `POST /api/signals/import/dangerous`.
#[derive(Clone, Debug, Serialize)]
pub struct ImportDangerousResponse {
    /// Number of signals created.
    pub imported: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Response body for `GET /health` and `GET /health/liveness`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` for `/health`, `"alive"` for `/health/liveness`.
    pub status: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured API error returned on failure, shaped after
/// [`mission_core::error::ErrorInfo`] but trimmed to what the wire format
/// needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code, e.g. `"MO-N001"`.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ApiError {
    /// Build an [`ApiError`] from an [`mission_core::error::ErrorCode`] and
    /// a message.
    pub fn new(code: mission_core::error::ErrorCode, message: impl Into<String>) -> Self {
        Self { code: code.code().to_string(), message: message.into() }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_core::error::ErrorCode;

    #[test]
    fn api_error_serializes_with_code_and_message() {
        let err = ApiError::new(ErrorCode::MissionNotFound, "mission xyz not found");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "MO-N001");
        assert_eq!(json["message"], "mission xyz not found");
    }

    #[test]
    fn mission_summary_round_trips() {
        let summary = MissionSummary {
            id: Uuid::nil(),
            title: "demo".into(),
            status: RunStatus::Pending,
            run_mode: RunMode::Sequential,
            task_group_count: 2,
            artifact_count: 0,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: MissionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, summary.id);
        assert_eq!(back.task_group_count, 2);
    }

    #[test]
    fn create_artifact_request_defaults_tags_and_scope() {
        let json = serde_json::json!({
            "type": "diff",
            "path": "diffs/0001.patch",
            "version": "1",
            "sha256": "a".repeat(64),
        });
        let req: CreateArtifactRequest = serde_json::from_value(json).unwrap();
        assert!(req.tags.is_empty());
        assert!(req.scope.is_none());
        assert!(req.knowledge_summary.is_none());
    }
}
