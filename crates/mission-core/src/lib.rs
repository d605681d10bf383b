// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mission-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract for the Mission Orchestrator.
//!
//! If you only take one dependency, take this one.

/// Comprehensive error catalog for the Mission Orchestrator.
pub mod error;
/// Millisecond-precision `Duration` (de)serialization helpers.
pub mod duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Current contract version string embedded in persisted records.
///
/// # Examples
///
/// ```
/// assert_eq!(mission_core::CONTRACT_VERSION, "mission/v1");
/// ```
pub const CONTRACT_VERSION: &str = "mission/v1";

// ---------------------------------------------------------------------------
// Project / Agent
// ---------------------------------------------------------------------------

/// Ownership root for agents, missions, and signals.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    /// Unique identifier.
    pub id: Uuid,
    /// URL-safe, stable slug derived from `human_key`.
    pub slug: String,
    /// Human-readable key as supplied by the caller (may contain `\` or `:`).
    pub human_key: String,
    /// When the project was first registered.
    pub created_at: DateTime<Utc>,
}

/// Derive a [`Project::slug`] from a human-supplied key.
///
/// Replaces path and namespace separators (`\`, `:`) with `-` so the result
/// is safe to use as a filesystem component and a URL path segment.
///
/// # Examples
///
/// ```
/// assert_eq!(mission_core::slugify("demo"), "demo");
/// assert_eq!(mission_core::slugify("org:team\\repo"), "org-team-repo");
/// ```
#[must_use]
pub fn slugify(human_key: &str) -> String {
    human_key.replace(['\\', ':'], "-")
}

/// Identity of an executor role within a project.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Agent {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// Role name, unique within `project_id`.
    pub name: String,
    /// Agent CLI program to invoke (e.g. `"claude"`).
    pub program: String,
    /// Preferred model identifier, if any.
    pub model: Option<String>,
    /// Declared skills/tags for routing.
    pub skills: BTreeSet<String>,
    /// Opaque contact policy (how/when this agent may be paged).
    pub contact_policy: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Mission / TaskGroup / Task
// ---------------------------------------------------------------------------

/// Status of a [`Mission`] or [`TaskGroup`].
///
/// Transitions only move forward: `Pending -> Running -> {Completed|Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl RunStatus {
    /// Returns `true` if `self -> next` is a legal forward transition.
    ///
    /// # Examples
    ///
    /// ```
    /// use mission_core::RunStatus;
    /// assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
    /// assert!(!RunStatus::Completed.can_transition_to(RunStatus::Running));
    /// ```
    #[must_use]
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    /// Returns `true` if this status is `Completed` or `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// How a mission's task groups are meant to be driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Groups and tasks execute one at a time, in `order`.
    Sequential,
    /// Reserved: concurrent execution of independent groups/tasks.
    Parallel,
    /// Reserved: a group repeats until an exit condition is met.
    Loop,
}

/// A structured workload composed of ordered task groups.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Mission {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// Short human-readable title.
    pub title: String,
    /// Current status.
    pub status: RunStatus,
    /// Execution strategy for task groups.
    pub run_mode: RunMode,
    /// Opaque, caller-supplied context document.
    #[serde(default)]
    pub context: serde_json::Value,
    /// When the mission was created.
    pub created_at: DateTime<Utc>,
    /// When the mission was last updated.
    pub updated_at: DateTime<Utc>,
}

/// An ordered collection of tasks within a [`Mission`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskGroup {
    /// Unique identifier.
    pub id: Uuid,
    /// Parent mission.
    pub mission_id: Uuid,
    /// Short human-readable title.
    pub title: String,
    /// How the tasks within this group are driven.
    pub kind: RunMode,
    /// Position among sibling groups (ties broken by insertion order).
    pub order: i64,
    /// Current status, mirroring [`Mission::status`]'s state space.
    pub status: RunStatus,
}

/// A single unit of work dispatched to an [`Agent`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    /// Unique identifier.
    pub id: Uuid,
    /// Parent task group.
    pub group_id: Uuid,
    /// Owning mission (denormalized for convenient lookups).
    pub mission_id: Uuid,
    /// Assignee agent.
    pub agent_id: Uuid,
    /// Short human-readable title.
    pub title: String,
    /// Current status.
    pub status: RunStatus,
    /// Position among sibling tasks (ties broken by insertion order).
    pub order: i64,
    /// Opaque input document. Defaults to an empty object if absent.
    #[serde(default)]
    pub input: serde_json::Value,
    /// Opaque output document, populated once the task completes.
    #[serde(default)]
    pub output: serde_json::Value,
    /// Error message, populated only when `status == Failed`.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Artifact / Knowledge
// ---------------------------------------------------------------------------

/// Scope at which an [`Artifact`] or [`Knowledge`] entry is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Visible only within the originating session.
    Session,
    /// Visible to the originating user across sessions.
    User,
    /// Visible to the whole project.
    Project,
    /// Visible to the whole mission.
    Mission,
}

/// An append-only record of something produced during a run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning mission.
    pub mission_id: Uuid,
    /// Task that produced this artifact, if any.
    pub task_id: Option<Uuid>,
    /// Artifact type tag (e.g. `"plan"`, `"diff"`, `"self_heal_artifact"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Visibility scope.
    pub scope: Scope,
    /// Stable, URI-safe path identifying this artifact's content.
    pub path: String,
    /// Schema/format version of the artifact content.
    pub version: String,
    /// 64 lowercase hex character SHA-256 digest of the content.
    pub sha256: String,
    /// Opaque metadata document.
    #[serde(default)]
    pub content_meta: serde_json::Value,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// When this artifact was recorded.
    pub created_at: DateTime<Utc>,
}

/// A derived, reusable summary of an [`Artifact`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Knowledge {
    /// Unique identifier.
    pub id: Uuid,
    /// Artifact this entry was derived from.
    pub source_artifact_id: Uuid,
    /// Schema/format version, copied from the source artifact.
    pub version: String,
    /// Visibility scope, copied from the source artifact.
    pub scope: Scope,
    /// SHA-256 digest, copied from the source artifact.
    pub sha256: String,
    /// Human-readable summary, truncated to 1024 characters.
    pub summary: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Whether this knowledge may be reused by future missions.
    pub reusable: bool,
    /// When this entry was recorded.
    pub created_at: DateTime<Utc>,
}

/// Maximum length, in characters, of a [`Knowledge::summary`].
pub const KNOWLEDGE_SUMMARY_MAX_CHARS: usize = 1024;

/// Truncate `summary` to [`KNOWLEDGE_SUMMARY_MAX_CHARS`] characters.
#[must_use]
pub fn truncate_summary(summary: &str) -> String {
    summary.chars().take(KNOWLEDGE_SUMMARY_MAX_CHARS).collect()
}

// ---------------------------------------------------------------------------
// WorkflowRun
// ---------------------------------------------------------------------------

/// Status of a single [`WorkflowRun`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

/// One execution attempt of a [`Mission`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowRun {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Mission this run executed.
    pub mission_id: Uuid,
    /// Execution strategy used for this attempt.
    pub mode: RunMode,
    /// Current status.
    pub status: WorkflowRunStatus,
    /// When this run started.
    pub started_at: DateTime<Utc>,
    /// When this run ended; set once `status != Running`.
    pub ended_at: Option<DateTime<Utc>>,
    /// URI of the JSONL trace file for this run.
    pub trace_uri: String,
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Severity of a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalSeverity {
    /// Informational only.
    Info,
    /// Worth a human's attention, not urgent.
    Warning,
    /// An operation failed.
    Error,
    /// Requires immediate attention.
    Critical,
}

/// Review status of a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// Awaiting review.
    Pending,
    /// Reviewed and approved.
    Approved,
    /// Reviewed and denied.
    Denied,
    /// Reviewed, no action taken (informational only).
    Acknowledged,
}

impl SignalStatus {
    /// Returns `true` if `self -> next` is a legal transition.
    ///
    /// Only `Pending` signals may transition, and only to a terminal state.
    #[must_use]
    pub fn can_transition_to(self, next: SignalStatus) -> bool {
        self == SignalStatus::Pending
            && matches!(
                next,
                SignalStatus::Approved | SignalStatus::Denied | SignalStatus::Acknowledged
            )
    }
}

/// A classified, queryable notable event awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Signal {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// Related mission, if any.
    pub mission_id: Option<Uuid>,
    /// Signal type tag (e.g. `"dangerous_command"`, `"self_heal_failed"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Severity.
    pub severity: SignalSeverity,
    /// Current review status.
    pub status: SignalStatus,
    /// Human-readable message.
    pub message: String,
    /// When this signal was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit record
// ---------------------------------------------------------------------------

/// One line of the hash-chained audit manifest (see `mission-audit`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuditRecord {
    /// RFC 3339 UTC timestamp.
    pub ts: DateTime<Utc>,
    /// Role that produced this record.
    pub actor: String,
    /// Event name (e.g. `"PLAN"`, `"TEST"`, `"PATCH"`, `"APPLY"`).
    pub event: String,
    /// Policy/rule identifiers that applied to this event.
    #[serde(default)]
    pub rule_ids: Vec<String>,
    /// References to the policy document(s) consulted.
    #[serde(default)]
    pub policy_refs: Vec<String>,
    /// Hex digest summarizing the reasoning that led to this event, if any.
    pub reasoning_digest: Option<String>,
    /// Hex digest of the event's inputs.
    pub inputs_hash: Option<String>,
    /// Hex digest of the event's outputs.
    pub outputs_hash: Option<String>,
    /// Approval state at the time this record was written.
    pub approval_state: Option<String>,
    /// Row identifier in an external approvals store, if any.
    pub approvals_row_id: Option<String>,
    /// Additional opaque metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// Errors from contract-level operations (serialization, hashing).
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// JSON serialization or deserialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a deterministic JSON string for hashing.
///
/// Not a full JCS implementation, but stable for our types: keys are sorted
/// (`serde_json::Map` is a `BTreeMap` by default) and numbers are serialized
/// consistently by `serde_json`.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the value cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ContractError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute the synthetic content-addressed SHA-256 of a self-heal artifact.
///
/// This is intentionally not a file digest: the recovery/summary artifacts
/// emitted by the workflow engine have no backing file, so their identity is
/// derived from `"<run_id>:<task_id>:<summary>"` instead.
///
/// # Examples
///
/// ```
/// use mission_core::self_heal_artifact_sha256;
/// use uuid::Uuid;
///
/// let run_id = Uuid::nil();
/// let task_id = Uuid::nil();
/// let hash = self_heal_artifact_sha256(run_id, task_id, "workflow completed");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, self_heal_artifact_sha256(run_id, task_id, "workflow completed"));
/// ```
#[must_use]
pub fn self_heal_artifact_sha256(run_id: Uuid, task_id: Uuid, summary: &str) -> String {
    sha256_hex(format!("{run_id}:{task_id}:{summary}").as_bytes())
}

/// Build the deterministic artifact `path` used by self-heal records.
///
/// Shape: `self_heal/<run_id>/<task_id>:<summary, truncated to 32 chars>`.
#[must_use]
pub fn self_heal_artifact_path(run_id: Uuid, task_id: Uuid, summary: &str) -> String {
    let truncated: String = summary.chars().take(32).collect();
    format!("self_heal/{run_id}/{task_id}:{truncated}")
}

/// Mapping from a human-readable key (e.g. a filesystem path or network
/// host) to the opaque key-value bag it maps to context config.
pub type OpaqueMap = BTreeMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_replaces_separators() {
        assert_eq!(slugify("demo"), "demo");
        assert_eq!(slugify("org:team\\repo"), "org-team-repo");
    }

    #[test]
    fn run_status_transitions_only_forward() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::Running));
        assert!(!RunStatus::Failed.can_transition_to(RunStatus::Running));
    }

    #[test]
    fn run_status_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn signal_status_only_pending_transitions() {
        assert!(SignalStatus::Pending.can_transition_to(SignalStatus::Approved));
        assert!(SignalStatus::Pending.can_transition_to(SignalStatus::Denied));
        assert!(SignalStatus::Pending.can_transition_to(SignalStatus::Acknowledged));
        assert!(!SignalStatus::Approved.can_transition_to(SignalStatus::Denied));
    }

    #[test]
    fn self_heal_hash_is_deterministic_and_content_addressed() {
        let run_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let a = self_heal_artifact_sha256(run_id, task_id, "ok");
        let b = self_heal_artifact_sha256(run_id, task_id, "ok");
        let c = self_heal_artifact_sha256(run_id, task_id, "different");
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn truncate_summary_respects_max_length() {
        let long: String = "x".repeat(KNOWLEDGE_SUMMARY_MAX_CHARS + 100);
        let truncated = truncate_summary(&long);
        assert_eq!(truncated.chars().count(), KNOWLEDGE_SUMMARY_MAX_CHARS);
    }

    #[test]
    fn canonical_json_sorts_keys() {
        #[derive(Serialize)]
        struct Unordered {
            z: u32,
            a: u32,
        }
        let json = canonical_json(&Unordered { z: 1, a: 2 }).unwrap();
        assert_eq!(json, r#"{"a":2,"z":1}"#);
    }
}
