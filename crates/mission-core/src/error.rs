// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Comprehensive error catalog for the Mission Orchestrator.
//!
//! Every error code follows the pattern `MO-X###` where `X` is the taxonomy
//! kind letter and `###` is a three-digit number:
//!
//! - **V** — Validation (malformed input; 4xx; no retry)
//! - **N** — NotFound (entity absent; 404; no retry)
//! - **C** — Conflict (illegal state transition; 400; no retry)
//! - **T** — Transient (subprocess/store hiccup; engine may self-heal)
//! - **F** — Fatal (tamper/corruption; halt, do not auto-recover)
//! - **E** — External (best-effort subsystem failure; logged, never fatal)

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorKind — the taxonomy from the error handling design
// ---------------------------------------------------------------------------

/// Broad propagation-policy family an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input. No retry; surfaced as 4xx.
    Validation,
    /// Referenced entity does not exist. No retry; surfaced as 404.
    NotFound,
    /// Illegal state transition or precondition. No retry; surfaced as 400.
    Conflict,
    /// Subprocess timeout or transient store failure. Engine may self-heal.
    Transient,
    /// Audit tamper or store corruption. Halt; do not auto-recover.
    Fatal,
    /// Best-effort subsystem failure (signal POST, webhook). Never fatal.
    External,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::External => "external",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode enum
// ---------------------------------------------------------------------------

/// Enumeration of all Mission Orchestrator error codes, organized by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ── Validation (V) ────────────────────────────────────────────────
    /// The mission identifier is not a well-formed UUID.
    InvalidMissionId,
    /// The request payload could not be parsed or is structurally invalid.
    MalformedPayload,
    /// A required field is missing or empty.
    MissingRequiredField,
    /// The artifact `sha256` is not 64 lowercase hex characters.
    InvalidSha256,
    /// `run_mode` is not one of the recognized values.
    InvalidRunMode,

    // ── NotFound (N) ──────────────────────────────────────────────────
    /// The referenced mission does not exist.
    MissionNotFound,
    /// The referenced artifact does not exist.
    ArtifactNotFound,
    /// The referenced signal does not exist.
    SignalNotFound,
    /// The referenced project does not exist.
    ProjectNotFound,
    /// The referenced agent does not exist.
    AgentNotFound,
    /// The referenced stream session is not registered.
    SessionNotFound,

    // ── Conflict (C) ──────────────────────────────────────────────────
    /// A mission was asked to run with zero task groups.
    NoTaskGroups,
    /// An illegal status transition was attempted.
    IllegalStatusTransition,
    /// `run_mode` is a reserved value not yet supported by any executor.
    UnsupportedRunMode,
    /// The signal is not in `pending` status and cannot be transitioned.
    SignalNotPending,

    // ── Transient (T) ─────────────────────────────────────────────────
    /// The agent subprocess did not exit within its configured timeout.
    ProcessTimeout,
    /// The agent executable could not be found or spawned.
    ProcessSpawnFailed,
    /// A store operation failed due to a transient condition (lock, I/O).
    StoreTransientFailure,

    // ── Fatal (F) ─────────────────────────────────────────────────────
    /// The audit chain's recomputed hash does not match the stored hash.
    AuditTamperDetected,
    /// The store is in an unrecoverable, corrupted state.
    StoreCorrupted,

    // ── External (E) ──────────────────────────────────────────────────
    /// Posting a signal to an external system failed.
    SignalPostFailed,
    /// A webhook or CI callback could not be reached.
    WebhookUnreachable,
    /// Best-effort evidence emission failed and was swallowed.
    EvidenceWriteFailed,
}

impl ErrorCode {
    /// Machine-readable code string (e.g. `"MO-V001"`).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMissionId => "MO-V001",
            Self::MalformedPayload => "MO-V002",
            Self::MissingRequiredField => "MO-V003",
            Self::InvalidSha256 => "MO-V004",
            Self::InvalidRunMode => "MO-V005",

            Self::MissionNotFound => "MO-N001",
            Self::ArtifactNotFound => "MO-N002",
            Self::SignalNotFound => "MO-N003",
            Self::ProjectNotFound => "MO-N004",
            Self::AgentNotFound => "MO-N005",
            Self::SessionNotFound => "MO-N006",

            Self::NoTaskGroups => "MO-C001",
            Self::IllegalStatusTransition => "MO-C002",
            Self::UnsupportedRunMode => "MO-C003",
            Self::SignalNotPending => "MO-C004",

            Self::ProcessTimeout => "MO-T001",
            Self::ProcessSpawnFailed => "MO-T002",
            Self::StoreTransientFailure => "MO-T003",

            Self::AuditTamperDetected => "MO-F001",
            Self::StoreCorrupted => "MO-F002",

            Self::SignalPostFailed => "MO-E001",
            Self::WebhookUnreachable => "MO-E002",
            Self::EvidenceWriteFailed => "MO-E003",
        }
    }

    /// The propagation-policy [`ErrorKind`] this code belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMissionId
            | Self::MalformedPayload
            | Self::MissingRequiredField
            | Self::InvalidSha256
            | Self::InvalidRunMode => ErrorKind::Validation,

            Self::MissionNotFound
            | Self::ArtifactNotFound
            | Self::SignalNotFound
            | Self::ProjectNotFound
            | Self::AgentNotFound
            | Self::SessionNotFound => ErrorKind::NotFound,

            Self::NoTaskGroups
            | Self::IllegalStatusTransition
            | Self::UnsupportedRunMode
            | Self::SignalNotPending => ErrorKind::Conflict,

            Self::ProcessTimeout | Self::ProcessSpawnFailed | Self::StoreTransientFailure => {
                ErrorKind::Transient
            }

            Self::AuditTamperDetected | Self::StoreCorrupted => ErrorKind::Fatal,

            Self::SignalPostFailed | Self::WebhookUnreachable | Self::EvidenceWriteFailed => {
                ErrorKind::External
            }
        }
    }

    /// Short human-readable description of this error code.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidMissionId => "The mission identifier is not a well-formed UUID",
            Self::MalformedPayload => "The request payload could not be parsed",
            Self::MissingRequiredField => "A required field is missing or empty",
            Self::InvalidSha256 => "The artifact sha256 is not 64 lowercase hex characters",
            Self::InvalidRunMode => "run_mode is not one of the recognized values",

            Self::MissionNotFound => "The referenced mission does not exist",
            Self::ArtifactNotFound => "The referenced artifact does not exist",
            Self::SignalNotFound => "The referenced signal does not exist",
            Self::ProjectNotFound => "The referenced project does not exist",
            Self::AgentNotFound => "The referenced agent does not exist",
            Self::SessionNotFound => "The referenced stream session is not registered",

            Self::NoTaskGroups => "A mission was asked to run with zero task groups",
            Self::IllegalStatusTransition => "An illegal status transition was attempted",
            Self::UnsupportedRunMode => "run_mode is reserved and not yet supported at run time",
            Self::SignalNotPending => "The signal is not pending and cannot be transitioned",

            Self::ProcessTimeout => "The agent subprocess exceeded its configured timeout",
            Self::ProcessSpawnFailed => "The agent executable could not be spawned",
            Self::StoreTransientFailure => "A store operation failed transiently",

            Self::AuditTamperDetected => "The audit chain hash does not match recomputation",
            Self::StoreCorrupted => "The store is in an unrecoverable state",

            Self::SignalPostFailed => "Posting a signal to an external system failed",
            Self::WebhookUnreachable => "A webhook or CI callback could not be reached",
            Self::EvidenceWriteFailed => "Best-effort evidence emission failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::error::Error for ErrorCode {}

/// All error codes, in definition order.
const ALL_CODES: &[ErrorCode] = &[
    ErrorCode::InvalidMissionId,
    ErrorCode::MalformedPayload,
    ErrorCode::MissingRequiredField,
    ErrorCode::InvalidSha256,
    ErrorCode::InvalidRunMode,
    ErrorCode::MissionNotFound,
    ErrorCode::ArtifactNotFound,
    ErrorCode::SignalNotFound,
    ErrorCode::ProjectNotFound,
    ErrorCode::AgentNotFound,
    ErrorCode::SessionNotFound,
    ErrorCode::NoTaskGroups,
    ErrorCode::IllegalStatusTransition,
    ErrorCode::UnsupportedRunMode,
    ErrorCode::SignalNotPending,
    ErrorCode::ProcessTimeout,
    ErrorCode::ProcessSpawnFailed,
    ErrorCode::StoreTransientFailure,
    ErrorCode::AuditTamperDetected,
    ErrorCode::StoreCorrupted,
    ErrorCode::SignalPostFailed,
    ErrorCode::WebhookUnreachable,
    ErrorCode::EvidenceWriteFailed,
];

// ---------------------------------------------------------------------------
// ErrorInfo
// ---------------------------------------------------------------------------

/// Rich error value carrying an [`ErrorCode`], a human message, optional
/// structured context, and an optional source error.
pub struct ErrorInfo {
    /// The catalog error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Arbitrary key-value context (deterministic ordering).
    pub context: BTreeMap<String, String>,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ErrorInfo {
    /// Start building an [`ErrorInfo`] for the given code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: BTreeMap::new(),
            source: None,
        }
    }

    /// Add a key-value context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach an underlying source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;
        if !self.context.is_empty() {
            write!(f, " (")?;
            let mut first = true;
            for (k, v) in &self.context {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{k}={v}")?;
                first = false;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorInfo")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("source", &self.source.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl std::error::Error for ErrorInfo {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// ErrorCatalog
// ---------------------------------------------------------------------------

/// Static catalog providing lookup and enumeration of [`ErrorCode`]s.
pub struct ErrorCatalog;

impl ErrorCatalog {
    /// Look up an [`ErrorCode`] by its code string (e.g. `"MO-V001"`).
    #[must_use]
    pub fn lookup(code: &str) -> Option<ErrorCode> {
        ALL_CODES.iter().find(|c| c.code() == code).copied()
    }

    /// Return every defined [`ErrorCode`].
    #[must_use]
    pub fn all() -> Vec<ErrorCode> {
        ALL_CODES.to_vec()
    }

    /// Return all codes belonging to `kind`.
    #[must_use]
    pub fn by_kind(kind: ErrorKind) -> Vec<ErrorCode> {
        ALL_CODES.iter().filter(|c| c.kind() == kind).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_round_trips_through_lookup() {
        for code in ErrorCatalog::all() {
            assert_eq!(ErrorCatalog::lookup(code.code()), Some(code));
        }
    }

    #[test]
    fn lookup_rejects_unknown_code() {
        assert_eq!(ErrorCatalog::lookup("MO-V999"), None);
    }

    #[test]
    fn by_kind_filters_correctly() {
        let notfound = ErrorCatalog::by_kind(ErrorKind::NotFound);
        assert!(notfound.contains(&ErrorCode::MissionNotFound));
        assert!(!notfound.contains(&ErrorCode::NoTaskGroups));
    }

    #[test]
    fn fatal_kinds_are_exactly_audit_and_store_corruption() {
        let fatal = ErrorCatalog::by_kind(ErrorKind::Fatal);
        assert_eq!(fatal.len(), 2);
        assert!(fatal.contains(&ErrorCode::AuditTamperDetected));
        assert!(fatal.contains(&ErrorCode::StoreCorrupted));
    }

    #[test]
    fn error_info_formats_context_deterministically() {
        let err = ErrorInfo::new(ErrorCode::MissionNotFound, "no such mission")
            .with_context("mission_id", "abc")
            .with_context("project", "demo");
        let shown = err.to_string();
        assert!(shown.starts_with("[MO-N001] no such mission ("));
        assert!(shown.contains("mission_id=abc"));
        assert!(shown.contains("project=demo"));
    }
}
