// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request payload validation shared by the mission/artifact/signal routes.
//!
//! Kept separate from [`crate::routes`] so the same checks are unit
//! testable without standing up an HTTP server.

use crate::api::{CreateArtifactRequest, CreateMissionRequest, CreateSignalRequest};

/// Reasons a request payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestValidationError {
    /// A required string field was empty or whitespace-only.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A field that must be exactly 64 lowercase hex characters was not.
    #[error("{field} must be a 64 character lowercase hex sha256 digest")]
    InvalidSha256 {
        /// Name of the offending field.
        field: &'static str,
    },
}

fn require_non_blank(field: &'static str, value: &str) -> Result<(), RequestValidationError> {
    if value.trim().is_empty() {
        return Err(RequestValidationError::EmptyField { field });
    }
    Ok(())
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Validate a mission creation request.
///
/// # Errors
///
/// Returns [`RequestValidationError::EmptyField`] if `project_slug` or
/// `title` is blank.
pub fn validate_create_mission(req: &CreateMissionRequest) -> Result<(), RequestValidationError> {
    require_non_blank("project_slug", &req.project_slug)?;
    require_non_blank("title", &req.title)?;
    Ok(())
}

/// Validate an artifact creation request.
///
/// # Errors
///
/// Returns [`RequestValidationError::EmptyField`] if `type`, `path`, or
/// `version` is blank, or [`RequestValidationError::InvalidSha256`] if
/// `sha256` is not 64 lowercase hex characters.
pub fn validate_create_artifact(req: &CreateArtifactRequest) -> Result<(), RequestValidationError> {
    require_non_blank("type", &req.kind)?;
    require_non_blank("path", &req.path)?;
    require_non_blank("version", &req.version)?;
    if !is_sha256_hex(&req.sha256) {
        return Err(RequestValidationError::InvalidSha256 { field: "sha256" });
    }
    Ok(())
}

/// Validate a signal creation request.
///
/// # Errors
///
/// Returns [`RequestValidationError::EmptyField`] if `type` or `message` is
/// blank.
pub fn validate_create_signal(req: &CreateSignalRequest) -> Result<(), RequestValidationError> {
    require_non_blank("type", &req.kind)?;
    require_non_blank("message", &req.message)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_core::SignalSeverity;
    use uuid::Uuid;

    #[test]
    fn blank_title_is_rejected() {
        let req = CreateMissionRequest {
            project_slug: "demo".into(),
            title: "   ".into(),
            summary: None,
            status: None,
        };
        assert!(validate_create_mission(&req).is_err());
    }

    #[test]
    fn valid_mission_request_passes() {
        let req = CreateMissionRequest {
            project_slug: "demo".into(),
            title: "Ship feature".into(),
            summary: None,
            status: None,
        };
        assert!(validate_create_mission(&req).is_ok());
    }

    #[test]
    fn non_hex_sha256_is_rejected() {
        let req = CreateArtifactRequest {
            kind: "diff".into(),
            path: "x".into(),
            version: "1".into(),
            sha256: "not-a-digest".into(),
            scope: None,
            tags: vec![],
            content_meta: serde_json::Value::Null,
            knowledge_summary: None,
            knowledge_tags: vec![],
        };
        assert_eq!(
            validate_create_artifact(&req),
            Err(RequestValidationError::InvalidSha256 { field: "sha256" })
        );
    }

    #[test]
    fn uppercase_hex_sha256_is_rejected() {
        let req = CreateArtifactRequest {
            kind: "diff".into(),
            path: "x".into(),
            version: "1".into(),
            sha256: "A".repeat(64),
            scope: None,
            tags: vec![],
            content_meta: serde_json::Value::Null,
            knowledge_summary: None,
            knowledge_tags: vec![],
        };
        assert!(validate_create_artifact(&req).is_err());
    }

    #[test]
    fn valid_sha256_passes() {
        let req = CreateArtifactRequest {
            kind: "diff".into(),
            path: "x".into(),
            version: "1".into(),
            sha256: "a".repeat(64),
            scope: None,
            tags: vec![],
            content_meta: serde_json::Value::Null,
            knowledge_summary: None,
            knowledge_tags: vec![],
        };
        assert!(validate_create_artifact(&req).is_ok());
    }

    #[test]
    fn blank_signal_message_is_rejected() {
        let req = CreateSignalRequest {
            project_id: Uuid::new_v4(),
            mission_id: None,
            kind: "dangerous_command".into(),
            severity: SignalSeverity::Warning,
            message: "".into(),
        };
        assert!(validate_create_signal(&req).is_err());
    }
}
