// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting for the `mission` CLI's `run`/`call` summaries.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Supported output formats for CLI display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Compact JSON (single line).
    Json,
    /// Pretty-printed JSON.
    JsonPretty,
    /// Human-readable multi-line text.
    Text,
    /// Single-line summary.
    Compact,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::Text => "text",
            Self::Compact => "compact",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "json-pretty" | "json_pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "text" => Ok(Self::Text),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Outcome of one role's batch spawn within a `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RoleOutcome {
    /// Role name.
    pub role: String,
    /// Process return code, absent on timeout.
    pub return_code: Option<i32>,
    /// Whether the role's spawn was killed for exceeding its timeout.
    pub timed_out: bool,
    /// Trace log path for this role's spawn.
    pub trace_path: String,
}

impl RoleOutcome {
    /// Whether this role's spawn is considered successful.
    #[must_use]
    pub fn ok(&self) -> bool {
        !self.timed_out && self.return_code == Some(0)
    }
}

/// Summary of a completed `run` invocation, printed to stdout and mirrored
/// into `test_report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// This run's identifier.
    pub run_id: Uuid,
    /// Mission this run is scoped to.
    pub mission_id: Uuid,
    /// `"ok"` if every role succeeded, `"failed"` otherwise.
    pub status: String,
    /// Per-role outcomes, in spawn order.
    pub roles: Vec<RoleOutcome>,
}

impl RunSummary {
    /// Whether every role in this summary succeeded.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.roles.iter().all(RoleOutcome::ok)
    }

    /// Render this summary in `format`.
    #[must_use]
    pub fn render(&self, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Json => serde_json::to_string(self).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Text => {
                let mut lines = vec![
                    format!("Run:     {}", self.run_id),
                    format!("Mission: {}", self.mission_id),
                    format!("Status:  {}", self.status),
                ];
                for role in &self.roles {
                    lines.push(format!(
                        "  {:<16} rc={:<5} timed_out={} trace={}",
                        role.role,
                        role.return_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                        role.timed_out,
                        role.trace_path,
                    ));
                }
                lines.join("\n")
            }
            OutputFormat::Compact => {
                let ok = self.roles.iter().filter(|r| r.ok()).count();
                format!("[{}] {}/{} roles ok (run={})", self.status, ok, self.roles.len(), self.run_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_display_roundtrips() {
        for fmt in &[OutputFormat::Json, OutputFormat::JsonPretty, OutputFormat::Text, OutputFormat::Compact] {
            let s = fmt.to_string();
            let parsed: OutputFormat = s.parse().unwrap();
            assert_eq!(&parsed, fmt);
        }
    }

    #[test]
    fn output_format_from_str_rejects_unknown() {
        assert!("nope".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn run_summary_all_ok_requires_every_role_clean() {
        let summary = RunSummary {
            run_id: Uuid::nil(),
            mission_id: Uuid::nil(),
            status: "ok".into(),
            roles: vec![
                RoleOutcome { role: "planner".into(), return_code: Some(0), timed_out: false, trace_path: "a.log".into() },
                RoleOutcome { role: "coder".into(), return_code: Some(1), timed_out: false, trace_path: "b.log".into() },
            ],
        };
        assert!(!summary.all_ok());
    }

    #[test]
    fn compact_render_counts_ok_roles() {
        let summary = RunSummary {
            run_id: Uuid::nil(),
            mission_id: Uuid::nil(),
            status: "ok".into(),
            roles: vec![RoleOutcome {
                role: "tester".into(),
                return_code: Some(0),
                timed_out: false,
                trace_path: "t.log".into(),
            }],
        };
        assert_eq!(summary.render(&OutputFormat::Compact), "[ok] 1/1 roles ok (run=00000000-0000-0000-0000-000000000000)");
    }
}
