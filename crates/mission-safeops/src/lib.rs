// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mission-safeops
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The SafeOps Gate (spec §4.8): a pure function deciding whether a
//! dangerous operation may proceed without human review, given the
//! project's configured [`AutomationLevel`]. Callers are responsible for
//! routing a `false` result into a pending `dangerous_command` signal via
//! `mission-signals`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much latitude the orchestrator has to act without human review.
///
/// Only [`AutomationLevel::Manual`] is wired to a behavior today. The other
/// two variants exist and are matched explicitly so that enabling them later
/// is a one-line change in [`should_auto_approve`], not a new enum variant —
/// per spec §4.8's "placeholder for future policy" language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutomationLevel {
    /// Every dangerous operation requires human approval.
    #[default]
    Manual,
    /// Reserved: auto-approve operations classified as safe by a future
    /// rule set, still gating the rest.
    AutoSafeops,
    /// Reserved: auto-approve everything. Not implemented; matches to
    /// `false` identically to `Manual` until a policy is designed.
    AutoAll,
}

/// Decide whether `command_tag` may proceed without a pending approval
/// signal, for a project running at `automation_level`.
///
/// `mission_id` is accepted for future mission-scoped overrides but is not
/// currently consulted — every level other than a hypothetical future
/// policy is automation-level-only.
///
/// # Examples
///
/// ```
/// use mission_safeops::{AutomationLevel, should_auto_approve};
///
/// assert!(!should_auto_approve("rm -rf", None, AutomationLevel::Manual));
/// ```
#[must_use]
pub fn should_auto_approve(
    command_tag: &str,
    mission_id: Option<Uuid>,
    automation_level: AutomationLevel,
) -> bool {
    let approved = match automation_level {
        AutomationLevel::Manual => false,
        AutomationLevel::AutoSafeops => false,
        AutomationLevel::AutoAll => false,
    };
    tracing::debug!(
        target: "mission.safeops",
        command_tag,
        mission_id = ?mission_id,
        automation_level = ?automation_level,
        approved,
        "safeops gate evaluated"
    );
    approved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_never_auto_approves() {
        assert!(!should_auto_approve("git push --force", None, AutomationLevel::Manual));
    }

    #[test]
    fn auto_safeops_is_a_placeholder_and_still_denies() {
        assert!(!should_auto_approve("rm -rf /tmp/x", None, AutomationLevel::AutoSafeops));
    }

    #[test]
    fn auto_all_is_a_placeholder_and_still_denies() {
        let mission_id = Uuid::new_v4();
        assert!(!should_auto_approve("deploy", Some(mission_id), AutomationLevel::AutoAll));
    }

    #[test]
    fn default_automation_level_is_manual() {
        assert_eq!(AutomationLevel::default(), AutomationLevel::Manual);
    }
}
