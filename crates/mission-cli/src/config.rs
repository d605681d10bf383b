// SPDX-License-Identifier: MIT OR Apache-2.0
//! `--role-config` loading for the `run` subcommand.
//!
//! The file is a flat TOML table of role name to [`mission_config::RoleConfig`]
//! overrides, merged on top of the `--engine` command template:
//!
//! ```toml
//! [coder]
//! command_template = "claude --role {ROLE} --mode patch"
//! model = "sonnet"
//!
//! [tester]
//! extra_args = ["--strict"]
//! ```

use mission_config::RoleConfig;
use std::collections::BTreeMap;
use std::path::Path;

/// Load per-role overrides from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML shaped
/// as a table of [`RoleConfig`] values.
pub fn load_role_config(path: &Path) -> anyhow::Result<BTreeMap<String, RoleConfig>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read role config '{}': {e}", path.display()))?;
    toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse role config '{}': {e}", path.display()))
}

/// Resolve the argv for `role`, applying a `role_config` override (if one
/// exists for `role`) on top of the default command template.
#[must_use]
pub fn resolve_command(
    role: &str,
    engine: &mission_config::EngineConfig,
    role_config: &BTreeMap<String, RoleConfig>,
) -> Vec<String> {
    let Some(over) = role_config.get(role) else {
        return engine.command_for_role(role);
    };
    let mut argv = match &over.command_template {
        Some(template) => template.replace("{ROLE}", role).split_whitespace().map(str::to_string).collect(),
        None => engine.command_for_role(role),
    };
    argv.extend(over.extra_args.iter().cloned());
    argv
}
