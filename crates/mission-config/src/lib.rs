// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the Mission Orchestrator.
//!
//! This crate provides [`MissionConfig`] — the top-level CLI/daemon runtime
//! settings — together with helpers for loading from TOML files, applying
//! environment overrides, merging overlays, and producing advisory
//! [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use mission_safeops::AutomationLevel;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A role was configured but never referenced by `--roles`.
    UnusedRole {
        /// Role name.
        name: String,
    },
    /// The engine command template has no `{ROLE}` placeholder, so every
    /// role would spawn the identical command.
    MissingRolePlaceholder,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnusedRole { name } => write!(f, "role '{name}' is configured but unused"),
            Self::MissingRolePlaceholder => {
                write!(f, "engine.command_template has no {{ROLE}} placeholder")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig / RoleConfig
// ---------------------------------------------------------------------------

/// How to invoke an agent CLI, per spec §4.9 step 1 ("resolve engine config:
/// command template with `{ROLE}` substitution; optional workdir").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    /// Command template, e.g. `"claude --role {ROLE}"`. `{ROLE}` is replaced
    /// with the role name before the command is split into argv.
    pub command_template: String,
    /// Working directory the agent CLI is spawned in. Defaults to the
    /// orchestrator's own working directory when absent.
    #[serde(default)]
    pub workdir: Option<String>,
    /// Wall-clock timeout in seconds for a batch spawn. Spec §5 default 300.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

impl EngineConfig {
    /// Substitute `{ROLE}` in the command template and split into argv.
    ///
    /// Splits on ASCII whitespace; callers needing quoting/escaping should
    /// prefer a `role_config` override with explicit `args`.
    #[must_use]
    pub fn command_for_role(&self, role: &str) -> Vec<String> {
        self.command_template
            .replace("{ROLE}", role)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Per-role override of the default [`EngineConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoleConfig {
    /// Overrides `engine.command_template` for this role only, if set.
    #[serde(default)]
    pub command_template: Option<String>,
    /// Extra arguments appended after template substitution.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Preferred model identifier passed through to the agent CLI.
    #[serde(default)]
    pub model: Option<String>,
}

// ---------------------------------------------------------------------------
// SignalsConfig
// ---------------------------------------------------------------------------

/// Where to route signal creation when `run` posts a dangerous-command
/// signal (spec §6 CLI surface: `--signals-project-id --signals-base-url`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SignalsConfig {
    /// Project identifier (UUID string) signals are recorded against.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Base URL of a remote signals API, if signals are posted over HTTP
    /// rather than written directly to the local store.
    #[serde(default)]
    pub base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// MissionConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for the `mission` CLI and `mission-daemon`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MissionConfig {
    /// Default engine invocation.
    pub engine: EngineConfig,
    /// Per-role overrides, keyed by role name.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
    /// How much latitude the orchestrator has to act without human review.
    #[serde(default)]
    pub automation_level: AutomationLevel,
    /// Directory batch/stream trace logs are written under.
    #[serde(default = "default_trace_dir")]
    pub trace_dir: String,
    /// Signal routing configuration.
    #[serde(default)]
    pub signals: SignalsConfig,
}

fn default_trace_dir() -> String {
    "trace".to_string()
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                command_template: "echo {ROLE}".to_string(),
                workdir: None,
                timeout_secs: default_timeout_secs(),
            },
            roles: BTreeMap::new(),
            automation_level: AutomationLevel::default(),
            trace_dir: default_trace_dir(),
            signals: SignalsConfig::default(),
        }
    }
}

/// Load and parse a TOML configuration file. `path = None` returns
/// [`MissionConfig::default`] without touching disk, matching the CLI's
/// "config is optional" posture.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] if `path` is `Some` and does not
/// exist, or [`ConfigError::ParseError`] if the file is not valid TOML.
pub fn load_config(path: Option<&Path>) -> Result<MissionConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(MissionConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let mut config = parse_toml(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML document into a [`MissionConfig`], without touching disk.
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] on malformed TOML.
pub fn parse_toml(content: &str) -> Result<MissionConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

/// Apply environment variable overrides, matching spec §6's named env vars
/// plus engine/trace-dir overrides.
pub fn apply_env_overrides(config: &mut MissionConfig) {
    if let Ok(v) = std::env::var("MISSION_ENGINE_COMMAND") {
        config.engine.command_template = v;
    }
    if let Ok(v) = std::env::var("MISSION_TRACE_DIR") {
        config.trace_dir = v;
    }
    if let Ok(v) = std::env::var("MISSIONS_HUB_SIGNALS_BASE") {
        config.signals.base_url = Some(v);
    }
}

/// Validate a parsed configuration, returning advisory warnings. Unlike the
/// CLI's `ConfigError`, these never block a run — they are surfaced to the
/// operator via `tracing::warn!`.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if the command template is
/// empty (the one condition that makes every spawn fail identically).
pub fn validate_config(config: &MissionConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    if config.engine.command_template.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            reasons: vec!["engine.command_template must not be empty".to_string()],
        });
    }

    let mut warnings = Vec::new();
    if !config.engine.command_template.contains("{ROLE}") {
        warnings.push(ConfigWarning::MissingRolePlaceholder);
    }
    Ok(warnings)
}

/// Merge an `overlay` config onto a `base` config: any field the overlay
/// sets to a non-default value wins, role maps are unioned (overlay wins on
/// key collision).
#[must_use]
pub fn merge_configs(base: MissionConfig, overlay: MissionConfig) -> MissionConfig {
    let default = MissionConfig::default();

    let engine = if overlay.engine.command_template != default.engine.command_template {
        overlay.engine
    } else {
        base.engine
    };

    let mut roles = base.roles;
    roles.extend(overlay.roles);

    let trace_dir = if overlay.trace_dir != default.trace_dir { overlay.trace_dir } else { base.trace_dir };

    let signals = SignalsConfig {
        project_id: overlay.signals.project_id.or(base.signals.project_id),
        base_url: overlay.signals.base_url.or(base.signals.base_url),
    };

    MissionConfig {
        engine,
        roles,
        automation_level: overlay.automation_level,
        trace_dir,
        signals,
    }
}
