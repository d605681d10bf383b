// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deep validation tests for `mission-config`.

use mission_config::{
    ConfigError, ConfigWarning, EngineConfig, MissionConfig, merge_configs, parse_toml,
    validate_config,
};

fn fully_valid_config() -> MissionConfig {
    MissionConfig {
        engine: EngineConfig {
            command_template: "claude --role {ROLE} --once".into(),
            workdir: Some("/tmp/ws".into()),
            timeout_secs: 120,
        },
        ..MissionConfig::default()
    }
}

fn validation_reasons(err: ConfigError) -> Vec<String> {
    match err {
        ConfigError::ValidationError { reasons } => reasons,
        other => panic!("expected ValidationError, got {other:?}"),
    }
}

#[test]
fn fully_specified_config_has_no_warnings() {
    let warnings = validate_config(&fully_valid_config()).unwrap();
    assert!(warnings.is_empty(), "expected zero warnings: {warnings:?}");
}

#[test]
fn blank_command_template_is_rejected() {
    let mut cfg = fully_valid_config();
    cfg.engine.command_template = "   ".into();
    let reasons = validation_reasons(validate_config(&cfg).unwrap_err());
    assert!(reasons.iter().any(|r| r.contains("command_template")));
}

#[test]
fn tab_only_command_template_is_rejected() {
    let mut cfg = fully_valid_config();
    cfg.engine.command_template = "\t\t".into();
    assert!(validate_config(&cfg).is_err());
}

#[test]
fn template_without_role_placeholder_warns_but_does_not_error() {
    let mut cfg = fully_valid_config();
    cfg.engine.command_template = "claude --once".into();
    let warnings = validate_config(&cfg).unwrap();
    assert_eq!(warnings, vec![ConfigWarning::MissingRolePlaceholder]);
}

#[test]
fn placeholder_present_anywhere_in_template_suppresses_warning() {
    let mut cfg = fully_valid_config();
    cfg.engine.command_template = "env ROLE={ROLE} claude".into();
    let warnings = validate_config(&cfg).unwrap();
    assert!(warnings.is_empty());
}

#[test]
fn parse_toml_rejects_garbage() {
    assert!(parse_toml("{{{ not toml").is_err());
}

#[test]
fn parse_toml_fills_defaults_for_omitted_sections() {
    let config = parse_toml("[engine]\ncommand_template = \"node {ROLE}\"\n").unwrap();
    assert!(config.roles.is_empty());
    assert_eq!(config.trace_dir, "trace");
    assert_eq!(config.engine.timeout_secs, 300);
}

#[test]
fn parse_toml_rejects_missing_engine_section() {
    assert!(parse_toml("trace_dir = \"x\"\n").is_err());
}

#[test]
fn merge_prefers_overlay_trace_dir_when_set() {
    let base = MissionConfig::default();
    let mut overlay = MissionConfig::default();
    overlay.trace_dir = "custom-trace".into();
    let merged = merge_configs(base, overlay);
    assert_eq!(merged.trace_dir, "custom-trace");
}

#[test]
fn merge_keeps_base_trace_dir_when_overlay_is_default() {
    let mut base = MissionConfig::default();
    base.trace_dir = "base-trace".into();
    let overlay = MissionConfig::default();
    let merged = merge_configs(base, overlay);
    assert_eq!(merged.trace_dir, "base-trace");
}

#[test]
fn merge_overlay_automation_level_always_wins() {
    use mission_safeops::AutomationLevel;
    let base = MissionConfig::default();
    let mut overlay = MissionConfig::default();
    overlay.automation_level = AutomationLevel::AutoSafeops;
    let merged = merge_configs(base, overlay);
    assert_eq!(merged.automation_level, AutomationLevel::AutoSafeops);
}

#[test]
fn merge_unions_roles_overlay_wins_on_collision() {
    use mission_config::RoleConfig;
    let mut base = MissionConfig::default();
    base.roles.insert("writer".into(), RoleConfig { command_template: None, extra_args: vec![], model: Some("base-model".into()) });
    let mut overlay = MissionConfig::default();
    overlay.roles.insert("writer".into(), RoleConfig { command_template: None, extra_args: vec![], model: Some("overlay-model".into()) });
    overlay.roles.insert("reviewer".into(), RoleConfig { command_template: None, extra_args: vec![], model: None });
    let merged = merge_configs(base, overlay);
    assert_eq!(merged.roles.len(), 2);
    assert_eq!(merged.roles["writer"].model.as_deref(), Some("overlay-model"));
}

#[test]
fn command_for_role_handles_role_without_placeholder() {
    let engine = EngineConfig { command_template: "claude --once".into(), workdir: None, timeout_secs: 10 };
    assert_eq!(engine.command_for_role("writer"), vec!["claude", "--once"]);
}

#[test]
fn very_long_command_template_is_accepted() {
    let mut cfg = fully_valid_config();
    cfg.engine.command_template = format!("claude {{ROLE}} {}", "x".repeat(10_000));
    validate_config(&cfg).unwrap();
}

#[test]
fn config_round_trips_through_json_schema() {
    let schema = schemars::schema_for!(MissionConfig);
    let json = serde_json::to_string_pretty(&schema).unwrap();
    assert!(json.contains("MissionConfig") || json.contains("engine"));
}

#[test]
fn validation_is_idempotent() {
    let cfg = fully_valid_config();
    let w1 = validate_config(&cfg).unwrap();
    let w2 = validate_config(&cfg).unwrap();
    assert_eq!(w1, w2);
}
