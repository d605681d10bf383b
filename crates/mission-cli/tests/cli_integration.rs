// SPDX-License-Identifier: MIT OR Apache-2.0
//! CLI integration tests for the `mission` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn mission() -> Command {
    Command::cargo_bin("mission").expect("binary `mission` should be built")
}

#[test]
fn help_exits_zero_and_lists_subcommands() {
    mission()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mission Orchestrator CLI"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("call"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("attach"));
}

#[test]
fn version_flag_succeeds() {
    mission().arg("--version").assert().success();
}

#[test]
fn run_with_no_roles_exits_misuse() {
    let dir = tempfile::tempdir().unwrap();
    mission()
        .current_dir(dir.path())
        .args(["run", "--trace-dir", "trace"])
        .assert()
        .code(2);
}

#[test]
fn run_chat_mode_with_parallel_exits_misuse() {
    let dir = tempfile::tempdir().unwrap();
    mission()
        .current_dir(dir.path())
        .args(["run", "--roles", "coder", "--chat-mode", "--parallel"])
        .assert()
        .code(2);
}

#[test]
fn run_chat_mode_with_multiple_roles_exits_misuse() {
    let dir = tempfile::tempdir().unwrap();
    mission()
        .current_dir(dir.path())
        .args(["run", "--roles", "coder,tester", "--chat-mode"])
        .assert()
        .code(2);
}

#[test]
fn run_sequential_with_echo_engine_succeeds_and_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    mission()
        .current_dir(dir.path())
        .args(["run", "--roles", "planner,coder", "--engine", "echo {ROLE}", "--trace-dir", "trace"])
        .assert()
        .success();

    let run_dirs: Vec<_> = std::fs::read_dir(dir.path().join("trace")).unwrap().filter_map(Result::ok).collect();
    assert_eq!(run_dirs.len(), 1);
    let run_dir = run_dirs[0].path();
    assert!(run_dir.join("plan.json").exists());
    assert!(run_dir.join("test_report.json").exists());
    assert!(run_dir.join("audit.json").exists());
    assert!(run_dir.join("manifest.jsonl").exists());
}

#[test]
fn run_with_failing_engine_exits_failure_and_reports_failed_status() {
    let dir = tempfile::tempdir().unwrap();
    mission()
        .current_dir(dir.path())
        .args(["run", "--roles", "coder", "--engine", "false", "--trace-dir", "trace"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn attach_with_no_live_session_exits_failure() {
    let dir = tempfile::tempdir().unwrap();
    mission()
        .current_dir(dir.path())
        .args(["attach", "--run-id", "00000000-0000-0000-0000-000000000000", "--line", "hi"])
        .assert()
        .code(1);
}

#[test]
fn call_with_unreachable_base_url_exits_failure() {
    let dir = tempfile::tempdir().unwrap();
    mission()
        .current_dir(dir.path())
        .args([
            "call",
            "--endpoint",
            "/health",
            "--base-url",
            "http://127.0.0.1:1",
            "--timeout",
            "2",
            "--trace-dir",
            "trace",
        ])
        .assert()
        .code(1);
}
