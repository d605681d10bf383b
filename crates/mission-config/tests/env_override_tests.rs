// SPDX-License-Identifier: MIT OR Apache-2.0
//! Env-var override behavior. Kept out of `src/lib.rs`'s inline
//! `#[cfg(test)] mod tests`: that module compiles under the crate's
//! `#![deny(unsafe_code)]`, and this test needs `unsafe { std::env::set_var }`
//! to exercise the override path. A separate `tests/` integration file is
//! its own compilation unit and isn't subject to the library's deny.

use mission_config::{apply_env_overrides, MissionConfig};

#[test]
fn env_override_wins_over_file() {
    let mut config = MissionConfig::default();
    // SAFETY: test-only; each integration test file is its own process, so
    // no other test in this binary reads this var concurrently.
    unsafe {
        std::env::set_var("MISSION_ENGINE_COMMAND", "gemini --role {ROLE}");
    }
    apply_env_overrides(&mut config);
    unsafe {
        std::env::remove_var("MISSION_ENGINE_COMMAND");
    }
    assert_eq!(config.engine.command_template, "gemini --role {ROLE}");
}
