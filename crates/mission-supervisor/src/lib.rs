// SPDX-License-Identifier: MIT OR Apache-2.0
//! mission-supervisor
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The Process Supervisor (spec §4.2) and Stream Registry (spec §4.3):
//! spawns agent CLIs in batch (wait for completion) or stream (long-lived,
//! attachable) mode, captures their stdio to per-run trace logs, and
//! tracks live stream sessions by run id for the CLI's `attach` flow.

pub mod process;
pub mod registry;

pub use process::{BatchResult, SpawnContext, StreamSession, SupervisorError};
pub use registry::{SessionMeta, SessionNotFound, StreamRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn ctx(trace_dir: std::path::PathBuf) -> SpawnContext {
        SpawnContext {
            mission_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            trace_dir,
            index: None,
            role: Some("tester".to_string()),
        }
    }

    #[tokio::test]
    async fn spawn_batch_captures_stdout_and_writes_trace() {
        let dir = tempdir().unwrap();
        let ctx = ctx(dir.path().to_path_buf());
        let command = vec!["echo".to_string(), "hello".to_string()];
        let result = process::spawn_batch(&command, &ctx, Duration::from_secs(5)).await.unwrap();

        assert_eq!(result.return_code, Some(0));
        assert!(result.stdout.contains("hello"));
        assert!(!result.timed_out);

        let trace = std::fs::read_to_string(&result.trace_path).unwrap();
        assert!(trace.contains("# Mission ID:"));
        assert!(trace.contains("# Role: tester"));
        assert!(trace.contains("=== RETURN CODE === 0"));
        assert!(trace.contains("=== STDOUT"));
    }

    #[tokio::test]
    async fn spawn_batch_on_missing_executable_errors() {
        let dir = tempdir().unwrap();
        let ctx = ctx(dir.path().to_path_buf());
        let command = vec!["definitely-not-a-real-binary-xyz".to_string()];
        let trace_path = ctx.log_path();
        let err = process::spawn_batch(&command, &ctx, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
        let trace = std::fs::read_to_string(&trace_path).unwrap();
        assert!(trace.contains("=== ERROR ==="), "trace missing error section: {trace}");
        assert!(trace.contains("# Command: definitely-not-a-real-binary-xyz"), "trace missing header: {trace}");
    }

    #[tokio::test]
    async fn spawn_batch_times_out_long_running_commands() {
        let dir = tempdir().unwrap();
        let ctx = ctx(dir.path().to_path_buf());
        let command = vec!["sleep".to_string(), "5".to_string()];
        let result =
            process::spawn_batch(&command, &ctx, Duration::from_millis(50)).await.unwrap();
        assert!(result.timed_out);
        let trace = std::fs::read_to_string(&result.trace_path).unwrap();
        assert!(trace.contains("=== ERROR === timed out"));
    }

    #[tokio::test]
    async fn stream_session_round_trips_stdin_and_registry() {
        let dir = tempdir().unwrap();
        let ctx = ctx(dir.path().to_path_buf());
        let command = vec!["cat".to_string()];
        let mut session = StreamSession::spawn(&command, &ctx).await.unwrap();
        session.send_line("ping").await.unwrap();
        session.terminate(Duration::from_millis(200)).await;

        let trace = std::fs::read_to_string(session.trace_path()).unwrap();
        assert!(trace.contains("[STDIN] ping"));
        assert!(trace.contains("[RETURN]"));
    }

    #[tokio::test]
    async fn try_wait_reports_none_while_running_then_some_after_exit() {
        let dir = tempdir().unwrap();
        let ctx = ctx(dir.path().to_path_buf());
        let mut session = StreamSession::spawn(&["sleep".to_string(), "0".to_string()], &ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let code = session.try_wait().await.unwrap();
        assert_eq!(code, Some(0));
    }

    #[tokio::test]
    async fn registry_round_trips_meta_by_run_id() {
        let dir = tempdir().unwrap();
        let spawn_ctx = ctx(dir.path().to_path_buf());
        let run_id = spawn_ctx.run_id;
        let mission_id = spawn_ctx.mission_id;
        let session = StreamSession::spawn(&["cat".to_string()], &spawn_ctx).await.unwrap();

        let registry = StreamRegistry::new();
        registry
            .register(run_id, session, SessionMeta { role: Some("tester".into()), mission_id })
            .await;

        let meta = registry.meta(run_id).await.unwrap();
        assert_eq!(meta.mission_id, mission_id);

        let (mut session, _) = registry.deregister(run_id).await.unwrap();
        session.terminate(Duration::from_millis(200)).await;
        assert!(registry.meta(run_id).await.is_err());
    }
}
