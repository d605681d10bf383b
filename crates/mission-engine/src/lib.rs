// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! mission-engine
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The Workflow Engine (spec §4.6): drives a mission's task groups to
//! completion in order, records a [`mission_core::WorkflowRun`] trace, and
//! applies the configured [`HealStrategy`] when a group fails.

/// Task dispatch seam.
pub mod dispatch;
/// Engine error type.
pub mod error;
/// Group execution and the self-heal strategy.
pub mod heal;
/// The workflow run trace writer.
pub mod trace;

pub use dispatch::{SimulatedDispatcher, TaskDispatcher};
pub use error::EngineError;
pub use heal::{GroupOutcome, HealStrategy};
pub use trace::TraceWriter;

use chrono::Utc;
use mission_core::{
    self_heal_artifact_path, self_heal_artifact_sha256, truncate_summary, Artifact, Knowledge,
    RunMode, RunStatus, Scope, Task, TaskGroup, WorkflowRun, WorkflowRunStatus,
};
use mission_evidence::{EvidenceEmitter, EvidenceRecordBuilder, FileRef};
use mission_store::{ArtifactRepo, KnowledgeRepo, MissionRepo, StoreError, TaskGroupRepo, TaskRepo, WorkflowRunRepo};
use sqlx::SqlitePool;
use std::path::PathBuf;
use uuid::Uuid;

/// Configuration for a [`WorkflowEngine`].
#[derive(Debug, Clone)]
pub struct WorkflowEngineConfig {
    /// Directory workflow run trace files are written under.
    pub trace_dir: PathBuf,
    /// Group-failure recovery policy.
    pub heal_strategy: HealStrategy,
    /// Whether to emit a `self_heal_artifact` summary even on a run that
    /// never failed (spec §4.6.1 step 6 / OQ1). Default `true`.
    pub emit_clean_run_summary: bool,
    /// Path for the CI evidence log. `None` uses
    /// [`mission_evidence::DEFAULT_EVIDENCE_PATH`].
    pub evidence_path: Option<PathBuf>,
}

impl WorkflowEngineConfig {
    /// Sequential, plain-strategy config writing traces under `trace_dir`.
    #[must_use]
    pub fn new(trace_dir: impl Into<PathBuf>) -> Self {
        Self {
            trace_dir: trace_dir.into(),
            heal_strategy: HealStrategy::default(),
            emit_clean_run_summary: true,
            evidence_path: None,
        }
    }
}

/// Outcome of a completed [`WorkflowEngine::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Identifier of the [`mission_core::WorkflowRun`] record this run
    /// produced.
    pub run_id: Uuid,
    /// Final mission status.
    pub status: RunStatus,
}

/// Drives a mission's task groups to completion (spec §4.6.1/§4.6.2).
pub struct WorkflowEngine<'a> {
    pool: &'a SqlitePool,
    config: WorkflowEngineConfig,
    dispatcher: Box<dyn TaskDispatcher>,
    evidence: EvidenceEmitter,
}

impl<'a> WorkflowEngine<'a> {
    /// Build an engine using [`SimulatedDispatcher`] for task execution.
    #[must_use]
    pub fn new(pool: &'a SqlitePool, config: WorkflowEngineConfig) -> Self {
        Self::with_dispatcher(pool, config, Box::new(SimulatedDispatcher))
    }

    /// Build an engine with a caller-supplied [`TaskDispatcher`], e.g. one
    /// backed by the Process Supervisor.
    #[must_use]
    pub fn with_dispatcher(
        pool: &'a SqlitePool,
        config: WorkflowEngineConfig,
        dispatcher: Box<dyn TaskDispatcher>,
    ) -> Self {
        let evidence = match &config.evidence_path {
            Some(path) => EvidenceEmitter::new(path.clone()),
            None => EvidenceEmitter::default(),
        };
        Self { pool, config, dispatcher, evidence }
    }

    /// Run `mission_id` to completion, per spec §4.6.1 steps 1-8.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissionNotFound`] if the mission does not
    /// exist, [`EngineError::NoTaskGroups`] if it has no task groups,
    /// [`EngineError::UnsupportedRunMode`] if `run_mode != sequential`, or
    /// [`EngineError::Store`]/[`EngineError::Trace`] on persistence
    /// failure.
    pub async fn run(&self, mission_id: Uuid) -> Result<RunOutcome, EngineError> {
        let mission_repo = MissionRepo::new(self.pool);
        let group_repo = TaskGroupRepo::new(self.pool);
        let run_repo = WorkflowRunRepo::new(self.pool);

        let mission = mission_repo.get(mission_id).await.map_err(|err| match err {
            StoreError::NotFound { .. } => EngineError::MissionNotFound(mission_id),
            other => EngineError::Store(other),
        })?;

        if mission.run_mode != RunMode::Sequential {
            return Err(EngineError::UnsupportedRunMode(mission.run_mode));
        }

        let groups = group_repo.list_for_mission(mission_id).await?;
        if groups.is_empty() {
            return Err(EngineError::NoTaskGroups(mission_id));
        }

        mission_repo.set_status(mission_id, RunStatus::Running).await?;

        let run_id = Uuid::new_v4();
        let trace = TraceWriter::new(&self.config.trace_dir, run_id);
        let run = WorkflowRun {
            run_id,
            mission_id,
            mode: mission.run_mode,
            status: WorkflowRunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            trace_uri: trace.uri(),
        };
        run_repo.create(&run).await?;

        tracing::info!(
            target: "mission.engine",
            mission_id = %mission_id,
            run_id = %run_id,
            mode = ?mission.run_mode,
            "workflow run started"
        );
        trace
            .emit(
                "workflow_engine_run_started",
                serde_json::json!({"mission_id": mission_id, "mode": mission.run_mode, "run_id": run_id}),
            )
            .await?;

        let outcome = self.run_groups(mission_id, run_id, &groups, &trace).await;

        let final_status = match &outcome {
            Ok(()) => {
                if self.config.emit_clean_run_summary {
                    self.emit_clean_run_summary(run_id, &groups).await?;
                }
                RunStatus::Completed
            }
            Err(err) => {
                tracing::warn!(
                    target: "mission.engine",
                    mission_id = %mission_id,
                    run_id = %run_id,
                    error = %err,
                    "workflow run failed"
                );
                trace
                    .emit("workflow_engine_run_failed", serde_json::json!({"error": err.to_string()}))
                    .await?;
                RunStatus::Failed
            }
        };

        mission_repo.set_status(mission_id, final_status).await?;
        let run_status = if final_status == RunStatus::Completed {
            WorkflowRunStatus::Completed
        } else {
            WorkflowRunStatus::Failed
        };
        run_repo.finish(run_id, run_status, Utc::now()).await?;
        trace
            .emit("workflow_engine_run_completed", serde_json::json!({"status": final_status}))
            .await?;

        tracing::info!(
            target: "mission.engine",
            mission_id = %mission_id,
            run_id = %run_id,
            status = ?final_status,
            "workflow run completed"
        );
        Ok(RunOutcome { run_id, status: final_status })
    }

    /// Drive every group in order (spec §4.6.1 step 5); returns `Err` as
    /// soon as a group's tasks (and, under self-heal, its one recovery
    /// attempt) fail.
    async fn run_groups(
        &self,
        mission_id: Uuid,
        run_id: Uuid,
        groups: &[TaskGroup],
        trace: &TraceWriter,
    ) -> Result<(), EngineError> {
        let group_repo = TaskGroupRepo::new(self.pool);
        let task_repo = TaskRepo::new(self.pool);
        let mission_repo = MissionRepo::new(self.pool);

        for group in groups {
            group_repo.set_status(group.id, RunStatus::Running).await?;
            let tasks = task_repo.list_for_group(group.id).await?;

            let outcome = match self.config.heal_strategy {
                HealStrategy::Plain => {
                    heal::execute_group_plain(tasks, &task_repo, self.dispatcher.as_ref(), trace, run_id)
                        .await?
                }
                HealStrategy::SelfHeal => {
                    self.execute_group_self_heal(group, tasks, &task_repo, trace, run_id).await?
                }
            };

            match outcome {
                GroupOutcome::Completed => {
                    group_repo.set_status(group.id, RunStatus::Completed).await?;
                }
                GroupOutcome::Failed(failed_task) => {
                    let reason = failed_task
                        .and_then(|t| t.error)
                        .unwrap_or_else(|| "task failed".to_string());
                    return Err(EngineError::TaskFailed(reason));
                }
            }

            // Step 5e: a mission cancelled out-of-band (status flipped to
            // `failed` by another writer) breaks the group loop here.
            let mission = mission_repo.get(mission_id).await?;
            if mission.status == RunStatus::Failed {
                return Err(EngineError::TaskFailed(
                    "mission marked failed out-of-band".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Self-heal group execution (spec §4.6.2): run plain execution, and on
    /// failure attempt exactly one recovery task before giving up.
    async fn execute_group_self_heal(
        &self,
        group: &TaskGroup,
        tasks: Vec<Task>,
        task_repo: &TaskRepo<'_>,
        trace: &TraceWriter,
        run_id: Uuid,
    ) -> Result<GroupOutcome, EngineError> {
        let plain = heal::execute_group_plain(tasks, task_repo, self.dispatcher.as_ref(), trace, run_id).await?;
        let failed_task = match plain {
            GroupOutcome::Completed => return Ok(GroupOutcome::Completed),
            GroupOutcome::Failed(task) => task,
        };

        let failed_task = match failed_task {
            Some(task) => task,
            None => {
                // OQ2: no matching failed task on re-query. Still emit a
                // failure artifact, tagged distinctly, before giving up.
                self.emit_self_heal_artifact(
                    group.mission_id,
                    run_id,
                    Uuid::nil(),
                    "self-heal could not locate the failed task",
                    false,
                    &["self-heal", "workflow", "no-task-match"],
                )
                .await?;
                return Ok(GroupOutcome::Failed(None));
            }
        };

        let next_order = failed_task.order + 1;
        let recovery = heal::recovery_task(group, &failed_task, next_order);
        task_repo.create(&recovery).await?;

        self.evidence.emit(
            &EvidenceRecordBuilder::new("workflow_self_heal_attempt")
                .status("ok")
                .note(format!("recovering task {}", failed_task.id))
                .build(),
        );
        trace
            .emit(
                "workflow_self_heal_attempt",
                serde_json::json!({"group_id": group.id, "failed_task_id": failed_task.id, "run_id": run_id}),
            )
            .await?;

        let recovered = heal::execute_task(recovery, task_repo, self.dispatcher.as_ref(), trace, run_id).await?;

        if recovered.status == RunStatus::Completed {
            let summary = heal::recovery_summary(&failed_task);
            self.evidence.emit(
                &EvidenceRecordBuilder::new("workflow_self_heal_success").status("ok").note(summary.clone()).build(),
            );
            trace
                .emit(
                    "workflow_self_heal_success",
                    serde_json::json!({"group_id": group.id, "recovery_task_id": recovered.id, "run_id": run_id}),
                )
                .await?;
            self.emit_self_heal_artifact(group.mission_id, run_id, recovered.id, &summary, true, &["self-heal", "workflow"])
                .await?;
            Ok(GroupOutcome::Completed)
        } else {
            let summary = heal::recovery_failure_summary(&failed_task);
            self.emit_self_heal_artifact(
                group.mission_id,
                run_id,
                recovered.id,
                &summary,
                false,
                &["self-heal", "workflow", "failure"],
            )
            .await?;

            let signals = mission_signals::SignalPipeline::new(self.pool);
            let project_id = mission_repo_project_id(self.pool, group.mission_id).await;
            if let Err(err) = signals
                .create(
                    project_id,
                    Some(group.mission_id),
                    "self_heal_failed",
                    mission_core::SignalSeverity::Warning,
                    format!("self-heal failed for task {}: {}", failed_task.id, summary),
                )
                .await
            {
                tracing::warn!(
                    target: "mission.engine",
                    mission_id = %group.mission_id,
                    error = %err,
                    "failed to create self_heal_failed signal"
                );
            }
            Ok(GroupOutcome::Failed(Some(failed_task)))
        }
    }

    /// Build and persist a `self_heal_artifact`/`self_heal_failure`
    /// Artifact and its derived Knowledge (spec §4.6.3).
    async fn emit_self_heal_artifact(
        &self,
        mission_id: Uuid,
        run_id: Uuid,
        task_id: Uuid,
        summary: &str,
        success: bool,
        tags: &[&str],
    ) -> Result<(), EngineError> {
        let artifact_repo = ArtifactRepo::new(self.pool);
        let knowledge_repo = KnowledgeRepo::new(self.pool);

        let truncated = truncate_summary(summary);
        let sha256 = self_heal_artifact_sha256(run_id, task_id, &truncated);
        let path = self_heal_artifact_path(run_id, task_id, &truncated);
        let kind = if success { "self_heal_artifact" } else { "self_heal_failure" };

        let artifact = Artifact {
            id: Uuid::new_v4(),
            mission_id,
            task_id: if task_id.is_nil() { None } else { Some(task_id) },
            kind: kind.to_string(),
            scope: Scope::Mission,
            path,
            version: "1".to_string(),
            sha256: sha256.clone(),
            content_meta: serde_json::json!({"success": success}),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            created_at: Utc::now(),
        };
        artifact_repo.create(&artifact).await?;

        let knowledge = Knowledge {
            id: Uuid::new_v4(),
            source_artifact_id: artifact.id,
            version: artifact.version.clone(),
            scope: artifact.scope,
            sha256,
            summary: Some(truncated),
            tags: artifact.tags.clone(),
            reusable: success,
            created_at: Utc::now(),
        };
        knowledge_repo.create(&knowledge).await?;

        self.evidence.emit(
            &EvidenceRecordBuilder::new(kind)
                .file(FileRef::with_digest(artifact.path.clone(), artifact.sha256.clone()))
                .status(if success { "ok" } else { "failed" })
                .build(),
        );
        Ok(())
    }

    /// Clean-run summary emission (spec §4.6.1 step 6 / OQ1).
    async fn emit_clean_run_summary(&self, run_id: Uuid, groups: &[TaskGroup]) -> Result<(), EngineError> {
        let task_repo = TaskRepo::new(self.pool);
        let mut terminal_task: Option<Task> = None;
        for group in groups {
            let tasks = task_repo.list_for_group(group.id).await?;
            if let Some(last) = tasks.into_iter().last() {
                terminal_task = Some(last);
            }
        }
        let task_id = terminal_task.as_ref().map_or(Uuid::nil(), |t| t.id);
        let mission_id = groups.first().map_or(Uuid::nil(), |g| g.mission_id);
        self.emit_self_heal_artifact(
            mission_id,
            run_id,
            task_id,
            "workflow completed",
            true,
            &["self-heal", "workflow"],
        )
        .await
    }
}

/// Resolve the owning project for a mission, for the `self_heal_failed`
/// signal's `project_id` field.
async fn mission_repo_project_id(pool: &SqlitePool, mission_id: Uuid) -> Uuid {
    MissionRepo::new(pool).get(mission_id).await.map(|m| m.project_id).unwrap_or(mission_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_core::{Agent, Mission, Project};
    use mission_store::AgentRepo;
    use tempfile::tempdir;

    async fn pool() -> SqlitePool {
        mission_store::connect("sqlite::memory:").await.unwrap()
    }

    struct Fixture {
        pool: SqlitePool,
        project: Project,
        agent: Agent,
    }

    async fn setup() -> Fixture {
        let pool = pool().await;
        let project = mission_store::ProjectRepo::new(&pool).ensure_project("demo").await.unwrap();
        let agent = Agent {
            id: Uuid::new_v4(),
            project_id: project.id,
            name: "A".to_string(),
            program: "claude".to_string(),
            model: None,
            skills: Default::default(),
            contact_policy: serde_json::json!({}),
        };
        AgentRepo::new(&pool).create(&agent).await.unwrap();
        Fixture { pool, project, agent }
    }

    async fn create_mission(fx: &Fixture, run_mode: RunMode) -> Uuid {
        let mission = Mission {
            id: Uuid::new_v4(),
            project_id: fx.project.id,
            title: "M".to_string(),
            status: RunStatus::Pending,
            run_mode,
            context: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        MissionRepo::new(&fx.pool).create(&mission).await.unwrap();
        mission.id
    }

    async fn add_group_with_tasks(fx: &Fixture, mission_id: Uuid, order: i64, titles: &[&str]) -> Uuid {
        let group = TaskGroup {
            id: Uuid::new_v4(),
            mission_id,
            title: format!("G{order}"),
            kind: RunMode::Sequential,
            order,
            status: RunStatus::Pending,
        };
        TaskGroupRepo::new(&fx.pool).create(&group).await.unwrap();
        for (i, title) in titles.iter().enumerate() {
            let task = Task {
                id: Uuid::new_v4(),
                group_id: group.id,
                mission_id,
                agent_id: fx.agent.id,
                title: (*title).to_string(),
                status: RunStatus::Pending,
                order: i as i64,
                input: serde_json::json!({}),
                output: serde_json::json!({}),
                error: None,
            };
            TaskRepo::new(&fx.pool).create(&task).await.unwrap();
        }
        group.id
    }

    fn config(dir: &tempfile::TempDir) -> WorkflowEngineConfig {
        WorkflowEngineConfig::new(dir.path().join("traces"))
    }

    #[tokio::test]
    async fn sequential_happy_path_completes() {
        let fx = setup().await;
        let mission_id = create_mission(&fx, RunMode::Sequential).await;
        add_group_with_tasks(&fx, mission_id, 0, &["T1", "T2"]).await;

        let dir = tempdir().unwrap();
        let engine = WorkflowEngine::new(&fx.pool, config(&dir));
        let outcome = engine.run(mission_id).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);

        let mission = MissionRepo::new(&fx.pool).get(mission_id).await.unwrap();
        assert_eq!(mission.status, RunStatus::Completed);

        let artifacts = ArtifactRepo::new(&fx.pool).list_for_mission(mission_id).await.unwrap();
        assert!(artifacts.iter().any(|a| a.kind == "self_heal_artifact" && a.content_meta["success"] == true));
    }

    #[tokio::test]
    async fn missing_mission_is_rejected() {
        let fx = setup().await;
        let dir = tempdir().unwrap();
        let engine = WorkflowEngine::new(&fx.pool, config(&dir));
        let err = engine.run(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::MissionNotFound(_)));
    }

    #[tokio::test]
    async fn mission_with_no_task_groups_is_rejected() {
        let fx = setup().await;
        let mission_id = create_mission(&fx, RunMode::Sequential).await;
        let dir = tempdir().unwrap();
        let engine = WorkflowEngine::new(&fx.pool, config(&dir));
        let err = engine.run(mission_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NoTaskGroups(id) if id == mission_id));
    }

    #[tokio::test]
    async fn parallel_run_mode_is_rejected_at_run_time() {
        let fx = setup().await;
        let mission_id = create_mission(&fx, RunMode::Parallel).await;
        add_group_with_tasks(&fx, mission_id, 0, &["T1"]).await;
        let dir = tempdir().unwrap();
        let engine = WorkflowEngine::new(&fx.pool, config(&dir));
        let err = engine.run(mission_id).await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedRunMode(RunMode::Parallel)));

        // Rejected before the mission is touched: still pending.
        let mission = MissionRepo::new(&fx.pool).get(mission_id).await.unwrap();
        assert_eq!(mission.status, RunStatus::Pending);
    }

    struct FailingDispatcher;

    #[async_trait::async_trait]
    impl TaskDispatcher for FailingDispatcher {
        async fn dispatch(&self, _task: &Task) -> Result<serde_json::Value, String> {
            Err("boom".to_string())
        }
    }

    #[tokio::test]
    async fn plain_strategy_fails_mission_on_task_failure() {
        let fx = setup().await;
        let mission_id = create_mission(&fx, RunMode::Sequential).await;
        add_group_with_tasks(&fx, mission_id, 0, &["T1"]).await;
        let dir = tempdir().unwrap();
        let engine = WorkflowEngine::with_dispatcher(&fx.pool, config(&dir), Box::new(FailingDispatcher));
        let outcome = engine.run(mission_id).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
    }

    struct RecoversDispatcher;

    #[async_trait::async_trait]
    impl TaskDispatcher for RecoversDispatcher {
        async fn dispatch(&self, task: &Task) -> Result<serde_json::Value, String> {
            if task.title.starts_with("Recovery:") {
                Ok(serde_json::json!({"result": "recovered"}))
            } else {
                Err("boom".to_string())
            }
        }
    }

    #[tokio::test]
    async fn self_heal_recovers_and_mission_completes() {
        let fx = setup().await;
        let mission_id = create_mission(&fx, RunMode::Sequential).await;
        add_group_with_tasks(&fx, mission_id, 0, &["T1"]).await;
        let dir = tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.heal_strategy = HealStrategy::SelfHeal;
        let engine = WorkflowEngine::with_dispatcher(&fx.pool, cfg, Box::new(RecoversDispatcher));
        let outcome = engine.run(mission_id).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);

        let signals = mission_signals::SignalPipeline::new(&fx.pool);
        let list = signals.list(Some(fx.project.id), None, Some("self_heal_failed"), 10).await.unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn self_heal_failure_reraises_and_emits_signal() {
        let fx = setup().await;
        let mission_id = create_mission(&fx, RunMode::Sequential).await;
        add_group_with_tasks(&fx, mission_id, 0, &["T1"]).await;
        let dir = tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.heal_strategy = HealStrategy::SelfHeal;
        let engine = WorkflowEngine::with_dispatcher(&fx.pool, cfg, Box::new(FailingDispatcher));
        let outcome = engine.run(mission_id).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);

        let artifacts = ArtifactRepo::new(&fx.pool).list_for_mission(mission_id).await.unwrap();
        assert!(artifacts.iter().any(|a| a.kind == "self_heal_failure"));

        let signals = mission_signals::SignalPipeline::new(&fx.pool);
        let list = signals.list(Some(fx.project.id), None, Some("self_heal_failed"), 10).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].severity, mission_core::SignalSeverity::Warning);
        assert!(
            !list[0].message.contains("Recovered after"),
            "failed recovery must not be worded as a success: {}",
            list[0].message
        );
        assert!(list[0].message.contains("Recovery failed"));
    }

    #[tokio::test]
    async fn clean_run_summary_can_be_disabled() {
        let fx = setup().await;
        let mission_id = create_mission(&fx, RunMode::Sequential).await;
        add_group_with_tasks(&fx, mission_id, 0, &["T1"]).await;
        let dir = tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.emit_clean_run_summary = false;
        let engine = WorkflowEngine::new(&fx.pool, cfg);
        engine.run(mission_id).await.unwrap();

        let artifacts = ArtifactRepo::new(&fx.pool).list_for_mission(mission_id).await.unwrap();
        assert!(artifacts.is_empty());
    }
}
