// SPDX-License-Identifier: MIT OR Apache-2.0
//! Group execution and the self-heal strategy (spec §4.6.1/§4.6.2).
//!
//! One `Workflow` type, parameterized by [`HealStrategy`], replaces the
//! inheritance the distilled contract describes ("two executors... both
//! implement the same contract"): `Plain` is the sequential executor: run
//! every task, stop at the first failure. `SelfHeal` wraps it with one
//! recovery attempt per failed group.

use crate::dispatch::TaskDispatcher;
use crate::error::EngineError;
use crate::trace::TraceWriter;
use chrono::Utc;
use mission_core::{Task, TaskGroup};
use mission_store::TaskRepo;
use uuid::Uuid;

/// Which policy a [`crate::WorkflowEngine`] applies when a group's tasks
/// fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealStrategy {
    /// Stop at the first task failure; the mission fails.
    #[default]
    Plain,
    /// Attempt exactly one recovery task per failed group before failing
    /// the mission.
    SelfHeal,
}

/// Result of driving one [`TaskGroup`] to completion.
#[derive(Debug, Clone)]
pub enum GroupOutcome {
    /// Every task in the group completed.
    Completed,
    /// A task failed. `Some(task)` is the failed task; `None` means the
    /// self-heal path could not find a matching failed task on re-query
    /// (an inconsistent-state edge case — still fails the mission).
    Failed(Option<Task>),
}

/// Run every task in `tasks` (already ordered) in order, stopping at the
/// first failure. Implements the sequential executor's group step
/// (spec §4.6.1 step 5c).
///
/// # Errors
///
/// Returns [`EngineError`] if persisting a task or trace event fails.
pub async fn execute_group_plain(
    tasks: Vec<Task>,
    task_repo: &TaskRepo<'_>,
    dispatcher: &dyn TaskDispatcher,
    trace: &TraceWriter,
    run_id: Uuid,
) -> Result<GroupOutcome, EngineError> {
    for task in tasks {
        let executed = execute_task(task, task_repo, dispatcher, trace, run_id).await?;
        if executed.status == mission_core::RunStatus::Failed {
            return Ok(GroupOutcome::Failed(Some(executed)));
        }
    }
    Ok(GroupOutcome::Completed)
}

/// `execute_task` (spec §4.6.1): transition `pending -> running`, dispatch,
/// persist the result, and append a trace history entry.
///
/// # Errors
///
/// Returns [`EngineError`] if persisting the task or trace event fails.
pub async fn execute_task(
    mut task: Task,
    task_repo: &TaskRepo<'_>,
    dispatcher: &dyn TaskDispatcher,
    trace: &TraceWriter,
    run_id: Uuid,
) -> Result<Task, EngineError> {
    task.status = mission_core::RunStatus::Running;
    if task.input.is_null() {
        task.input = serde_json::json!({});
    }
    task_repo.update(&task).await?;

    match dispatcher.dispatch(&task).await {
        Ok(output) => {
            task.status = mission_core::RunStatus::Completed;
            task.output = output;
            task.error = None;
        }
        Err(error) => {
            task.status = mission_core::RunStatus::Failed;
            task.error = Some(error);
        }
    }
    task_repo.update(&task).await?;

    trace
        .emit(
            "workflow_task_executed",
            serde_json::json!({
                "task_id": task.id,
                "status": task.status,
                "output": task.output,
                "run_id": run_id,
            }),
        )
        .await?;
    Ok(task)
}

/// Build the recovery task for a failed task, per spec §4.6.2 step 3.
#[must_use]
pub fn recovery_task(group: &TaskGroup, failed: &Task, order: i64) -> Task {
    Task {
        id: Uuid::new_v4(),
        group_id: group.id,
        mission_id: group.mission_id,
        agent_id: failed.agent_id,
        title: format!("Recovery: {}", failed.title),
        status: mission_core::RunStatus::Pending,
        order,
        input: serde_json::json!({
            "error": failed.error,
            "original_input": failed.input,
        }),
        output: serde_json::json!({}),
        error: None,
    }
}

/// A summary string for a successful `self_heal_artifact`/Knowledge pair
/// (spec §4.6.2 step 5).
#[must_use]
pub fn recovery_summary(failed: &Task) -> String {
    format!(
        "Recovered after {} -> {}",
        failed.title,
        failed.error.as_deref().unwrap_or("unknown error")
    )
}

/// A summary string for a failed recovery attempt's `self_heal_failure`
/// artifact/Knowledge and `self_heal_failed` signal (spec §4.6.2 step 6).
/// Distinct from [`recovery_summary`] so a failed recovery never claims to
/// have succeeded.
#[must_use]
pub fn recovery_failure_summary(failed: &Task) -> String {
    format!(
        "Recovery failed: {} -> {}",
        failed.title,
        failed.error.as_deref().unwrap_or("unknown error")
    )
}

/// Timestamp helper kept in one place so every emission in this module
/// uses the same clock call style as the rest of the engine.
#[must_use]
pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
