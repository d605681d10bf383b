// SPDX-License-Identifier: MIT OR Apache-2.0
//! Task dispatch seam (spec §4.6.1 `execute_task`).
//!
//! The contract permits substituting a real dispatch that invokes the
//! Process Supervisor for the agent identified by `task.agent_id`; this
//! trait is that seam. [`SimulatedDispatcher`] is the MVP default: it
//! assigns `{"result":"simulated_success","timestamp":<now>}` without
//! touching a real agent CLI.

use async_trait::async_trait;
use chrono::Utc;
use mission_core::Task;

/// Produces a task's `output`, or fails with a human-readable error.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Execute `task` and return its output document, or an error message
    /// to record on [`Task::error`].
    async fn dispatch(&self, task: &Task) -> Result<serde_json::Value, String>;
}

/// MVP dispatcher: simulates every task as an immediate success.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedDispatcher;

#[async_trait]
impl TaskDispatcher for SimulatedDispatcher {
    async fn dispatch(&self, _task: &Task) -> Result<serde_json::Value, String> {
        Ok(serde_json::json!({
            "result": "simulated_success",
            "timestamp": Utc::now(),
        }))
    }
}
