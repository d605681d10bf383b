// SPDX-License-Identifier: MIT OR Apache-2.0
//! Workflow engine error type.

use mission_store::StoreError;
use uuid::Uuid;

/// Errors raised while running a mission (spec §4.6.5).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The targeted mission does not exist.
    #[error("mission {0} not found")]
    MissionNotFound(Uuid),
    /// The mission has no task groups to run.
    #[error("mission {0} has no task groups")]
    NoTaskGroups(Uuid),
    /// `mission.run_mode` is not `sequential`; reserved modes are rejected
    /// at run time rather than silently treated as sequential.
    #[error("run_mode {0:?} is reserved and not yet supported at run time")]
    UnsupportedRunMode(mission_core::RunMode),
    /// A task (or its one self-heal recovery attempt) ended `failed`; this
    /// is the terminal group failure reason recorded on the mission.
    #[error("task execution failed: {0}")]
    TaskFailed(String),
    /// The workflow trace log could not be written.
    #[error("failed to write workflow trace {path}: {source}")]
    Trace {
        /// Trace log path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
