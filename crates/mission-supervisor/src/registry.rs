// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Stream Registry (spec §4.3): a process-wide `run_id -> (session,
//! role, mission_id)` map used by the CLI's `attach` flow to pipe input
//! into a live stream session from a second invocation, without holding
//! the original process handle.

use crate::process::StreamSession;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Metadata recorded alongside a registered session.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    /// Role running in this session (planner/coder/tester/...).
    pub role: Option<String>,
    /// Owning mission.
    pub mission_id: Uuid,
}

/// Raised when a lookup targets an unregistered `run_id`.
#[derive(Debug, thiserror::Error)]
#[error("no stream session registered for run {0}")]
pub struct SessionNotFound(pub Uuid);

struct Entry {
    session: StreamSession,
    meta: SessionMeta,
}

/// Process-wide registry of live [`StreamSession`]s, keyed by run id.
///
/// Per spec §4.3, this is deliberately process-local state (not persisted):
/// a restart drops every entry, and any in-flight `attach` targeting a
/// dropped run fails with [`SessionNotFound`]. Uses a [`tokio::sync::Mutex`]
/// rather than `std::sync::Mutex` so the guard can be held across the
/// `.await` in [`StreamRegistry::send_line`].
#[derive(Default)]
pub struct StreamRegistry {
    sessions: Mutex<HashMap<Uuid, Entry>>,
}

impl StreamRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly spawned session under `run_id`.
    pub async fn register(&self, run_id: Uuid, session: StreamSession, meta: SessionMeta) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(run_id, Entry { session, meta });
        tracing::debug!(target: "mission.supervisor", %run_id, "stream session registered");
    }

    /// Remove and return the session for `run_id`, if present. Used by
    /// `terminate` flows that need to consume the session to close it.
    pub async fn deregister(&self, run_id: Uuid) -> Option<(StreamSession, SessionMeta)> {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&run_id).map(|e| (e.session, e.meta))
    }

    /// Metadata for a live session, without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionNotFound`] if `run_id` is not registered.
    pub async fn meta(&self, run_id: Uuid) -> Result<SessionMeta, SessionNotFound> {
        let sessions = self.sessions.lock().await;
        sessions.get(&run_id).map(|e| e.meta.clone()).ok_or(SessionNotFound(run_id))
    }

    /// Write `text` to the stdin of the session registered under `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionNotFound`] if `run_id` is not registered. Errors
    /// writing to the session itself surface as the inner
    /// [`crate::process::SupervisorError`].
    pub async fn send_line(
        &self,
        run_id: Uuid,
        text: &str,
    ) -> Result<Result<(), crate::process::SupervisorError>, SessionNotFound> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&run_id).ok_or(SessionNotFound(run_id))?;
        Ok(entry.session.send_line(text).await)
    }

    /// Non-blocking check whether the session registered under `run_id` has
    /// exited. Leaves the session registered either way; callers that get
    /// `Some` back are expected to follow up with [`StreamRegistry::deregister`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionNotFound`] if `run_id` is not registered. A
    /// supervisor-level error while polling the child is treated as "still
    /// running" rather than propagated, since the caller's only action on
    /// error would be to poll again.
    pub async fn try_wait(&self, run_id: Uuid) -> Result<Option<i32>, SessionNotFound> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&run_id).ok_or(SessionNotFound(run_id))?;
        Ok(entry.session.try_wait().await.unwrap_or(None))
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether the registry has no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn meta_on_unregistered_run_is_not_found() {
        let registry = StreamRegistry::new();
        let run_id = Uuid::new_v4();
        assert!(registry.meta(run_id).await.is_err());
    }

    #[tokio::test]
    async fn empty_registry_reports_empty() {
        let registry = StreamRegistry::new();
        assert!(registry.is_empty().await);
    }
}
