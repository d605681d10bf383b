// SPDX-License-Identifier: MIT OR Apache-2.0
//! One repository per entity family, each a thin wrapper around `&SqlitePool`.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use mission_core::{
    Agent, Artifact, Knowledge, Mission, RunMode, RunStatus, Scope, Signal, SignalSeverity,
    SignalStatus, Task, TaskGroup, WorkflowRun, WorkflowRunStatus,
};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn parse_tags(s: &str) -> BTreeSet<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> RunStatus {
    match s {
        "running" => RunStatus::Running,
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        _ => RunStatus::Pending,
    }
}

fn run_mode_str(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Sequential => "sequential",
        RunMode::Parallel => "parallel",
        RunMode::Loop => "loop",
    }
}

fn parse_run_mode(s: &str) -> RunMode {
    match s {
        "parallel" => RunMode::Parallel,
        "loop" => RunMode::Loop,
        _ => RunMode::Sequential,
    }
}

// ---------------------------------------------------------------------------
// ProjectRepo
// ---------------------------------------------------------------------------

/// Repository for [`mission_core::Project`].
pub struct ProjectRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProjectRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotently create (or fetch) a project for `human_key`, deriving
    /// its slug by replacing `\` and `:` with `-`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn ensure_project(&self, human_key: &str) -> Result<mission_core::Project, StoreError> {
        let slug = mission_core::slugify(human_key);
        let now = Utc::now();
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO projects (id, slug, human_key, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(slug) DO UPDATE SET human_key = excluded.human_key",
        )
        .bind(id.to_string())
        .bind(&slug)
        .bind(human_key)
        .bind(now.to_rfc3339())
        .execute(self.pool)
        .await?;

        self.by_slug(&slug).await?.ok_or_else(|| StoreError::NotFound {
            kind: "project",
            id: slug,
        })
    }

    /// Look up a project by slug.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn by_slug(&self, slug: &str) -> Result<Option<mission_core::Project>, StoreError> {
        let row = sqlx::query("SELECT id, slug, human_key, created_at FROM projects WHERE slug = ?")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|r| mission_core::Project {
            id: Uuid::parse_str(r.get::<String, _>("id").as_str()).unwrap_or_default(),
            slug: r.get("slug"),
            human_key: r.get("human_key"),
            created_at: parse_dt(&r.get::<String, _>("created_at")),
        }))
    }
}

// ---------------------------------------------------------------------------
// AgentRepo
// ---------------------------------------------------------------------------

/// Repository for [`Agent`].
pub struct AgentRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AgentRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an agent. `(project_id, name)` must be unique.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the `(project_id, name)` pair already
    /// exists or any other database failure occurs.
    pub async fn create(&self, agent: &Agent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO agents (id, project_id, name, program, model, skills, contact_policy)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(agent.id.to_string())
        .bind(agent.project_id.to_string())
        .bind(&agent.name)
        .bind(&agent.program)
        .bind(&agent.model)
        .bind(serde_json::to_string(&agent.skills)?)
        .bind(serde_json::to_string(&agent.contact_policy)?)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch an agent by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such agent exists, or
    /// [`StoreError`] on any other database failure.
    pub async fn get(&self, id: Uuid) -> Result<Agent, StoreError> {
        let row = sqlx::query(
            "SELECT id, project_id, name, program, model, skills, contact_policy FROM agents WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound { kind: "agent", id: id.to_string() })?;

        Ok(Agent {
            id,
            project_id: Uuid::parse_str(&row.get::<String, _>("project_id")).unwrap_or_default(),
            name: row.get("name"),
            program: row.get("program"),
            model: row.get("model"),
            skills: parse_tags(&row.get::<String, _>("skills")),
            contact_policy: serde_json::from_str(&row.get::<String, _>("contact_policy"))
                .unwrap_or(serde_json::json!({})),
        })
    }
}

// ---------------------------------------------------------------------------
// MissionRepo
// ---------------------------------------------------------------------------

/// Repository for [`Mission`].
pub struct MissionRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MissionRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new mission.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn create(&self, mission: &Mission) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO missions (id, project_id, title, status, run_mode, context, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(mission.id.to_string())
        .bind(mission.project_id.to_string())
        .bind(&mission.title)
        .bind(status_str(mission.status))
        .bind(run_mode_str(mission.run_mode))
        .bind(serde_json::to_string(&mission.context)?)
        .bind(mission.created_at.to_rfc3339())
        .bind(mission.updated_at.to_rfc3339())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a mission by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such mission exists.
    pub async fn get(&self, id: Uuid) -> Result<Mission, StoreError> {
        let row = sqlx::query(
            "SELECT id, project_id, title, status, run_mode, context, created_at, updated_at FROM missions WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound { kind: "mission", id: id.to_string() })?;
        Ok(row_to_mission(&row))
    }

    /// List missions, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn list(&self) -> Result<Vec<Mission>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, project_id, title, status, run_mode, context, created_at, updated_at
             FROM missions ORDER BY created_at DESC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.iter().map(row_to_mission).collect())
    }

    /// Persist a mission's `status` and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn set_status(&self, id: Uuid, status: RunStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE missions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status_str(status))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_mission(row: &sqlx::sqlite::SqliteRow) -> Mission {
    Mission {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_default(),
        project_id: Uuid::parse_str(&row.get::<String, _>("project_id")).unwrap_or_default(),
        title: row.get("title"),
        status: parse_status(&row.get::<String, _>("status")),
        run_mode: parse_run_mode(&row.get::<String, _>("run_mode")),
        context: serde_json::from_str(&row.get::<String, _>("context")).unwrap_or(serde_json::json!({})),
        created_at: parse_dt(&row.get::<String, _>("created_at")),
        updated_at: parse_dt(&row.get::<String, _>("updated_at")),
    }
}

// ---------------------------------------------------------------------------
// TaskGroupRepo
// ---------------------------------------------------------------------------

/// Repository for [`TaskGroup`].
pub struct TaskGroupRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TaskGroupRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new task group.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn create(&self, group: &TaskGroup) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO task_groups (id, mission_id, title, kind, task_order, status)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(group.id.to_string())
        .bind(group.mission_id.to_string())
        .bind(&group.title)
        .bind(run_mode_str(group.kind))
        .bind(group.order)
        .bind(status_str(group.status))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// List a mission's task groups ordered by `order` ascending (ties by
    /// insertion, i.e. `rowid`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn list_for_mission(&self, mission_id: Uuid) -> Result<Vec<TaskGroup>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, mission_id, title, kind, task_order, status FROM task_groups
             WHERE mission_id = ? ORDER BY task_order ASC, rowid ASC",
        )
        .bind(mission_id.to_string())
        .fetch_all(self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| TaskGroup {
                id: Uuid::parse_str(&r.get::<String, _>("id")).unwrap_or_default(),
                mission_id: Uuid::parse_str(&r.get::<String, _>("mission_id")).unwrap_or_default(),
                title: r.get("title"),
                kind: parse_run_mode(&r.get::<String, _>("kind")),
                order: r.get("task_order"),
                status: parse_status(&r.get::<String, _>("status")),
            })
            .collect())
    }

    /// Persist a task group's `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn set_status(&self, id: Uuid, status: RunStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE task_groups SET status = ? WHERE id = ?")
            .bind(status_str(status))
            .bind(id.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TaskRepo
// ---------------------------------------------------------------------------

/// Repository for [`Task`].
pub struct TaskRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TaskRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn create(&self, task: &Task) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tasks (id, group_id, mission_id, agent_id, title, status, task_order, input, output, error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(task.group_id.to_string())
        .bind(task.mission_id.to_string())
        .bind(task.agent_id.to_string())
        .bind(&task.title)
        .bind(status_str(task.status))
        .bind(task.order)
        .bind(serde_json::to_string(&task.input)?)
        .bind(serde_json::to_string(&task.output)?)
        .bind(&task.error)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// List a group's tasks ordered by `order` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn list_for_group(&self, group_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, group_id, mission_id, agent_id, title, status, task_order, input, output, error
             FROM tasks WHERE group_id = ? ORDER BY task_order ASC, rowid ASC",
        )
        .bind(group_id.to_string())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.iter().map(row_to_task).collect())
    }

    /// Persist a task's full mutable state (`status`, `output`, `error`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn update(&self, task: &Task) -> Result<(), StoreError> {
        sqlx::query("UPDATE tasks SET status = ?, input = ?, output = ?, error = ? WHERE id = ?")
            .bind(status_str(task.status))
            .bind(serde_json::to_string(&task.input)?)
            .bind(serde_json::to_string(&task.output)?)
            .bind(&task.error)
            .bind(task.id.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Task {
    Task {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_default(),
        group_id: Uuid::parse_str(&row.get::<String, _>("group_id")).unwrap_or_default(),
        mission_id: Uuid::parse_str(&row.get::<String, _>("mission_id")).unwrap_or_default(),
        agent_id: Uuid::parse_str(&row.get::<String, _>("agent_id")).unwrap_or_default(),
        title: row.get("title"),
        status: parse_status(&row.get::<String, _>("status")),
        order: row.get("task_order"),
        input: serde_json::from_str(&row.get::<String, _>("input")).unwrap_or(serde_json::json!({})),
        output: serde_json::from_str(&row.get::<String, _>("output")).unwrap_or(serde_json::json!({})),
        error: row.get("error"),
    }
}

// ---------------------------------------------------------------------------
// ArtifactRepo
// ---------------------------------------------------------------------------

/// Repository for [`Artifact`].
pub struct ArtifactRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ArtifactRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new artifact. Artifacts are append-only; there is no
    /// update method.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn create(&self, artifact: &Artifact) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO artifacts (id, mission_id, task_id, kind, scope, path, version, sha256, content_meta, tags, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(artifact.id.to_string())
        .bind(artifact.mission_id.to_string())
        .bind(artifact.task_id.map(|t| t.to_string()))
        .bind(&artifact.kind)
        .bind(scope_str(artifact.scope))
        .bind(&artifact.path)
        .bind(&artifact.version)
        .bind(&artifact.sha256)
        .bind(serde_json::to_string(&artifact.content_meta)?)
        .bind(serde_json::to_string(&artifact.tags)?)
        .bind(artifact.created_at.to_rfc3339())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// List a mission's artifacts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn list_for_mission(&self, mission_id: Uuid) -> Result<Vec<Artifact>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, mission_id, task_id, kind, scope, path, version, sha256, content_meta, tags, created_at
             FROM artifacts WHERE mission_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(mission_id.to_string())
        .fetch_all(self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| Artifact {
                id: Uuid::parse_str(&r.get::<String, _>("id")).unwrap_or_default(),
                mission_id: Uuid::parse_str(&r.get::<String, _>("mission_id")).unwrap_or_default(),
                task_id: r
                    .get::<Option<String>, _>("task_id")
                    .and_then(|s| Uuid::parse_str(&s).ok()),
                kind: r.get("kind"),
                scope: parse_scope(&r.get::<String, _>("scope")),
                path: r.get("path"),
                version: r.get("version"),
                sha256: r.get("sha256"),
                content_meta: serde_json::from_str(&r.get::<String, _>("content_meta"))
                    .unwrap_or(serde_json::json!({})),
                tags: parse_tags(&r.get::<String, _>("tags")),
                created_at: parse_dt(&r.get::<String, _>("created_at")),
            })
            .collect())
    }
}

fn scope_str(scope: Scope) -> &'static str {
    match scope {
        Scope::Session => "session",
        Scope::User => "user",
        Scope::Project => "project",
        Scope::Mission => "mission",
    }
}

fn parse_scope(s: &str) -> Scope {
    match s {
        "session" => Scope::Session,
        "user" => Scope::User,
        "project" => Scope::Project,
        _ => Scope::Mission,
    }
}

// ---------------------------------------------------------------------------
// KnowledgeRepo
// ---------------------------------------------------------------------------

/// Repository for [`Knowledge`].
pub struct KnowledgeRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> KnowledgeRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new knowledge record, derived from an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn create(&self, knowledge: &Knowledge) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO knowledge (id, source_artifact_id, version, scope, sha256, summary, tags, reusable, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(knowledge.id.to_string())
        .bind(knowledge.source_artifact_id.to_string())
        .bind(&knowledge.version)
        .bind(scope_str(knowledge.scope))
        .bind(&knowledge.sha256)
        .bind(&knowledge.summary)
        .bind(serde_json::to_string(&knowledge.tags)?)
        .bind(knowledge.reusable)
        .bind(knowledge.created_at.to_rfc3339())
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WorkflowRunRepo
// ---------------------------------------------------------------------------

/// Repository for [`WorkflowRun`].
pub struct WorkflowRunRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WorkflowRunRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new workflow run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn create(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO workflow_runs (run_id, mission_id, mode, status, started_at, ended_at, trace_uri)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.run_id.to_string())
        .bind(run.mission_id.to_string())
        .bind(run_mode_str(run.mode))
        .bind(workflow_run_status_str(run.status))
        .bind(run.started_at.to_rfc3339())
        .bind(run.ended_at.map(|t| t.to_rfc3339()))
        .bind(&run.trace_uri)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Persist a run's terminal `status` and `ended_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn finish(
        &self,
        run_id: Uuid,
        status: WorkflowRunStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE workflow_runs SET status = ?, ended_at = ? WHERE run_id = ?")
            .bind(workflow_run_status_str(status))
            .bind(ended_at.to_rfc3339())
            .bind(run_id.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

fn workflow_run_status_str(status: WorkflowRunStatus) -> &'static str {
    match status {
        WorkflowRunStatus::Running => "running",
        WorkflowRunStatus::Completed => "completed",
        WorkflowRunStatus::Failed => "failed",
    }
}

// ---------------------------------------------------------------------------
// SignalRepo
// ---------------------------------------------------------------------------

/// Repository for [`Signal`].
pub struct SignalRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SignalRepo<'a> {
    /// Bind to a pool.
    #[must_use]
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new signal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn create(&self, signal: &Signal) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO signals (id, project_id, mission_id, kind, severity, status, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(signal.id.to_string())
        .bind(signal.project_id.to_string())
        .bind(signal.mission_id.map(|m| m.to_string()))
        .bind(&signal.kind)
        .bind(severity_str(signal.severity))
        .bind(signal_status_str(signal.status))
        .bind(&signal.message)
        .bind(signal.created_at.to_rfc3339())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// List signals, optionally filtered by project, status, and/or kind,
    /// newest first, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn list(
        &self,
        project_id: Option<Uuid>,
        status: Option<SignalStatus>,
        kind: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Signal>, StoreError> {
        let mut sql = String::from(
            "SELECT id, project_id, mission_id, kind, severity, status, message, created_at FROM signals WHERE 1=1",
        );
        if project_id.is_some() {
            sql.push_str(" AND project_id = ?");
        }
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(p) = project_id {
            query = query.bind(p.to_string());
        }
        if let Some(s) = status {
            query = query.bind(signal_status_str(s));
        }
        if let Some(k) = kind {
            query = query.bind(k.to_string());
        }
        query = query.bind(limit);

        let rows = query.fetch_all(self.pool).await?;
        Ok(rows
            .iter()
            .map(|r| Signal {
                id: Uuid::parse_str(&r.get::<String, _>("id")).unwrap_or_default(),
                project_id: Uuid::parse_str(&r.get::<String, _>("project_id")).unwrap_or_default(),
                mission_id: r
                    .get::<Option<String>, _>("mission_id")
                    .and_then(|s| Uuid::parse_str(&s).ok()),
                kind: r.get("kind"),
                severity: parse_severity(&r.get::<String, _>("severity")),
                status: parse_signal_status(&r.get::<String, _>("status")),
                message: r.get("message"),
                created_at: parse_dt(&r.get::<String, _>("created_at")),
            })
            .collect())
    }

    /// Fetch a signal by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such signal exists.
    pub async fn get(&self, id: Uuid) -> Result<Signal, StoreError> {
        let row = sqlx::query(
            "SELECT id, project_id, mission_id, kind, severity, status, message, created_at FROM signals WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound { kind: "signal", id: id.to_string() })?;
        Ok(Signal {
            id,
            project_id: Uuid::parse_str(&row.get::<String, _>("project_id")).unwrap_or_default(),
            mission_id: row
                .get::<Option<String>, _>("mission_id")
                .and_then(|s| Uuid::parse_str(&s).ok()),
            kind: row.get("kind"),
            severity: parse_severity(&row.get::<String, _>("severity")),
            status: parse_signal_status(&row.get::<String, _>("status")),
            message: row.get("message"),
            created_at: parse_dt(&row.get::<String, _>("created_at")),
        })
    }

    /// Persist a signal's `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying database failure.
    pub async fn set_status(&self, id: Uuid, status: SignalStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE signals SET status = ? WHERE id = ?")
            .bind(signal_status_str(status))
            .bind(id.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

fn severity_str(severity: SignalSeverity) -> &'static str {
    match severity {
        SignalSeverity::Info => "info",
        SignalSeverity::Warning => "warning",
        SignalSeverity::Error => "error",
        SignalSeverity::Critical => "critical",
    }
}

fn parse_severity(s: &str) -> SignalSeverity {
    match s {
        "warning" => SignalSeverity::Warning,
        "error" => SignalSeverity::Error,
        "critical" => SignalSeverity::Critical,
        _ => SignalSeverity::Info,
    }
}

fn signal_status_str(status: SignalStatus) -> &'static str {
    match status {
        SignalStatus::Pending => "pending",
        SignalStatus::Approved => "approved",
        SignalStatus::Denied => "denied",
        SignalStatus::Acknowledged => "acknowledged",
    }
}

fn parse_signal_status(s: &str) -> SignalStatus {
    match s {
        "approved" => SignalStatus::Approved,
        "denied" => SignalStatus::Denied,
        "acknowledged" => SignalStatus::Acknowledged,
        _ => SignalStatus::Pending,
    }
}
