// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inspection-driven, idempotent schema migrations.
//!
//! Each migration is a plain `async fn` that checks `sqlite_master` for
//! table existence before issuing any DDL, so running the full set twice
//! is a no-op — per the store's idempotency contract. A future migration
//! that adds a column to an existing table should guard on
//! `pragma_table_info` the same way, rather than assuming a fresh schema.

use crate::error::StoreError;
use sqlx::SqlitePool;

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool, StoreError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

/// Run every migration, in order. Safe to call on every process start.
///
/// # Errors
///
/// Returns [`StoreError`] if any underlying DDL statement fails.
pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    migrate_projects(pool).await?;
    migrate_agents(pool).await?;
    migrate_missions(pool).await?;
    migrate_task_groups(pool).await?;
    migrate_tasks(pool).await?;
    migrate_artifacts(pool).await?;
    migrate_knowledge(pool).await?;
    migrate_workflow_runs(pool).await?;
    migrate_signals(pool).await?;
    Ok(())
}

async fn migrate_projects(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "projects").await? {
        sqlx::query(
            "CREATE TABLE projects (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                human_key TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_agents(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "agents").await? {
        sqlx::query(
            "CREATE TABLE agents (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id),
                name TEXT NOT NULL,
                program TEXT NOT NULL,
                model TEXT,
                skills TEXT NOT NULL,
                contact_policy TEXT NOT NULL,
                UNIQUE(project_id, name)
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_missions(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "missions").await? {
        sqlx::query(
            "CREATE TABLE missions (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id),
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                run_mode TEXT NOT NULL,
                context TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_task_groups(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "task_groups").await? {
        sqlx::query(
            "CREATE TABLE task_groups (
                id TEXT PRIMARY KEY,
                mission_id TEXT NOT NULL REFERENCES missions(id),
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                task_order INTEGER NOT NULL,
                status TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_tasks(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "tasks").await? {
        sqlx::query(
            "CREATE TABLE tasks (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL REFERENCES task_groups(id),
                mission_id TEXT NOT NULL REFERENCES missions(id),
                agent_id TEXT NOT NULL REFERENCES agents(id),
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                task_order INTEGER NOT NULL,
                input TEXT NOT NULL,
                output TEXT NOT NULL,
                error TEXT
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_artifacts(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "artifacts").await? {
        sqlx::query(
            "CREATE TABLE artifacts (
                id TEXT PRIMARY KEY,
                mission_id TEXT NOT NULL REFERENCES missions(id),
                task_id TEXT REFERENCES tasks(id),
                kind TEXT NOT NULL,
                scope TEXT NOT NULL,
                path TEXT NOT NULL,
                version TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                content_meta TEXT NOT NULL,
                tags TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_knowledge(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "knowledge").await? {
        sqlx::query(
            "CREATE TABLE knowledge (
                id TEXT PRIMARY KEY,
                source_artifact_id TEXT NOT NULL REFERENCES artifacts(id),
                version TEXT NOT NULL,
                scope TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                summary TEXT,
                tags TEXT NOT NULL,
                reusable INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_workflow_runs(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "workflow_runs").await? {
        sqlx::query(
            "CREATE TABLE workflow_runs (
                run_id TEXT PRIMARY KEY,
                mission_id TEXT NOT NULL REFERENCES missions(id),
                mode TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                trace_uri TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn migrate_signals(pool: &SqlitePool) -> Result<(), StoreError> {
    if !table_exists(pool, "signals").await? {
        sqlx::query(
            "CREATE TABLE signals (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id),
                mission_id TEXT REFERENCES missions(id),
                kind TEXT NOT NULL,
                severity TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn migrate_twice_is_a_no_op() {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();
        assert!(table_exists(&pool, "missions").await.unwrap());
    }
}
