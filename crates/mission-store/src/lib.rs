// SPDX-License-Identifier: MIT OR Apache-2.0
//! mission-store
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The Store (spec §4.5): relational persistence for every entity in the
//! data model, behind one thin repository per entity family. Schema
//! migrations are inspection-driven and idempotent (spec §4.5's "safe to
//! run on every start" requirement) rather than tracked by a migrations
//! table, so the same binary can be pointed at a fresh or an existing
//! database without special-casing either.

mod error;
mod migrate;
mod repo;

pub use error::StoreError;
pub use migrate::migrate;
pub use repo::{
    AgentRepo, ArtifactRepo, KnowledgeRepo, MissionRepo, ProjectRepo, SignalRepo, TaskGroupRepo,
    TaskRepo, WorkflowRunRepo,
};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Open a connection pool at `database_url` and run every migration.
///
/// `database_url` is an sqlx sqlite URL, e.g. `sqlite://mission.db` or
/// `sqlite::memory:`. Relative file URLs are not created automatically by
/// sqlx; callers pointing at a new file should suffix `?mode=rwc`.
///
/// # Errors
///
/// Returns [`StoreError`] if the pool cannot be established or a migration
/// fails.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new().max_connections(8).connect(database_url).await?;
    migrate(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_runs_migrations_and_is_idempotent() {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();
        let repo = ProjectRepo::new(&pool);
        let project = repo.ensure_project("demo").await.unwrap();
        assert_eq!(project.slug, "demo");
    }
}
