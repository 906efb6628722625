//! SQLite persistence for the task orchestration engine.
//!
//! Offers one [`SqliteStore`] per database connection pool, and one
//! lightweight repository struct per entity kind — all cheap `Clone`s of
//! the same pool, following the connection-pooling approach the rest of
//! this workspace's storage layer is built around.

mod common;
mod dependencies;
mod features;
mod migrations;
mod projects;
mod role_transitions;
mod sections;
mod tasks;

pub use dependencies::SqliteDependencyRepository;
pub use features::SqliteFeatureRepository;
pub use projects::SqliteProjectRepository;
pub use role_transitions::SqliteRoleTransitionRepository;
pub use sections::SqliteSectionRepository;
pub use tasks::SqliteTaskRepository;

use orchestrator_core::error::{OrchestratorError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

/// Owns the connection pool and hands out per-entity repositories backed by
/// it. Construct with [`SqliteStore::connect`], then call
/// [`SqliteStore::migrate`] before first use.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") || database_url.starts_with("sqlite://")
        {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            Sqlite::create_database(&db_url).await.map_err(|e| {
                OrchestratorError::Database(format!("failed to create database: {e}"))
            })?;
        }

        let options = if db_url.contains(":memory:") {
            SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| OrchestratorError::Database(format!("failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn projects(&self) -> SqliteProjectRepository {
        SqliteProjectRepository::new(self.pool.clone())
    }

    pub fn features(&self) -> SqliteFeatureRepository {
        SqliteFeatureRepository::new(self.pool.clone())
    }

    pub fn tasks(&self) -> SqliteTaskRepository {
        SqliteTaskRepository::new(self.pool.clone())
    }

    pub fn sections(&self) -> SqliteSectionRepository {
        SqliteSectionRepository::new(self.pool.clone())
    }

    pub fn dependencies(&self) -> SqliteDependencyRepository {
        SqliteDependencyRepository::new(self.pool.clone())
    }

    pub fn role_transitions(&self) -> SqliteRoleTransitionRepository {
        SqliteRoleTransitionRepository::new(self.pool.clone())
    }

    /// Basic liveness probe backing the `health_check` tool.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| OrchestratorError::Database(format!("health check failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::models::{NewProject, NewTask};
    use orchestrator_core::repository::{ProjectRepository, TaskRepository};

    async fn test_store() -> SqliteStore {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let store = test_store().await;
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn create_and_get_project_roundtrips() {
        let store = test_store().await;
        let projects = store.projects();
        let created = projects
            .create(NewProject {
                name: "orbit".to_string(),
                summary: "launch readiness".to_string(),
                priority: Default::default(),
                tags: vec!["infra".to_string()],
            })
            .await
            .unwrap();

        let fetched = projects.get(created.id).await.unwrap();
        assert_eq!(fetched.name, "orbit");
        assert_eq!(fetched.status.as_internal(), "PLANNING");
    }

    #[tokio::test]
    async fn task_create_defaults_to_backlog() {
        let store = test_store().await;
        let tasks = store.tasks();
        let task = tasks
            .create(NewTask {
                feature_id: None,
                name: "wire up metrics".to_string(),
                description: String::new(),
                priority: Default::default(),
                complexity: 5,
                tags: vec![],
            })
            .await
            .unwrap();
        assert_eq!(task.status.as_internal(), "BACKLOG");
    }

    #[tokio::test]
    async fn health_check_succeeds_against_fresh_database() {
        let store = test_store().await;
        store.health_check().await.unwrap();
    }
}
