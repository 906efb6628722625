use crate::common::{bind_dependency_type, row_to_dependency, sqlx_error_to_orchestrator_error};
use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{Dependency, NewDependency};
use orchestrator_core::repository::DependencyRepository;
use sqlx::SqlitePool;
use uuid::Uuid;

const COLUMNS: &str = "id, from_task_id, to_task_id, dependency_type, unblock_at, created_at";

#[derive(Clone)]
pub struct SqliteDependencyRepository {
    pool: SqlitePool,
}

impl SqliteDependencyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyRepository for SqliteDependencyRepository {
    async fn create(&self, new: NewDependency) -> Result<Dependency> {
        if new.from_task_id == new.to_task_id {
            return Err(OrchestratorError::Validation(
                "a task cannot depend on itself".to_string(),
            ));
        }
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO dependencies (id, from_task_id, to_task_id, dependency_type, unblock_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(new.from_task_id)
        .bind(new.to_task_id)
        .bind(bind_dependency_type(new.dependency_type))
        .bind(&new.unblock_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_dependency(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM dependencies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("dependency", id));
        }
        Ok(())
    }

    async fn list_for_task(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM dependencies WHERE from_task_id = ? OR to_task_id = ?"
        ))
        .bind(task_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn list_all_blocking(&self) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM dependencies WHERE dependency_type != 'RELATES_TO'"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_dependency).collect()
    }
}
