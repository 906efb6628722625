use crate::common::{bind_priority, row_to_task, sqlx_error_to_orchestrator_error, tags_to_json};
use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{EntityFilter, NewTask, StatusLabel, Task, UpdateTask};
use orchestrator_core::repository::{RepositoryStats, TaskRepository};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

const COLUMNS: &str =
    "id, feature_id, name, description, summary, status, priority, complexity, tags, created_at, modified_at";

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, new: NewTask) -> Result<Task> {
        if new.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = StatusLabel::new("backlog");

        let row = sqlx::query(&format!(
            "INSERT INTO tasks (id, feature_id, name, description, summary, status, priority, complexity, tags, created_at, modified_at)
             VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(new.feature_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(status.as_internal())
        .bind(bind_priority(new.priority))
        .bind(new.complexity as i64)
        .bind(tags_to_json(&new.tags))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_task(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Task> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?
            .ok_or_else(|| OrchestratorError::not_found("task", id))?;

        row_to_task(&row)
    }

    async fn update(&self, id: Uuid, patch: UpdateTask) -> Result<Task> {
        self.get(id).await?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
        let mut any = false;

        if let Some(feature_id) = patch.feature_id {
            builder.push("feature_id = ").push_bind(feature_id);
            any = true;
        }
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(OrchestratorError::empty_field("name"));
            }
            if any {
                builder.push(", ");
            }
            builder.push("name = ").push_bind(name.clone());
            any = true;
        }
        if let Some(description) = &patch.description {
            if any {
                builder.push(", ");
            }
            builder.push("description = ").push_bind(description.clone());
            any = true;
        }
        if let Some(summary) = &patch.summary {
            if any {
                builder.push(", ");
            }
            builder.push("summary = ").push_bind(summary.clone());
            any = true;
        }
        if let Some(priority) = patch.priority {
            if any {
                builder.push(", ");
            }
            builder.push("priority = ").push_bind(bind_priority(priority));
            any = true;
        }
        if let Some(complexity) = patch.complexity {
            if any {
                builder.push(", ");
            }
            builder.push("complexity = ").push_bind(complexity as i64);
            any = true;
        }
        if let Some(tags) = &patch.tags {
            if any {
                builder.push(", ");
            }
            builder.push("tags = ").push_bind(tags_to_json(tags));
            any = true;
        }

        if !any {
            return self.get(id).await;
        }

        builder.push(", modified_at = ").push_bind(Utc::now());
        builder.push(" WHERE id = ").push_bind(id);

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        self.get(id).await
    }

    async fn set_status(&self, id: Uuid, status: StatusLabel) -> Result<Task> {
        self.get(id).await?;
        sqlx::query("UPDATE tasks SET status = ?, modified_at = ? WHERE id = ?")
            .bind(status.as_internal())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("task", id));
        }
        Ok(())
    }

    async fn list(&self, filter: EntityFilter) -> Result<Vec<Task>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM tasks"));
        let mut any = false;

        if let Some(parent_id) = filter.parent_id {
            builder.push(" WHERE feature_id ");
            match parent_id {
                Some(fid) => {
                    builder.push("= ").push_bind(fid);
                }
                None => {
                    builder.push("IS NULL");
                }
            }
            any = true;
        }
        if let Some(status) = &filter.status {
            builder.push(if any { " AND " } else { " WHERE " });
            builder.push("status = ").push_bind(status.as_internal().to_string());
            any = true;
        }
        if let Some(priority) = filter.priority {
            builder.push(if any { " AND " } else { " WHERE " });
            builder.push("priority = ").push_bind(bind_priority(priority));
            any = true;
        }
        if let Some(tag) = &filter.tag {
            builder.push(if any { " AND " } else { " WHERE " });
            builder.push("tags LIKE ").push_bind(format!("%\"{tag}\"%"));
            any = true;
        }

        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn list_by_feature(&self, feature_id: Uuid) -> Result<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM tasks WHERE feature_id = ? ORDER BY created_at ASC"
        ))
        .bind(feature_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn list_unblocked_candidates(&self, limit: u32) -> Result<Vec<Task>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {COLUMNS} FROM tasks
               WHERE status NOT IN ('COMPLETED', 'CANCELLED', 'DEPLOYED', 'BLOCKED', 'ON_HOLD')
               ORDER BY
                 CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END ASC,
                 created_at ASC
               LIMIT ?"#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn stats(&self) -> Result<RepositoryStats> {
        let project_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        let feature_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM features")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        let task_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        let dependency_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dependencies")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        let rows = sqlx::query("SELECT status, COUNT(*) as n FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        let counts_by_status = rows
            .iter()
            .map(|r| (r.get::<String, _>("status"), r.get::<i64, _>("n")))
            .collect();

        Ok(RepositoryStats {
            project_count,
            feature_count,
            task_count,
            dependency_count,
            counts_by_status,
        })
    }
}
