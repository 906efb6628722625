use crate::common::{bind_priority, row_to_project, sqlx_error_to_orchestrator_error, tags_to_json};
use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{EntityFilter, NewProject, Project, StatusLabel, UpdateProject};
use orchestrator_core::repository::ProjectRepository;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, new: NewProject) -> Result<Project> {
        if new.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = StatusLabel::new("planning");

        let row = sqlx::query(
            r#"
            INSERT INTO projects (id, name, summary, status, priority, tags, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, summary, status, priority, tags, created_at, modified_at
            "#,
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.summary)
        .bind(status.as_internal())
        .bind(bind_priority(new.priority))
        .bind(tags_to_json(&new.tags))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_project(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Project> {
        let row = sqlx::query(
            "SELECT id, name, summary, status, priority, tags, created_at, modified_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?
        .ok_or_else(|| OrchestratorError::not_found("project", id))?;

        row_to_project(&row)
    }

    async fn update(&self, id: Uuid, patch: UpdateProject) -> Result<Project> {
        self.get(id).await?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE projects SET ");
        let mut any = false;

        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(OrchestratorError::empty_field("name"));
            }
            builder.push("name = ").push_bind(name.clone());
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

    async fn set_status(&self, id: Uuid, status: StatusLabel) -> Result<Project> {
        self.get(id).await?;
        sqlx::query("UPDATE projects SET status = ?, modified_at = ? WHERE id = ?")
            .bind(status.as_internal())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("project", id));
        }
        Ok(())
    }

    async fn list(&self, filter: EntityFilter) -> Result<Vec<Project>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, name, summary, status, priority, tags, created_at, modified_at FROM projects",
        );
        let mut any = false;

        if let Some(status) = &filter.status {
            builder.push(" WHERE status = ").push_bind(status.as_internal().to_string());
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

        rows.iter().map(row_to_project).collect()
    }
}
