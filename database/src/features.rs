use crate::common::{bind_priority, row_to_feature, sqlx_error_to_orchestrator_error, tags_to_json};
use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{EntityFilter, Feature, NewFeature, StatusLabel, UpdateFeature};
use orchestrator_core::repository::FeatureRepository;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const COLUMNS: &str =
    "id, project_id, name, summary, status, priority, tags, requires_verification, created_at, modified_at";

#[derive(Clone)]
pub struct SqliteFeatureRepository {
    pool: SqlitePool,
}

impl SqliteFeatureRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeatureRepository for SqliteFeatureRepository {
    async fn create(&self, new: NewFeature) -> Result<Feature> {
        if new.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = StatusLabel::new("draft");

        let row = sqlx::query(&format!(
            "INSERT INTO features (id, project_id, name, summary, status, priority, tags, requires_verification, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(new.project_id)
        .bind(&new.name)
        .bind(&new.summary)
        .bind(status.as_internal())
        .bind(bind_priority(new.priority))
        .bind(tags_to_json(&new.tags))
        .bind(new.requires_verification as i64)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_feature(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Feature> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM features WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?
            .ok_or_else(|| OrchestratorError::not_found("feature", id))?;

        row_to_feature(&row)
    }

    async fn update(&self, id: Uuid, patch: UpdateFeature) -> Result<Feature> {
        self.get(id).await?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE features SET ");
        let mut any = false;

        if let Some(project_id) = patch.project_id {
            builder.push("project_id = ").push_bind(project_id);
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
        if let Some(requires_verification) = patch.requires_verification {
            if any {
                builder.push(", ");
            }
            builder
                .push("requires_verification = ")
                .push_bind(requires_verification as i64);
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

    async fn set_status(&self, id: Uuid, status: StatusLabel) -> Result<Feature> {
        self.get(id).await?;
        sqlx::query("UPDATE features SET status = ?, modified_at = ? WHERE id = ?")
            .bind(status.as_internal())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM features WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("feature", id));
        }
        Ok(())
    }

    async fn list(&self, filter: EntityFilter) -> Result<Vec<Feature>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM features"));
        let mut any = false;

        if let Some(parent_id) = filter.parent_id {
            builder.push(" WHERE project_id ");
            match parent_id {
                Some(pid) => {
                    builder.push("= ").push_bind(pid);
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

        rows.iter().map(row_to_feature).collect()
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Feature>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM features WHERE project_id = ? ORDER BY created_at ASC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_feature).collect()
    }
}
