use crate::common::{
    bind_section_entity_type, row_to_section, sqlx_error_to_orchestrator_error, tags_to_json,
};
use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{NewSection, Section, SectionEntityType, UpdateSectionText};
use orchestrator_core::repository::SectionRepository;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const COLUMNS: &str =
    "id, entity_type, entity_id, title, usage_description, content, ordinal, tags, created_at, modified_at, version";

#[derive(Clone)]
pub struct SqliteSectionRepository {
    pool: SqlitePool,
}

impl SqliteSectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SectionRepository for SqliteSectionRepository {
    async fn create(&self, new: NewSection) -> Result<Section> {
        if new.title.trim().is_empty() {
            return Err(OrchestratorError::empty_field("title"));
        }
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO sections (id, entity_type, entity_id, title, usage_description, content, ordinal, tags, created_at, modified_at, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(bind_section_entity_type(new.entity_type))
        .bind(new.entity_id)
        .bind(&new.title)
        .bind(&new.usage_description)
        .bind(&new.content)
        .bind(new.ordinal as i64)
        .bind(tags_to_json(&new.tags))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        row_to_section(&row)
    }

    async fn bulk_create(&self, news: Vec<NewSection>) -> Result<Vec<Section>> {
        if news.iter().any(|n| n.title.trim().is_empty()) {
            return Err(OrchestratorError::empty_field("title"));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        let mut created = Vec::with_capacity(news.len());
        for new in news {
            let id = Uuid::new_v4();
            let now = Utc::now();
            let row = sqlx::query(&format!(
                "INSERT INTO sections (id, entity_type, entity_id, title, usage_description, content, ordinal, tags, created_at, modified_at, version)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
                 RETURNING {COLUMNS}"
            ))
            .bind(id)
            .bind(bind_section_entity_type(new.entity_type))
            .bind(new.entity_id)
            .bind(&new.title)
            .bind(&new.usage_description)
            .bind(&new.content)
            .bind(new.ordinal as i64)
            .bind(tags_to_json(&new.tags))
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

            created.push(row_to_section(&row)?);
        }

        tx.commit().await.map_err(sqlx_error_to_orchestrator_error)?;
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Section> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM sections WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?
            .ok_or_else(|| OrchestratorError::not_found("section", id))?;

        row_to_section(&row)
    }

    async fn list_for_entity(
        &self,
        entity_type: SectionEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Section>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM sections WHERE entity_type = ? AND entity_id = ? ORDER BY ordinal ASC"
        ))
        .bind(bind_section_entity_type(entity_type))
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_section).collect()
    }

    async fn list_by_tags(&self, tags: &[String]) -> Result<Vec<Section>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM sections WHERE "));
        for (i, tag) in tags.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push("tags LIKE ").push_bind(format!("%\"{tag}\"%"));
        }
        builder.push(" ORDER BY created_at DESC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        rows.iter().map(row_to_section).collect()
    }

    async fn update_text(&self, patch: UpdateSectionText) -> Result<Section> {
        let current = self.get(patch.id).await?;
        if current.version != patch.expected_version {
            return Err(OrchestratorError::Conflict(format!(
                "section {} has version {} but update expected version {}",
                patch.id, current.version, patch.expected_version
            )));
        }

        let result = sqlx::query(
            "UPDATE sections SET content = ?, version = version + 1, modified_at = ? WHERE id = ? AND version = ?",
        )
        .bind(&patch.content)
        .bind(Utc::now())
        .bind(patch.id)
        .bind(patch.expected_version)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::Conflict(format!(
                "section {} was modified concurrently",
                patch.id
            )));
        }

        self.get(patch.id).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM sections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("section", id));
        }
        Ok(())
    }
}
