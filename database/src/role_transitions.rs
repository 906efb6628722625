use crate::common::{row_to_role_transition, sqlx_error_to_orchestrator_error};
use crate::common::bind_entity_kind;
use async_trait::async_trait;
use orchestrator_core::error::Result;
use orchestrator_core::models::{EntityKind, RoleTransition};
use orchestrator_core::repository::{Page, RoleTransitionRepository};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const COLUMNS: &str =
    "id, entity_id, entity_type, from_role, to_role, from_status, to_status, transitioned_at, trigger, summary";

#[derive(Clone)]
pub struct SqliteRoleTransitionRepository {
    pool: SqlitePool,
}

impl SqliteRoleTransitionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleTransitionRepository for SqliteRoleTransitionRepository {
    async fn record(&self, transition: RoleTransition) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO role_transitions ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(transition.id)
        .bind(transition.entity_id)
        .bind(bind_entity_kind(transition.entity_type))
        .bind(&transition.from_role)
        .bind(&transition.to_role)
        .bind(transition.from_status.as_internal())
        .bind(transition.to_status.as_internal())
        .bind(transition.transitioned_at)
        .bind(&transition.trigger)
        .bind(&transition.summary)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn query(
        &self,
        entity_id: Option<Uuid>,
        entity_type: Option<EntityKind>,
        limit: u32,
        offset: u32,
    ) -> Result<Page<RoleTransition>> {
        let mut count_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM role_transitions");
        let mut rows_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM role_transitions"));
        let mut any = false;

        for builder in [&mut count_builder, &mut rows_builder] {
            any = false;
            if let Some(id) = entity_id {
                builder.push(" WHERE entity_id = ").push_bind(id);
                any = true;
            }
            if let Some(kind) = entity_type {
                builder.push(if any { " AND " } else { " WHERE " });
                builder.push("entity_type = ").push_bind(bind_entity_kind(kind));
            }
        }

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        rows_builder.push(" ORDER BY transitioned_at DESC");
        rows_builder.push(" LIMIT ").push_bind(limit as i64);
        rows_builder.push(" OFFSET ").push_bind(offset as i64);

        let rows = rows_builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        let items = rows
            .iter()
            .map(row_to_role_transition)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page { items, total })
    }
}
