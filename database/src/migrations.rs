//! Embedded, versioned migrations tracked in a `schema_history` table.
//!
//! Runtime-applied rather than `sqlx::migrate!`'s compile-time directory scan
//! so the crate has no dependency on migration files existing at build time.

use orchestrator_core::error::{OrchestratorError, Result};
use sqlx::SqlitePool;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create projects, features, tasks",
        sql: r#"
            CREATE TABLE projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'medium',
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            );

            CREATE TABLE features (
                id TEXT PRIMARY KEY,
                project_id TEXT REFERENCES projects(id) ON DELETE SET NULL,
                name TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'medium',
                tags TEXT NOT NULL DEFAULT '[]',
                requires_verification INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            );
            CREATE INDEX idx_features_project_id ON features(project_id);

            CREATE TABLE tasks (
                id TEXT PRIMARY KEY,
                feature_id TEXT REFERENCES features(id) ON DELETE SET NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                summary TEXT,
                status TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'medium',
                complexity INTEGER NOT NULL DEFAULT 5,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            );
            CREATE INDEX idx_tasks_feature_id ON tasks(feature_id);
            CREATE INDEX idx_tasks_status ON tasks(status);
        "#,
    },
    Migration {
        version: 2,
        description: "create sections, dependencies, role_transitions",
        sql: r#"
            CREATE TABLE sections (
                id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                title TEXT NOT NULL,
                usage_description TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                ordinal INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX idx_sections_entity ON sections(entity_type, entity_id);

            CREATE TABLE dependencies (
                id TEXT PRIMARY KEY,
                from_task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                to_task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                dependency_type TEXT NOT NULL,
                unblock_at TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(from_task_id, to_task_id, dependency_type)
            );
            CREATE INDEX idx_dependencies_from ON dependencies(from_task_id);
            CREATE INDEX idx_dependencies_to ON dependencies(to_task_id);

            CREATE TABLE role_transitions (
                id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                from_role TEXT NOT NULL,
                to_role TEXT NOT NULL,
                from_status TEXT NOT NULL,
                to_status TEXT NOT NULL,
                transitioned_at TEXT NOT NULL,
                trigger TEXT,
                summary TEXT
            );
            CREATE INDEX idx_role_transitions_entity ON role_transitions(entity_id);
        "#,
    },
];

pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_history (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| OrchestratorError::Database(format!("failed to create schema_history: {e}")))?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_history ORDER BY version")
        .fetch_all(pool)
        .await
        .map_err(|e| OrchestratorError::Database(format!("failed to read schema_history: {e}")))?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| OrchestratorError::Database(format!("failed to start migration tx: {e}")))?;

        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                OrchestratorError::Database(format!(
                    "migration {} ({}) failed: {e}",
                    migration.version, migration.description
                ))
            })?;

        sqlx::query(
            "INSERT INTO schema_history (version, description, applied_at) VALUES (?, ?, ?)",
        )
        .bind(migration.version)
        .bind(migration.description)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| OrchestratorError::Database(format!("failed to record migration: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| OrchestratorError::Database(format!("failed to commit migration: {e}")))?;

        tracing::info!(version = migration.version, "applied migration");
    }

    Ok(())
}
