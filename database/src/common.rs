//! Row mapping and error conversion shared by every per-entity repository.

use chrono::{DateTime, Utc};
use orchestrator_core::error::OrchestratorError;
use orchestrator_core::models::{
    Dependency, DependencyType, EntityKind, Feature, Priority, Project, RoleTransition, Section,
    SectionEntityType, StatusLabel, Task,
};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

pub fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

pub fn json_to_tags(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn priority_to_str(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

fn str_to_priority(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium,
    }
}

pub fn bind_priority(p: Priority) -> &'static str {
    priority_to_str(p)
}

fn entity_kind_to_str(k: EntityKind) -> &'static str {
    match k {
        EntityKind::Project => "project",
        EntityKind::Feature => "feature",
        EntityKind::Task => "task",
    }
}

fn str_to_entity_kind(s: &str) -> Result<EntityKind, OrchestratorError> {
    match s {
        "project" => Ok(EntityKind::Project),
        "feature" => Ok(EntityKind::Feature),
        "task" => Ok(EntityKind::Task),
        other => Err(OrchestratorError::Database(format!(
            "unknown entity kind in database: {other}"
        ))),
    }
}

pub fn bind_entity_kind(k: EntityKind) -> &'static str {
    entity_kind_to_str(k)
}

fn section_entity_type_to_str(t: SectionEntityType) -> &'static str {
    match t {
        SectionEntityType::Project => "PROJECT",
        SectionEntityType::Feature => "FEATURE",
        SectionEntityType::Task => "TASK",
        SectionEntityType::Template => "TEMPLATE",
    }
}

fn str_to_section_entity_type(s: &str) -> Result<SectionEntityType, OrchestratorError> {
    match s {
        "PROJECT" => Ok(SectionEntityType::Project),
        "FEATURE" => Ok(SectionEntityType::Feature),
        "TASK" => Ok(SectionEntityType::Task),
        "TEMPLATE" => Ok(SectionEntityType::Template),
        other => Err(OrchestratorError::Database(format!(
            "unknown section entity type in database: {other}"
        ))),
    }
}

pub fn bind_section_entity_type(t: SectionEntityType) -> &'static str {
    section_entity_type_to_str(t)
}

fn dependency_type_to_str(t: DependencyType) -> &'static str {
    match t {
        DependencyType::Blocks => "BLOCKS",
        DependencyType::IsBlockedBy => "IS_BLOCKED_BY",
        DependencyType::RelatesTo => "RELATES_TO",
    }
}

fn str_to_dependency_type(s: &str) -> Result<DependencyType, OrchestratorError> {
    match s {
        "BLOCKS" => Ok(DependencyType::Blocks),
        "IS_BLOCKED_BY" => Ok(DependencyType::IsBlockedBy),
        "RELATES_TO" => Ok(DependencyType::RelatesTo),
        other => Err(OrchestratorError::Database(format!(
            "unknown dependency type in database: {other}"
        ))),
    }
}

pub fn bind_dependency_type(t: DependencyType) -> &'static str {
    dependency_type_to_str(t)
}

pub fn row_to_project(row: &SqliteRow) -> Result<Project, OrchestratorError> {
    let id: Uuid = row.get("id");
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    let tags: String = row.get("tags");
    Ok(Project {
        id,
        name: row.get("name"),
        summary: row.get("summary"),
        status: StatusLabel::new(status),
        priority: str_to_priority(&priority),
        tags: json_to_tags(&tags),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        modified_at: row.get::<DateTime<Utc>, _>("modified_at"),
    })
}

pub fn row_to_feature(row: &SqliteRow) -> Result<Feature, OrchestratorError> {
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    let tags: String = row.get("tags");
    Ok(Feature {
        id: row.get("id"),
        project_id: row.get::<Option<Uuid>, _>("project_id"),
        name: row.get("name"),
        summary: row.get("summary"),
        status: StatusLabel::new(status),
        priority: str_to_priority(&priority),
        tags: json_to_tags(&tags),
        requires_verification: row.get::<i64, _>("requires_verification") != 0,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        modified_at: row.get::<DateTime<Utc>, _>("modified_at"),
    })
}

pub fn row_to_task(row: &SqliteRow) -> Result<Task, OrchestratorError> {
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    let tags: String = row.get("tags");
    Ok(Task {
        id: row.get("id"),
        feature_id: row.get::<Option<Uuid>, _>("feature_id"),
        name: row.get("name"),
        description: row.get("description"),
        summary: row.get::<Option<String>, _>("summary"),
        status: StatusLabel::new(status),
        priority: str_to_priority(&priority),
        complexity: row.get::<i64, _>("complexity") as i32,
        tags: json_to_tags(&tags),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        modified_at: row.get::<DateTime<Utc>, _>("modified_at"),
    })
}

pub fn row_to_section(row: &SqliteRow) -> Result<Section, OrchestratorError> {
    let entity_type: String = row.get("entity_type");
    let tags: String = row.get("tags");
    Ok(Section {
        id: row.get("id"),
        entity_type: str_to_section_entity_type(&entity_type)?,
        entity_id: row.get("entity_id"),
        title: row.get("title"),
        usage_description: row.get("usage_description"),
        content: row.get("content"),
        ordinal: row.get::<i64, _>("ordinal") as i32,
        tags: json_to_tags(&tags),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        modified_at: row.get::<DateTime<Utc>, _>("modified_at"),
        version: row.get("version"),
    })
}

pub fn row_to_dependency(row: &SqliteRow) -> Result<Dependency, OrchestratorError> {
    let dependency_type: String = row.get("dependency_type");
    Ok(Dependency {
        id: row.get("id"),
        from_task_id: row.get("from_task_id"),
        to_task_id: row.get("to_task_id"),
        dependency_type: str_to_dependency_type(&dependency_type)?,
        unblock_at: row.get::<Option<String>, _>("unblock_at"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

pub fn row_to_role_transition(row: &SqliteRow) -> Result<RoleTransition, OrchestratorError> {
    let entity_type: String = row.get("entity_type");
    let from_status: String = row.get("from_status");
    let to_status: String = row.get("to_status");
    Ok(RoleTransition {
        id: row.get("id"),
        entity_id: row.get("entity_id"),
        entity_type: str_to_entity_kind(&entity_type)?,
        from_role: row.get("from_role"),
        to_role: row.get("to_role"),
        from_status: StatusLabel::new(from_status),
        to_status: StatusLabel::new(to_status),
        transitioned_at: row.get::<DateTime<Utc>, _>("transitioned_at"),
        trigger: row.get::<Option<String>, _>("trigger"),
        summary: row.get::<Option<String>, _>("summary"),
    })
}

/// Maps a raw `sqlx::Error` onto the engine's error taxonomy. Callers that
/// need to distinguish "no such row" from a real database failure should
/// check for `sqlx::Error::RowNotFound` before calling this.
pub fn sqlx_error_to_orchestrator_error(err: sqlx::Error) -> OrchestratorError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed") {
                OrchestratorError::Conflict(format!("unique constraint violated: {message}"))
            } else if message.contains("FOREIGN KEY constraint failed") {
                OrchestratorError::Validation(format!("referenced row does not exist: {message}"))
            } else {
                OrchestratorError::Database(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::RowNotFound => {
            OrchestratorError::Database("unexpected RowNotFound".to_string())
        }
        sqlx::Error::PoolTimedOut => OrchestratorError::Database("connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => OrchestratorError::Database(format!("database I/O error: {io_err}")),
        _ => OrchestratorError::Database(format!("database operation failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip_through_json() {
        let tags = vec!["bug".to_string(), "critical".to_string()];
        let json = tags_to_json(&tags);
        assert_eq!(json_to_tags(&json), tags);
    }

    #[test]
    fn empty_tags_json_parses_to_empty_vec() {
        assert!(json_to_tags("not json").is_empty());
    }
}
