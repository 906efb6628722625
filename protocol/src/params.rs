//! Deserialized argument shapes for each tool. Kept separate from the
//! dispatcher so the wire shape of a tool call is visible at a glance.

use orchestrator_core::models::{DependencyType, EntityKind, Priority, SectionEntityType};
use serde::Deserialize;
use uuid::Uuid;

fn parse_priority(s: Option<&str>) -> Priority {
    match s {
        Some("low") => Priority::Low,
        Some("high") => Priority::High,
        _ => Priority::Medium,
    }
}

pub fn parse_kind(s: &str) -> Option<EntityKind> {
    match s {
        "project" => Some(EntityKind::Project),
        "feature" => Some(EntityKind::Feature),
        "task" => Some(EntityKind::Task),
        _ => None,
    }
}

pub fn parse_section_entity_type(s: &str) -> Option<SectionEntityType> {
    match s {
        "project" | "PROJECT" => Some(SectionEntityType::Project),
        "feature" | "FEATURE" => Some(SectionEntityType::Feature),
        "task" | "TASK" => Some(SectionEntityType::Task),
        "template" | "TEMPLATE" => Some(SectionEntityType::Template),
        _ => None,
    }
}

pub fn parse_dependency_type(s: &str) -> Option<DependencyType> {
    match s.to_uppercase().as_str() {
        "BLOCKS" => Some(DependencyType::Blocks),
        "IS_BLOCKED_BY" => Some(DependencyType::IsBlockedBy),
        "RELATES_TO" => Some(DependencyType::RelatesTo),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct ManageContainerParams {
    pub action: String,
    pub kind: String,
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub feature_id: Option<Uuid>,
    #[serde(default)]
    pub requires_verification: Option<bool>,
    #[serde(default)]
    pub complexity: Option<i32>,
    #[serde(default)]
    pub summary_text: Option<String>,
}

impl ManageContainerParams {
    pub fn priority(&self) -> Priority {
        parse_priority(self.priority.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryContainerParams {
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub include_standalone: bool,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ManageSectionsParams {
    pub action: String,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub usage_description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub ordinal: Option<i32>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub expected_version: Option<i64>,
    /// Sections to create in one call, for the `bulk_create` action.
    #[serde(default)]
    pub items: Option<Vec<SectionItemParams>>,
}

#[derive(Debug, Deserialize)]
pub struct SectionItemParams {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub usage_description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub ordinal: Option<i32>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ManageDependenciesParams {
    pub action: String,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub from_task_id: Option<Uuid>,
    #[serde(default)]
    pub to_task_id: Option<Uuid>,
    #[serde(default)]
    pub dependency_type: Option<String>,
    #[serde(default)]
    pub unblock_at: Option<String>,
    /// Task to list blocking/related edges for, under the `list` action.
    #[serde(default)]
    pub task_id: Option<Uuid>,
    /// `linear` | `fan_out` | `fan_in`, under the `create_pattern` action.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Ordered task ids the pattern is built over.
    #[serde(default)]
    pub task_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct QueryDependenciesParams {
    pub task_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct GetBlockedTasksParams {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GetNextTaskParams {
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetNextStatusParams {
    pub kind: String,
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RequestTransitionParams {
    pub kind: String,
    pub id: Uuid,
    pub target_status: String,
    #[serde(default)]
    pub trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestTransitionBatchParams {
    pub requests: Vec<RequestTransitionParams>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRoleTransitionsParams {
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct ListTagsParams {
    #[serde(default)]
    pub kind: Option<String>,
}
