//! Core domain entities for the task orchestration engine.
//!
//! Statuses are configuration-driven labels (see [`crate::config`]), not a
//! fixed Rust enum — the same five-role model and validator logic must serve
//! whatever status set a deployment's `config.yaml` declares. [`StatusLabel`]
//! carries the boundary-conversion rule: wire
//! representation is lowercase-with-hyphens, the internal representation is
//! uppercase-with-underscores. The conversion happens exactly once on parse
//! and once on emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A status label, normalized internally to `UPPER_SNAKE_CASE`.
///
/// `Serialize`/`Deserialize` operate on the wire form
/// (`lowercase-with-hyphens`); everything else in the engine compares and
/// stores the internal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusLabel(String);

impl StatusLabel {
    /// Construct from a wire-form or already-internal string; normalizes
    /// either way since the two forms only differ in case and separator.
    pub fn new(s: impl AsRef<str>) -> Self {
        StatusLabel(to_internal(s.as_ref()))
    }

    pub fn as_internal(&self) -> &str {
        &self.0
    }

    pub fn to_wire(&self) -> String {
        to_wire(&self.0)
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

impl From<&str> for StatusLabel {
    fn from(s: &str) -> Self {
        StatusLabel::new(s)
    }
}

impl From<String> for StatusLabel {
    fn from(s: String) -> Self {
        StatusLabel::new(s)
    }
}

impl Serialize for StatusLabel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for StatusLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(StatusLabel::new(s))
    }
}

fn to_internal(s: &str) -> String {
    s.trim().to_uppercase().replace(['-', ' '], "_")
}

fn to_wire(s: &str) -> String {
    s.trim().to_lowercase().replace(['_', ' '], "-")
}

/// Entity kind, used to key into per-kind configuration sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Feature,
    Task,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => write!(f, "project"),
            EntityKind::Feature => write!(f, "feature"),
            EntityKind::Task => write!(f, "task"),
        }
    }
}

/// Entity type as attached to a [`Section`] — includes the template
/// pseudo-entity kind that sections can also target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SectionEntityType {
    Project,
    Feature,
    Task,
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Root container entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub summary: String,
    pub status: StatusLabel,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Data needed to create a new project; server assigns id/timestamps/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
}

/// Mid-level grouping; may be standalone (`project_id = None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub summary: String,
    pub status: StatusLabel,
    pub priority: Priority,
    pub tags: Vec<String>,
    /// When set, the feature must reach at least the review role before a
    /// terminal transition is allowed to complete it.
    pub requires_verification: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeature {
    pub project_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requires_verification: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFeature {
    pub project_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub requires_verification: Option<bool>,
}

/// Leaf unit of work; may belong to a feature or be standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub feature_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    /// Agent-written; validated to 300-500 chars by the prerequisite
    /// validator before a task may reach `completed`.
    pub summary: Option<String>,
    pub status: StatusLabel,
    pub priority: Priority,
    pub complexity: i32,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub feature_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_complexity")]
    pub complexity: i32,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_complexity() -> i32 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub feature_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub priority: Option<Priority>,
    pub complexity: Option<i32>,
    pub tags: Option<Vec<String>>,
}

/// Ordered documentation fragment attached to any entity (or a template).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub entity_type: SectionEntityType,
    pub entity_id: Uuid,
    pub title: String,
    pub usage_description: String,
    pub content: String,
    pub ordinal: i32,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Monotonic; incremented on every write. Used for optimistic
    /// concurrency in `bulkUpdateText`.
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSection {
    pub entity_type: SectionEntityType,
    pub entity_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub usage_description: String,
    #[serde(default)]
    pub content: String,
    pub ordinal: i32,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSectionText {
    pub id: Uuid,
    pub content: String,
    /// Expected current version; mismatch yields `ConflictError`.
    pub expected_version: i64,
}

/// Typed directed edge between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    Blocks,
    IsBlockedBy,
    RelatesTo,
}

impl DependencyType {
    /// Whether this edge type participates in cycle detection / blocker
    /// resolution. `RelatesTo` is informational only.
    pub fn is_blocking(self) -> bool {
        !matches!(self, DependencyType::RelatesTo)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Uuid,
    pub from_task_id: Uuid,
    pub to_task_id: Uuid,
    pub dependency_type: DependencyType,
    /// Role name at or beyond which the blocker satisfies this edge. Never
    /// set on `RelatesTo` edges (invariant 8).
    pub unblock_at: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDependency {
    pub from_task_id: Uuid,
    pub to_task_id: Uuid,
    pub dependency_type: DependencyType,
    pub unblock_at: Option<String>,
}

/// Append-only audit record of a *role* change (written iff `from_role !=
/// to_role`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTransition {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: EntityKind,
    pub from_role: String,
    pub to_role: String,
    pub from_status: StatusLabel,
    pub to_status: StatusLabel,
    pub transitioned_at: DateTime<Utc>,
    pub trigger: Option<String>,
    pub summary: Option<String>,
}

/// Free-form AND filter used by `findByFilters` across entity repositories.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub status: Option<StatusLabel>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
