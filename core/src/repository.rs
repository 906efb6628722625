//! Storage-agnostic repository traits. The `database` crate
//! provides the SQLite implementations; engine logic in this crate only
//! ever depends on these traits, never on a concrete backend.

use crate::error::Result;
use crate::models::{
    Dependency, EntityFilter, EntityKind, Feature, NewDependency, NewFeature, NewProject,
    NewSection, NewTask, Project, RoleTransition, Section, StatusLabel, Task, UpdateFeature,
    UpdateProject, UpdateSectionText, UpdateTask,
};
use async_trait::async_trait;
use uuid::Uuid;

/// A page of results plus the total row count matching the filter, ignoring
/// `limit`/`offset` (`query_role_transitions`
/// pagination and friends).
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Aggregate counts surfaced by `health_check` and admin tooling.
#[derive(Debug, Clone, Default)]
pub struct RepositoryStats {
    pub project_count: i64,
    pub feature_count: i64,
    pub task_count: i64,
    pub dependency_count: i64,
    pub counts_by_status: Vec<(String, i64)>,
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, new: NewProject) -> Result<Project>;
    async fn get(&self, id: Uuid) -> Result<Project>;
    async fn update(&self, id: Uuid, patch: UpdateProject) -> Result<Project>;
    async fn set_status(&self, id: Uuid, status: StatusLabel) -> Result<Project>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn list(&self, filter: EntityFilter) -> Result<Vec<Project>>;
}

#[async_trait]
pub trait FeatureRepository: Send + Sync {
    async fn create(&self, new: NewFeature) -> Result<Feature>;
    async fn get(&self, id: Uuid) -> Result<Feature>;
    async fn update(&self, id: Uuid, patch: UpdateFeature) -> Result<Feature>;
    async fn set_status(&self, id: Uuid, status: StatusLabel) -> Result<Feature>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn list(&self, filter: EntityFilter) -> Result<Vec<Feature>>;
    /// Features belonging to a project, for cascade rollup checks.
    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Feature>>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, new: NewTask) -> Result<Task>;
    async fn get(&self, id: Uuid) -> Result<Task>;
    async fn update(&self, id: Uuid, patch: UpdateTask) -> Result<Task>;
    async fn set_status(&self, id: Uuid, status: StatusLabel) -> Result<Task>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn list(&self, filter: EntityFilter) -> Result<Vec<Task>>;
    /// Tasks belonging to a feature, for cascade rollup checks.
    async fn list_by_feature(&self, feature_id: Uuid) -> Result<Vec<Task>>;
    /// Non-terminal tasks ordered by priority (desc) then age (asc), as a
    /// candidate pool for `get_next_task`. Callers still need to run the
    /// dependency graph over the result to find the first actually
    /// eligible one — this only applies the cheap, SQL-pushdownable part
    /// of the filter.
    async fn list_unblocked_candidates(&self, limit: u32) -> Result<Vec<Task>>;
    async fn stats(&self) -> Result<RepositoryStats>;
}

#[async_trait]
pub trait SectionRepository: Send + Sync {
    async fn create(&self, new: NewSection) -> Result<Section>;
    /// Creates every section in one call. Used by the cleanup hook and by
    /// callers seeding several sections at once; failures mid-batch leave
    /// no partial rows when the backend supports transactions.
    async fn bulk_create(&self, news: Vec<NewSection>) -> Result<Vec<Section>>;
    async fn get(&self, id: Uuid) -> Result<Section>;
    async fn list_for_entity(
        &self,
        entity_type: crate::models::SectionEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Section>>;
    /// Sections carrying at least one of `tags` (OR-match), across all
    /// entities.
    async fn list_by_tags(&self, tags: &[String]) -> Result<Vec<Section>>;
    /// Optimistic-concurrency text update; fails with `Conflict` when
    /// `expected_version` no longer matches the stored row.
    async fn update_text(&self, patch: UpdateSectionText) -> Result<Section>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait DependencyRepository: Send + Sync {
    async fn create(&self, new: NewDependency) -> Result<Dependency>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Every blocking or related edge touching `task_id`, in either
    /// direction, for cycle detection and blocker resolution.
    async fn list_for_task(&self, task_id: Uuid) -> Result<Vec<Dependency>>;
    /// The full blocking-edge set, for graph-wide cycle detection.
    async fn list_all_blocking(&self) -> Result<Vec<Dependency>>;
}

#[async_trait]
pub trait RoleTransitionRepository: Send + Sync {
    async fn record(&self, transition: RoleTransition) -> Result<()>;
    async fn query(
        &self,
        entity_id: Option<Uuid>,
        entity_type: Option<EntityKind>,
        limit: u32,
        offset: u32,
    ) -> Result<Page<RoleTransition>>;
}
