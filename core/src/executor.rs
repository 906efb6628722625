//! Transition executor: validates a requested status change, checks the
//! dependency and prerequisite gates, commits it, records the role-transition
//! audit row when the role itself moved, runs feature-completion cleanup,
//! then walks cascades (parent rollup, downstream unblock detection) up to
//! the configured depth.

use crate::cascade::{all_children_terminal, detect_downstream_unblocks, rollup_target, CascadeBudget, CascadeEvent};
use crate::cleanup::{self, CleanupOutcome};
use crate::config::WorkflowConfig;
use crate::error::{OrchestratorError, Result};
use crate::graph::{blockers_of, directly_blocks, is_blocked};
use crate::models::{EntityKind, RoleTransition, SectionEntityType, StatusLabel};
use crate::progression;
use crate::repository::{
    DependencyRepository, FeatureRepository, ProjectRepository, RoleTransitionRepository,
    SectionRepository, TaskRepository,
};
use crate::role::Role;
use crate::validator::{
    validate_feature_completion_prerequisites, validate_task_completion_prerequisites, Validation,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One requested status change, either standalone or as part of a batch.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub target_status: String,
    pub trigger: Option<String>,
}

/// A parent-rollup cascade that was actually applied (as opposed to merely
/// detected), including anything it in turn triggered.
#[derive(Debug, Clone)]
pub struct AppliedCascade {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub to_status: String,
    pub cleanup: Option<CleanupOutcome>,
    pub child_cascades: Vec<AppliedCascade>,
}

/// Outcome of a successfully applied transition.
///
/// `cascade_events` and `unblocked_tasks` are always fully computed,
/// independent of whether auto-cascade is enabled — only `applied_cascades`
/// (the recursive application of a detected rollup) is gated on cascade
/// budget.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub role_changed: bool,
    pub previous_role: Option<Role>,
    pub new_role: Option<Role>,
    pub active_flow: String,
    pub flow_sequence: Vec<String>,
    pub flow_position: Option<usize>,
    pub unblocked_tasks: Vec<Uuid>,
    pub cascade_events: Vec<CascadeEvent>,
    pub applied_cascades: Vec<AppliedCascade>,
    pub cleanup: Option<CleanupOutcome>,
}

pub struct TransitionExecutor {
    config: WorkflowConfig,
    projects: Arc<dyn ProjectRepository>,
    features: Arc<dyn FeatureRepository>,
    tasks: Arc<dyn TaskRepository>,
    sections: Arc<dyn SectionRepository>,
    dependencies: Arc<dyn DependencyRepository>,
    role_transitions: Arc<dyn RoleTransitionRepository>,
}

impl TransitionExecutor {
    pub fn new(
        config: WorkflowConfig,
        projects: Arc<dyn ProjectRepository>,
        features: Arc<dyn FeatureRepository>,
        tasks: Arc<dyn TaskRepository>,
        sections: Arc<dyn SectionRepository>,
        dependencies: Arc<dyn DependencyRepository>,
        role_transitions: Arc<dyn RoleTransitionRepository>,
    ) -> Self {
        Self {
            config,
            projects,
            features,
            tasks,
            sections,
            dependencies,
            role_transitions,
        }
    }

    pub async fn request_transition(&self, req: TransitionRequest) -> Result<TransitionOutcome> {
        let budget = CascadeBudget::new(&self.config);
        self.request_transition_inner(req, budget).await
    }

    /// Applies each request independently; one failure doesn't abort the
    /// rest of the batch.
    pub async fn request_transition_batch(
        &self,
        reqs: Vec<TransitionRequest>,
    ) -> Vec<Result<TransitionOutcome>> {
        let mut out = Vec::with_capacity(reqs.len());
        for req in reqs {
            out.push(self.request_transition(req).await);
        }
        out
    }

    async fn request_transition_inner(
        &self,
        req: TransitionRequest,
        budget: CascadeBudget,
    ) -> Result<TransitionOutcome> {
        let cfg = self.config.for_kind(req.entity_kind).clone();
        let target = StatusLabel::new(&req.target_status);

        let (current_status, tags): (StatusLabel, Vec<String>) = match req.entity_kind {
            EntityKind::Project => {
                let p = self.projects.get(req.entity_id).await?;
                (p.status, p.tags)
            }
            EntityKind::Feature => {
                let f = self.features.get(req.entity_id).await?;
                (f.status, f.tags)
            }
            EntityKind::Task => {
                let t = self.tasks.get(req.entity_id).await?;
                (t.status, t.tags)
            }
        };

        let validation = progression::validate_transition(
            &cfg,
            &self.config.status_validation,
            &current_status.to_wire(),
            &target.to_wire(),
            &tags,
        );
        if let Validation::Invalid { reason, .. } = validation {
            return Err(OrchestratorError::Validation(reason));
        }

        let from_role = cfg.role_of(&current_status.to_wire());
        let to_role = cfg.role_of(&target.to_wire());
        let role_changed = from_role != to_role;

        if self.config.status_validation.validate_prerequisites {
            if req.entity_kind == EntityKind::Task && to_role == Some(Role::Work) {
                self.check_blocker_gate(req.entity_id).await?;
            }
            if let Some(role) = to_role {
                self.check_completion_prerequisites(req.entity_kind, req.entity_id, &cfg, role)
                    .await?;
            }
        }

        self.commit_status(req.entity_kind, req.entity_id, target.clone())
            .await?;

        if role_changed {
            let transition = RoleTransition {
                id: Uuid::new_v4(),
                entity_id: req.entity_id,
                entity_type: req.entity_kind,
                from_role: from_role.map(|r| r.to_string()).unwrap_or_default(),
                to_role: to_role.map(|r| r.to_string()).unwrap_or_default(),
                from_status: current_status.clone(),
                to_status: target.clone(),
                transitioned_at: chrono::Utc::now(),
                trigger: req.trigger.clone(),
                summary: None,
            };
            self.role_transitions.record(transition).await?;
        }

        let cleanup = if req.entity_kind == EntityKind::Feature && to_role == Some(Role::Terminal) {
            Some(self.run_completion_cleanup(req.entity_id).await?)
        } else {
            None
        };

        // Always computed, regardless of cascade budget: callers need to see
        // what *would* ripple even when auto-cascade is disabled.
        let unblocked_tasks = if req.entity_kind == EntityKind::Task {
            self.detect_task_downstream_unblocks(req.entity_id).await?
        } else {
            Vec::new()
        };

        let rollup_candidate = if to_role == Some(Role::Terminal) {
            self.detect_parent_rollup_candidate(req.entity_kind, req.entity_id)
                .await?
        } else {
            None
        };
        let cascade_events: Vec<CascadeEvent> = rollup_candidate.clone().into_iter().collect();

        // Only the recursive application is gated by cascade budget.
        let mut applied_cascades = Vec::new();
        if budget.has_budget() {
            if let Some(candidate) = rollup_candidate {
                if let Some(applied) = self.apply_parent_rollup(candidate, budget.consume()).await? {
                    applied_cascades.push(applied);
                }
            }
        }

        let (active_flow, flow) = cfg.active_flow(&tags);
        let flow_sequence = flow.to_vec();
        let flow_position = progression::position_in_flow(&flow_sequence, &target.to_wire());

        Ok(TransitionOutcome {
            entity_kind: req.entity_kind,
            entity_id: req.entity_id,
            from_status: current_status.to_wire(),
            to_status: target.to_wire(),
            role_changed,
            previous_role: from_role,
            new_role: to_role,
            active_flow: active_flow.to_string(),
            flow_sequence,
            flow_position,
            unblocked_tasks,
            cascade_events,
            applied_cascades,
            cleanup,
        })
    }

    /// Task -> work gate: a task may not enter the work role while any of
    /// its blocking dependencies are unsatisfied.
    async fn check_blocker_gate(&self, task_id: Uuid) -> Result<()> {
        let edges = self.dependencies.list_for_task(task_id).await?;
        let roles = self.role_snapshot(&edges).await;

        let blockers = blockers_of(task_id, &edges, |id| roles.get(&id).copied());
        if is_blocked(&blockers) {
            let unresolved: Vec<String> = blockers
                .iter()
                .filter(|b| !b.satisfied)
                .map(|b| b.blocker_task_id.to_string())
                .collect();
            return Err(OrchestratorError::Validation(format!(
                "task is blocked by unresolved dependencies: {}",
                unresolved.join(", ")
            )));
        }
        Ok(())
    }

    /// Current role of every task touched by `edges`, as a lookup table for
    /// blocker resolution.
    async fn role_snapshot(&self, edges: &[crate::models::Dependency]) -> HashMap<Uuid, Role> {
        let mut ids: Vec<Uuid> = edges
            .iter()
            .flat_map(|d| [d.from_task_id, d.to_task_id])
            .collect();
        ids.sort();
        ids.dedup();

        let task_cfg = &self.config.status_progression.tasks;
        let mut roles = HashMap::new();
        for id in ids {
            if let Ok(task) = self.tasks.get(id).await {
                if let Some(role) = task_cfg.role_of(&task.status.to_wire()) {
                    roles.insert(id, role);
                }
            }
        }
        roles
    }

    async fn check_completion_prerequisites(
        &self,
        kind: EntityKind,
        id: Uuid,
        cfg: &crate::config::KindFlowConfig,
        to_role: Role,
    ) -> Result<()> {
        match kind {
            EntityKind::Task => {
                if to_role == Role::Terminal {
                    let task = self.tasks.get(id).await?;
                    if let Validation::Invalid { reason, .. } =
                        validate_task_completion_prerequisites(&task)
                    {
                        return Err(OrchestratorError::Validation(reason));
                    }
                }
            }
            EntityKind::Feature => {
                match to_role {
                    Role::Work => {
                        let children = self.tasks.list_by_feature(id).await?;
                        if children.is_empty() {
                            return Err(OrchestratorError::Validation(
                                "feature cannot move to a work-role status with no child tasks"
                                    .to_string(),
                            ));
                        }
                    }
                    Role::Review | Role::Terminal => {
                        let children = self.tasks.list_by_feature(id).await?;
                        let statuses: Vec<String> =
                            children.iter().map(|t| t.status.to_wire()).collect();
                        if !all_children_terminal(&self.config.status_progression.tasks, &statuses)
                        {
                            return Err(OrchestratorError::Validation(format!(
                                "feature cannot move to a {to_role}-role status while child tasks remain non-terminal"
                            )));
                        }
                        if to_role == Role::Terminal {
                            let feature = self.features.get(id).await?;
                            let current_role =
                                cfg.role_of(&feature.status.to_wire()).unwrap_or(Role::Queue);
                            if let Validation::Invalid { reason, .. } =
                                validate_feature_completion_prerequisites(&feature, current_role)
                            {
                                return Err(OrchestratorError::Validation(reason));
                            }
                        }
                    }
                    _ => {}
                }
            }
            EntityKind::Project => {
                if to_role == Role::Terminal {
                    let children = self.features.list_by_project(id).await?;
                    let statuses: Vec<String> =
                        children.iter().map(|f| f.status.to_wire()).collect();
                    if !all_children_terminal(&self.config.status_progression.features, &statuses) {
                        return Err(OrchestratorError::Validation(
                            "project cannot complete while child features remain non-terminal"
                                .to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    async fn commit_status(&self, kind: EntityKind, id: Uuid, status: StatusLabel) -> Result<()> {
        match kind {
            EntityKind::Project => {
                self.projects.set_status(id, status).await?;
            }
            EntityKind::Feature => {
                self.features.set_status(id, status).await?;
            }
            EntityKind::Task => {
                self.tasks.set_status(id, status).await?;
            }
        }
        Ok(())
    }

    /// Deletes a completed feature's non-retained child tasks, along with
    /// their sections and dependency edges. Runs sequentially rather than
    /// inside one storage transaction, since repositories are separate trait
    /// objects with no shared transaction handle; a failure partway through
    /// leaves the already-deleted rows gone and the rest intact.
    async fn run_completion_cleanup(&self, feature_id: Uuid) -> Result<CleanupOutcome> {
        if !self.config.completion_cleanup.enabled {
            return Ok(CleanupOutcome::skipped("completion cleanup disabled"));
        }

        let children = self.tasks.list_by_feature(feature_id).await?;
        let (to_delete, to_retain) = cleanup::partition(&self.config.completion_cleanup, &children);

        let mut sections_deleted = 0u32;
        let mut dependencies_deleted = 0u32;
        for task_id in &to_delete {
            for dep in self.dependencies.list_for_task(*task_id).await? {
                self.dependencies.delete(dep.id).await?;
                dependencies_deleted += 1;
            }
            for section in self
                .sections
                .list_for_entity(SectionEntityType::Task, *task_id)
                .await?
            {
                self.sections.delete(section.id).await?;
                sections_deleted += 1;
            }
            self.tasks.delete(*task_id).await?;
        }

        Ok(CleanupOutcome {
            performed: true,
            tasks_deleted: to_delete.len() as u32,
            tasks_retained: to_retain.len() as u32,
            retained_task_ids: to_retain,
            sections_deleted,
            dependencies_deleted,
            reason: None,
        })
    }

    async fn detect_task_downstream_unblocks(&self, task_id: Uuid) -> Result<Vec<Uuid>> {
        let edges = self.dependencies.list_all_blocking().await?;
        let roles = self.role_snapshot(&edges).await;

        let unblocked = detect_downstream_unblocks(task_id, &edges, |id| roles.get(&id).copied());
        // Only tasks actually downstream of task_id are reported (the
        // cascade is about *this* transition, not the whole graph).
        let downstream: std::collections::HashSet<_> =
            directly_blocks(task_id, &edges).into_iter().collect();
        Ok(unblocked
            .into_iter()
            .filter(|id| downstream.contains(id))
            .collect())
    }

    /// Pure detection of an eligible parent rollup, with no side effects.
    /// Always runs so callers can see the cascade that *would* apply even
    /// when auto-cascade is disabled or the budget is exhausted.
    async fn detect_parent_rollup_candidate(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<CascadeEvent>> {
        match kind {
            EntityKind::Task => {
                let task = self.tasks.get(id).await?;
                let Some(feature_id) = task.feature_id else {
                    return Ok(None);
                };
                let feature = self.features.get(feature_id).await?;
                let cfg = &self.config.status_progression.features;
                if cfg.is_terminal(&feature.status.to_wire()) {
                    return Ok(None);
                }
                let siblings = self.tasks.list_by_feature(feature_id).await?;
                let statuses: Vec<String> = siblings.iter().map(|t| t.status.to_wire()).collect();
                if !all_children_terminal(&self.config.status_progression.tasks, &statuses) {
                    return Ok(None);
                }
                let Some(target) = rollup_target(cfg) else {
                    return Ok(None);
                };
                Ok(Some(CascadeEvent::ParentRolledUp {
                    entity_id: feature_id,
                    entity_kind: EntityKind::Feature,
                    to_status: target.to_string(),
                }))
            }
            EntityKind::Feature => {
                let feature = self.features.get(id).await?;
                let Some(project_id) = feature.project_id else {
                    return Ok(None);
                };
                let project = self.projects.get(project_id).await?;
                let cfg = &self.config.status_progression.projects;
                if cfg.is_terminal(&project.status.to_wire()) {
                    return Ok(None);
                }
                let siblings = self.features.list_by_project(project_id).await?;
                let statuses: Vec<String> = siblings.iter().map(|f| f.status.to_wire()).collect();
                if !all_children_terminal(&self.config.status_progression.features, &statuses) {
                    return Ok(None);
                }
                let Some(target) = rollup_target(cfg) else {
                    return Ok(None);
                };
                Ok(Some(CascadeEvent::ParentRolledUp {
                    entity_id: project_id,
                    entity_kind: EntityKind::Project,
                    to_status: target.to_string(),
                }))
            }
            EntityKind::Project => Ok(None),
        }
    }

    /// Recursively applies a detected rollup candidate, consuming one level
    /// of cascade budget.
    ///
    /// A detected candidate can still be unreachable from the parent's
    /// current status under strict sequential validation (a feature sitting
    /// several flow positions before its terminal status when its last child
    /// turns terminal, say). Application is best-effort: the candidate stays
    /// visible in `cascade_events` either way, but a failed attempt here must
    /// not fail the child transition that triggered it.
    async fn apply_parent_rollup(
        &self,
        candidate: CascadeEvent,
        budget: CascadeBudget,
    ) -> Result<Option<AppliedCascade>> {
        let CascadeEvent::ParentRolledUp {
            entity_id,
            entity_kind,
            to_status,
        } = candidate;

        let trigger = match entity_kind {
            EntityKind::Feature => "cascade: all child tasks terminal",
            EntityKind::Project => "cascade: all child features terminal",
            EntityKind::Task => return Ok(None),
        };

        let attempt = Box::pin(self.request_transition_inner(
            TransitionRequest {
                entity_kind,
                entity_id,
                target_status: to_status,
                trigger: Some(trigger.to_string()),
            },
            budget,
        ))
        .await;

        let outcome = match attempt {
            Ok(outcome) => outcome,
            Err(_) => return Ok(None),
        };

        Ok(Some(AppliedCascade {
            entity_kind,
            entity_id,
            to_status: outcome.to_status.clone(),
            cleanup: outcome.cleanup.clone(),
            child_cascades: outcome.applied_cascades.clone(),
        }))
    }
}
