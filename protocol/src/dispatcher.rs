//! Tool dispatch table: decodes a [`ToolCall`]'s arguments, runs the
//! matching engine operation, and wraps the result in a [`ToolResponse`].

use crate::envelope::{ToolCall, ToolResponse};
use crate::error::ToolError;
use crate::params::*;
use orchestrator_core::cascade::CascadeEvent;
use orchestrator_core::cleanup::CleanupOutcome;
use orchestrator_core::config::WorkflowConfig;
use orchestrator_core::executor::{AppliedCascade, TransitionExecutor, TransitionRequest};
use orchestrator_core::graph::{blockers_of, would_create_cycle, BlockerStatus};
use orchestrator_core::models::{
    DependencyType, EntityFilter, EntityKind, NewDependency, NewFeature, NewProject, NewSection,
    NewTask, StatusLabel, UpdateFeature, UpdateProject, UpdateSectionText, UpdateTask,
};
use orchestrator_core::progression::readiness;
use orchestrator_core::progression::Readiness;
use orchestrator_core::repository::{
    DependencyRepository, FeatureRepository, ProjectRepository, RoleTransitionRepository,
    SectionRepository, TaskRepository,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct Dispatcher {
    config: WorkflowConfig,
    projects: Arc<dyn ProjectRepository>,
    features: Arc<dyn FeatureRepository>,
    tasks: Arc<dyn TaskRepository>,
    sections: Arc<dyn SectionRepository>,
    dependencies: Arc<dyn DependencyRepository>,
    role_transitions: Arc<dyn RoleTransitionRepository>,
    executor: Arc<TransitionExecutor>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WorkflowConfig,
        projects: Arc<dyn ProjectRepository>,
        features: Arc<dyn FeatureRepository>,
        tasks: Arc<dyn TaskRepository>,
        sections: Arc<dyn SectionRepository>,
        dependencies: Arc<dyn DependencyRepository>,
        role_transitions: Arc<dyn RoleTransitionRepository>,
        executor: Arc<TransitionExecutor>,
    ) -> Self {
        Self {
            config,
            projects,
            features,
            tasks,
            sections,
            dependencies,
            role_transitions,
            executor,
        }
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolResponse {
        let result = self.route(&call.tool, call.arguments).await;
        match result {
            Ok((message, data)) => ToolResponse::ok(message, data),
            Err(err) => ToolResponse::err(&err),
        }
    }

    async fn route(&self, tool: &str, args: Value) -> Result<(String, Value), ToolError> {
        match tool {
            "manage_container" => self.manage_container(parse(args)?).await,
            "query_container" => self.query_container(parse(args)?).await,
            "manage_sections" => self.manage_sections(parse(args)?).await,
            "manage_dependencies" => self.manage_dependencies(parse(args)?).await,
            "query_dependencies" => self.query_dependencies(parse(args)?).await,
            "get_blocked_tasks" => self.get_blocked_tasks(parse(args)?).await,
            "get_next_task" => self.get_next_task(parse(args)?).await,
            "get_next_status" => self.get_next_status(parse(args)?).await,
            "request_transition" => self.request_transition(parse(args)?).await,
            "request_transition_batch" => self.request_transition_batch(parse(args)?).await,
            "query_role_transitions" => self.query_role_transitions(parse(args)?).await,
            "list_tags" => self.list_tags(parse(args)?).await,
            "health_check" => self.health_check().await,
            "query_templates" | "apply_template" => Err(ToolError::Validation(
                "template operations require an external content source and are not available in this deployment".to_string(),
            )),
            other => Err(ToolError::Protocol(format!("unknown tool '{other}'"))),
        }
    }

    async fn manage_container(
        &self,
        p: ManageContainerParams,
    ) -> Result<(String, Value), ToolError> {
        let kind = parse_kind(&p.kind)
            .ok_or_else(|| ToolError::Validation(format!("unknown container kind '{}'", p.kind)))?;

        match (p.action.as_str(), kind) {
            ("create", EntityKind::Project) => {
                let created = self
                    .projects
                    .create(NewProject {
                        name: p.name.ok_or_else(|| ToolError::empty("name"))?,
                        summary: p.summary.unwrap_or_default(),
                        priority: p.priority(),
                        tags: p.tags.unwrap_or_default(),
                    })
                    .await?;
                Ok(("project created".into(), json!(created)))
            }
            ("create", EntityKind::Feature) => {
                let created = self
                    .features
                    .create(NewFeature {
                        project_id: p.project_id,
                        name: p.name.ok_or_else(|| ToolError::empty("name"))?,
                        summary: p.summary.unwrap_or_default(),
                        priority: p.priority(),
                        tags: p.tags.unwrap_or_default(),
                        requires_verification: p.requires_verification.unwrap_or(false),
                    })
                    .await?;
                Ok(("feature created".into(), json!(created)))
            }
            ("create", EntityKind::Task) => {
                let created = self
                    .tasks
                    .create(NewTask {
                        feature_id: p.feature_id,
                        name: p.name.ok_or_else(|| ToolError::empty("name"))?,
                        description: p.description.unwrap_or_default(),
                        priority: p.priority(),
                        complexity: p.complexity.unwrap_or(5),
                        tags: p.tags.unwrap_or_default(),
                    })
                    .await?;
                Ok(("task created".into(), json!(created)))
            }
            ("get", EntityKind::Project) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                Ok(("ok".into(), json!(self.projects.get(id).await?)))
            }
            ("get", EntityKind::Feature) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                Ok(("ok".into(), json!(self.features.get(id).await?)))
            }
            ("get", EntityKind::Task) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                Ok(("ok".into(), json!(self.tasks.get(id).await?)))
            }
            ("update", EntityKind::Project) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                let updated = self
                    .projects
                    .update(
                        id,
                        UpdateProject {
                            name: p.name,
                            summary: p.summary,
                            priority: p.priority.as_deref().map(|_| p.priority()),
                            tags: p.tags,
                        },
                    )
                    .await?;
                Ok(("project updated".into(), json!(updated)))
            }
            ("update", EntityKind::Feature) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                let updated = self
                    .features
                    .update(
                        id,
                        UpdateFeature {
                            project_id: p.project_id.map(Some),
                            name: p.name,
                            summary: p.summary,
                            priority: p.priority.as_deref().map(|_| p.priority()),
                            tags: p.tags,
                            requires_verification: p.requires_verification,
                        },
                    )
                    .await?;
                Ok(("feature updated".into(), json!(updated)))
            }
            ("update", EntityKind::Task) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                let updated = self
                    .tasks
                    .update(
                        id,
                        UpdateTask {
                            feature_id: p.feature_id.map(Some),
                            name: p.name,
                            description: p.description,
                            summary: p.summary_text,
                            priority: p.priority.as_deref().map(|_| p.priority()),
                            complexity: p.complexity,
                            tags: p.tags,
                        },
                    )
                    .await?;
                Ok(("task updated".into(), json!(updated)))
            }
            ("delete", EntityKind::Project) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                self.projects.delete(id).await?;
                Ok(("project deleted".into(), json!({"id": id})))
            }
            ("delete", EntityKind::Feature) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                self.features.delete(id).await?;
                Ok(("feature deleted".into(), json!({"id": id})))
            }
            ("delete", EntityKind::Task) => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                self.tasks.delete(id).await?;
                Ok(("task deleted".into(), json!({"id": id})))
            }
            (other, _) => Err(ToolError::Validation(format!("unknown action '{other}'"))),
        }
    }

    async fn query_container(&self, p: QueryContainerParams) -> Result<(String, Value), ToolError> {
        let kind = parse_kind(&p.kind)
            .ok_or_else(|| ToolError::Validation(format!("unknown container kind '{}'", p.kind)))?;
        let filter = EntityFilter {
            status: p.status.map(StatusLabel::new),
            priority: p.priority.as_deref().map(|s| match s {
                "low" => orchestrator_core::models::Priority::Low,
                "high" => orchestrator_core::models::Priority::High,
                _ => orchestrator_core::models::Priority::Medium,
            }),
            tag: p.tag,
            parent_id: match (p.parent_id, p.include_standalone) {
                (Some(id), _) => Some(Some(id)),
                (None, true) => Some(None),
                (None, false) => None,
            },
            limit: p.limit,
            offset: p.offset,
        };

        match kind {
            EntityKind::Project => {
                let items = self.projects.list(filter).await?;
                Ok(("ok".into(), json!(items)))
            }
            EntityKind::Feature => {
                let items = self.features.list(filter).await?;
                Ok(("ok".into(), json!(items)))
            }
            EntityKind::Task => {
                let items = self.tasks.list(filter).await?;
                Ok(("ok".into(), json!(items)))
            }
        }
    }

    async fn manage_sections(&self, p: ManageSectionsParams) -> Result<(String, Value), ToolError> {
        match p.action.as_str() {
            "create" => {
                let entity_type = parse_section_entity_type(
                    p.entity_type
                        .as_deref()
                        .ok_or_else(|| ToolError::empty("entity_type"))?,
                )
                .ok_or_else(|| ToolError::Validation("unknown entity_type".to_string()))?;
                let created = self
                    .sections
                    .create(NewSection {
                        entity_type,
                        entity_id: p.entity_id.ok_or_else(|| ToolError::empty("entity_id"))?,
                        title: p.title.ok_or_else(|| ToolError::empty("title"))?,
                        usage_description: p.usage_description.unwrap_or_default(),
                        content: p.content.unwrap_or_default(),
                        ordinal: p.ordinal.unwrap_or(0),
                        tags: p.tags.unwrap_or_default(),
                    })
                    .await?;
                Ok(("section created".into(), json!(created)))
            }
            "update" => {
                let updated = self
                    .sections
                    .update_text(UpdateSectionText {
                        id: p.id.ok_or_else(|| ToolError::empty("id"))?,
                        content: p.content.ok_or_else(|| ToolError::empty("content"))?,
                        expected_version: p
                            .expected_version
                            .ok_or_else(|| ToolError::empty("expected_version"))?,
                    })
                    .await?;
                Ok(("section updated".into(), json!(updated)))
            }
            "delete" => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                self.sections.delete(id).await?;
                Ok(("section deleted".into(), json!({"id": id})))
            }
            "list" => {
                if let Some(tags) = &p.tags {
                    let items = self.sections.list_by_tags(tags).await?;
                    return Ok(("ok".into(), json!(items)));
                }
                let entity_type = parse_section_entity_type(
                    p.entity_type
                        .as_deref()
                        .ok_or_else(|| ToolError::empty("entity_type"))?,
                )
                .ok_or_else(|| ToolError::Validation("unknown entity_type".to_string()))?;
                let items = self
                    .sections
                    .list_for_entity(
                        entity_type,
                        p.entity_id.ok_or_else(|| ToolError::empty("entity_id"))?,
                    )
                    .await?;
                Ok(("ok".into(), json!(items)))
            }
            "bulk_create" => {
                let items = p.items.ok_or_else(|| ToolError::empty("items"))?;
                let mut news = Vec::with_capacity(items.len());
                for item in items {
                    let entity_type = parse_section_entity_type(&item.entity_type)
                        .ok_or_else(|| ToolError::Validation("unknown entity_type".to_string()))?;
                    news.push(NewSection {
                        entity_type,
                        entity_id: item.entity_id,
                        title: item.title,
                        usage_description: item.usage_description.unwrap_or_default(),
                        content: item.content.unwrap_or_default(),
                        ordinal: item.ordinal.unwrap_or(0),
                        tags: item.tags.unwrap_or_default(),
                    });
                }
                let created = self.sections.bulk_create(news).await?;
                Ok(("sections created".into(), json!(created)))
            }
            other => Err(ToolError::Validation(format!("unknown action '{other}'"))),
        }
    }

    async fn manage_dependencies(
        &self,
        p: ManageDependenciesParams,
    ) -> Result<(String, Value), ToolError> {
        match p.action.as_str() {
            "create" => {
                let from_task_id = p.from_task_id.ok_or_else(|| ToolError::empty("from_task_id"))?;
                let to_task_id = p.to_task_id.ok_or_else(|| ToolError::empty("to_task_id"))?;
                let dependency_type = parse_dependency_type(
                    p.dependency_type
                        .as_deref()
                        .ok_or_else(|| ToolError::empty("dependency_type"))?,
                )
                .ok_or_else(|| ToolError::Validation("unknown dependency_type".to_string()))?;

                if dependency_type.is_blocking() {
                    let (blocker, blocked) = match dependency_type {
                        orchestrator_core::models::DependencyType::Blocks => {
                            (from_task_id, to_task_id)
                        }
                        orchestrator_core::models::DependencyType::IsBlockedBy => {
                            (to_task_id, from_task_id)
                        }
                        orchestrator_core::models::DependencyType::RelatesTo => unreachable!(),
                    };
                    let existing = self.dependencies.list_all_blocking().await?;
                    if would_create_cycle(&existing, blocker, blocked).is_some() {
                        return Err(ToolError::Conflict(format!(
                            "dependency from {from_task_id} to {to_task_id} would create a cycle"
                        )));
                    }
                }

                let created = self
                    .dependencies
                    .create(NewDependency {
                        from_task_id,
                        to_task_id,
                        dependency_type,
                        unblock_at: p.unblock_at,
                    })
                    .await?;
                Ok(("dependency created".into(), json!(created)))
            }
            "delete" => {
                let id = p.id.ok_or_else(|| ToolError::empty("id"))?;
                self.dependencies.delete(id).await?;
                Ok(("dependency deleted".into(), json!({"id": id})))
            }
            "list" => {
                let task_id = p.task_id.ok_or_else(|| ToolError::empty("task_id"))?;
                let items = self.dependencies.list_for_task(task_id).await?;
                Ok(("ok".into(), json!(items)))
            }
            "create_pattern" => {
                let pattern = p.pattern.as_deref().ok_or_else(|| ToolError::empty("pattern"))?;
                let task_ids = p.task_ids.ok_or_else(|| ToolError::empty("task_ids"))?;
                let dependency_type = parse_dependency_type(
                    p.dependency_type.as_deref().unwrap_or("BLOCKS"),
                )
                .ok_or_else(|| ToolError::Validation("unknown dependency_type".to_string()))?;

                let edge_pairs: Vec<(uuid::Uuid, uuid::Uuid)> = match pattern {
                    "linear" => {
                        if task_ids.len() < 2 {
                            return Err(ToolError::Validation(
                                "linear pattern needs at least 2 tasks".to_string(),
                            ));
                        }
                        task_ids.windows(2).map(|w| (w[0], w[1])).collect()
                    }
                    "fan_out" => {
                        if task_ids.len() < 2 {
                            return Err(ToolError::Validation(
                                "fan_out pattern needs at least 2 tasks".to_string(),
                            ));
                        }
                        let (head, rest) = task_ids.split_first().unwrap();
                        rest.iter().map(|&t| (*head, t)).collect()
                    }
                    "fan_in" => {
                        if task_ids.len() < 2 {
                            return Err(ToolError::Validation(
                                "fan_in pattern needs at least 2 tasks".to_string(),
                            ));
                        }
                        let (last, rest) = task_ids.split_last().unwrap();
                        rest.iter().map(|&t| (t, *last)).collect()
                    }
                    other => return Err(ToolError::Validation(format!("unknown pattern '{other}'"))),
                };

                let mut existing = self.dependencies.list_all_blocking().await?;
                let mut created = Vec::with_capacity(edge_pairs.len());
                for (from_task_id, to_task_id) in edge_pairs {
                    if dependency_type.is_blocking() {
                        let (blocker, blocked) = match dependency_type {
                            DependencyType::Blocks => (from_task_id, to_task_id),
                            DependencyType::IsBlockedBy => (to_task_id, from_task_id),
                            DependencyType::RelatesTo => unreachable!(),
                        };
                        if would_create_cycle(&existing, blocker, blocked).is_some() {
                            return Err(ToolError::Conflict(format!(
                                "dependency from {from_task_id} to {to_task_id} would create a cycle"
                            )));
                        }
                    }
                    let dep = self
                        .dependencies
                        .create(NewDependency {
                            from_task_id,
                            to_task_id,
                            dependency_type,
                            unblock_at: p.unblock_at.clone(),
                        })
                        .await?;
                    existing.push(dep.clone());
                    created.push(dep);
                }
                Ok(("dependency pattern created".into(), json!(created)))
            }
            other => Err(ToolError::Validation(format!("unknown action '{other}'"))),
        }
    }

    async fn query_dependencies(
        &self,
        p: QueryDependenciesParams,
    ) -> Result<(String, Value), ToolError> {
        let items = self.dependencies.list_for_task(p.task_id).await?;
        Ok(("ok".into(), json!(items)))
    }

    async fn get_blocked_tasks(&self, p: GetBlockedTasksParams) -> Result<(String, Value), ToolError> {
        let limit = p.limit.unwrap_or(50);
        let candidates = self.tasks.list_unblocked_candidates(limit.max(200)).await?;
        let edges = self.dependencies.list_all_blocking().await?;
        let task_cfg = &self.config.status_progression.tasks;

        let mut roles = std::collections::HashMap::new();
        for t in &candidates {
            if let Some(role) = task_cfg.role_of(&t.status.to_wire()) {
                roles.insert(t.id, role);
            }
        }

        let mut blocked = Vec::new();
        for t in &candidates {
            let blockers = blockers_of(t.id, &edges, |id| roles.get(&id).copied());
            let r = readiness(
                task_cfg,
                &t.status.to_wire(),
                roles.get(&t.id).copied(),
                &t.tags,
                &blockers,
            );
            if matches!(r, Readiness::Blocked { .. }) {
                blocked.push(json!({
                    "task": t,
                    "unresolved_blockers": blockers
                        .iter()
                        .filter(|b| !b.satisfied)
                        .map(blocker_status_to_json)
                        .collect::<Vec<_>>(),
                }));
            }
            if blocked.len() as u32 >= limit {
                break;
            }
        }

        Ok(("ok".into(), json!(blocked)))
    }

    async fn get_next_task(&self, p: GetNextTaskParams) -> Result<(String, Value), ToolError> {
        let candidates = self.tasks.list_unblocked_candidates(200).await?;
        let edges = self.dependencies.list_all_blocking().await?;
        let task_cfg = &self.config.status_progression.tasks;

        let mut roles = std::collections::HashMap::new();
        for t in &candidates {
            if let Some(role) = task_cfg.role_of(&t.status.to_wire()) {
                roles.insert(t.id, role);
            }
        }

        for t in &candidates {
            if let Some(tag) = &p.tag {
                if !t.tags.iter().any(|x| x == tag) {
                    continue;
                }
            }
            let blockers = blockers_of(t.id, &edges, |id| roles.get(&id).copied());
            let r = readiness(
                task_cfg,
                &t.status.to_wire(),
                roles.get(&t.id).copied(),
                &t.tags,
                &blockers,
            );
            if !matches!(r, Readiness::Ready { .. }) {
                continue;
            }
            return Ok(("ok".into(), json!(t)));
        }

        Ok(("no eligible task found".into(), Value::Null))
    }

    async fn get_next_status(&self, p: GetNextStatusParams) -> Result<(String, Value), ToolError> {
        let kind = parse_kind(&p.kind)
            .ok_or_else(|| ToolError::Validation(format!("unknown container kind '{}'", p.kind)))?;
        let (status, tags) = match kind {
            EntityKind::Project => {
                let e = self.projects.get(p.id).await?;
                (e.status, e.tags)
            }
            EntityKind::Feature => {
                let e = self.features.get(p.id).await?;
                (e.status, e.tags)
            }
            EntityKind::Task => {
                let e = self.tasks.get(p.id).await?;
                (e.status, e.tags)
            }
        };
        let cfg = self.config.for_kind(kind);
        let role = cfg.role_of(&status.to_wire());
        let blockers = self.blockers_for(kind, p.id).await?;
        let r = readiness(cfg, &status.to_wire(), role, &tags, &blockers);
        Ok(("ok".into(), readiness_to_json(&r)))
    }

    async fn blockers_for(
        &self,
        kind: EntityKind,
        id: uuid::Uuid,
    ) -> Result<Vec<BlockerStatus>, ToolError> {
        if kind != EntityKind::Task {
            return Ok(Vec::new());
        }
        let edges = self.dependencies.list_for_task(id).await?;
        let task_cfg = &self.config.status_progression.tasks;
        let mut ids: Vec<uuid::Uuid> = edges
            .iter()
            .flat_map(|d| [d.from_task_id, d.to_task_id])
            .collect();
        ids.sort();
        ids.dedup();

        let mut roles = std::collections::HashMap::new();
        for tid in ids {
            if let Ok(t) = self.tasks.get(tid).await {
                if let Some(role) = task_cfg.role_of(&t.status.to_wire()) {
                    roles.insert(tid, role);
                }
            }
        }

        Ok(blockers_of(id, &edges, |tid| roles.get(&tid).copied()))
    }

    async fn request_transition(
        &self,
        p: RequestTransitionParams,
    ) -> Result<(String, Value), ToolError> {
        let kind = parse_kind(&p.kind)
            .ok_or_else(|| ToolError::Validation(format!("unknown container kind '{}'", p.kind)))?;
        let outcome = self
            .executor
            .request_transition(TransitionRequest {
                entity_kind: kind,
                entity_id: p.id,
                target_status: p.target_status,
                trigger: p.trigger,
            })
            .await?;
        Ok(("transitioned".into(), outcome_to_json(&outcome)))
    }

    async fn request_transition_batch(
        &self,
        p: RequestTransitionBatchParams,
    ) -> Result<(String, Value), ToolError> {
        let mut results = Vec::with_capacity(p.requests.len());
        for req in p.requests {
            let kind = match parse_kind(&req.kind) {
                Some(k) => k,
                None => {
                    results.push(json!({"success": false, "error": format!("unknown kind '{}'", req.kind)}));
                    continue;
                }
            };
            match self
                .executor
                .request_transition(TransitionRequest {
                    entity_kind: kind,
                    entity_id: req.id,
                    target_status: req.target_status,
                    trigger: req.trigger,
                })
                .await
            {
                Ok(outcome) => results.push(json!({"success": true, "outcome": outcome_to_json(&outcome)})),
                Err(e) => {
                    let tool_err: ToolError = e.into();
                    results.push(json!({"success": false, "error": tool_err.to_string()}))
                }
            }
        }
        Ok(("batch processed".into(), json!(results)))
    }

    async fn query_role_transitions(
        &self,
        p: QueryRoleTransitionsParams,
    ) -> Result<(String, Value), ToolError> {
        let entity_type = match p.entity_type.as_deref() {
            Some(s) => Some(
                parse_kind(s)
                    .ok_or_else(|| ToolError::Validation("unknown entity_type".to_string()))?,
            ),
            None => None,
        };
        let page = self
            .role_transitions
            .query(p.entity_id, entity_type, p.limit, p.offset)
            .await?;
        Ok((
            "ok".into(),
            json!({"items": page.items, "total": page.total, "limit": p.limit, "offset": p.offset}),
        ))
    }

    async fn list_tags(&self, p: ListTagsParams) -> Result<(String, Value), ToolError> {
        let mut tags = std::collections::BTreeSet::new();
        let kind = p.kind.as_deref().and_then(parse_kind);

        if kind.is_none() || kind == Some(EntityKind::Project) {
            for e in self.projects.list(EntityFilter::default()).await? {
                tags.extend(e.tags);
            }
        }
        if kind.is_none() || kind == Some(EntityKind::Feature) {
            for e in self.features.list(EntityFilter::default()).await? {
                tags.extend(e.tags);
            }
        }
        if kind.is_none() || kind == Some(EntityKind::Task) {
            for e in self.tasks.list(EntityFilter::default()).await? {
                tags.extend(e.tags);
            }
        }

        Ok(("ok".into(), json!(tags)))
    }

    async fn health_check(&self) -> Result<(String, Value), ToolError> {
        let stats = self.tasks.stats().await?;
        Ok((
            "healthy".into(),
            json!({
                "projects": stats.project_count,
                "features": stats.feature_count,
                "tasks": stats.task_count,
                "dependencies": stats.dependency_count,
                "tasks_by_status": stats.counts_by_status,
            }),
        ))
    }
}

fn outcome_to_json(outcome: &orchestrator_core::executor::TransitionOutcome) -> Value {
    json!({
        "entity_kind": outcome.entity_kind,
        "entity_id": outcome.entity_id,
        "from_status": outcome.from_status,
        "to_status": outcome.to_status,
        "role_changed": outcome.role_changed,
        "previous_role": outcome.previous_role,
        "new_role": outcome.new_role,
        "active_flow": outcome.active_flow,
        "flow_sequence": outcome.flow_sequence,
        "flow_position": outcome.flow_position,
        "unblocked_tasks": outcome.unblocked_tasks,
        "cascade_events": outcome.cascade_events.iter().map(cascade_event_to_json).collect::<Vec<_>>(),
        "applied_cascades": outcome.applied_cascades.iter().map(applied_cascade_to_json).collect::<Vec<_>>(),
        "cleanup": outcome.cleanup.as_ref().map(cleanup_to_json),
    })
}

fn cascade_event_to_json(event: &CascadeEvent) -> Value {
    match event {
        CascadeEvent::ParentRolledUp {
            entity_id,
            entity_kind,
            to_status,
        } => json!({
            "type": "parent_rolled_up",
            "entity_id": entity_id,
            "entity_kind": entity_kind,
            "to_status": to_status,
        }),
    }
}

fn applied_cascade_to_json(applied: &AppliedCascade) -> Value {
    json!({
        "entity_id": applied.entity_id,
        "entity_kind": applied.entity_kind,
        "to_status": applied.to_status,
        "cleanup": applied.cleanup.as_ref().map(cleanup_to_json),
        "child_cascades": applied.child_cascades.iter().map(applied_cascade_to_json).collect::<Vec<_>>(),
    })
}

fn cleanup_to_json(cleanup: &CleanupOutcome) -> Value {
    json!({
        "performed": cleanup.performed,
        "tasks_deleted": cleanup.tasks_deleted,
        "tasks_retained": cleanup.tasks_retained,
        "retained_task_ids": cleanup.retained_task_ids,
        "sections_deleted": cleanup.sections_deleted,
        "dependencies_deleted": cleanup.dependencies_deleted,
        "reason": cleanup.reason,
    })
}

fn readiness_to_json(r: &Readiness) -> Value {
    match r {
        Readiness::Ready {
            recommended_status,
            active_flow,
            flow_sequence,
            current_position,
            matched_tags,
            current_role,
            next_role,
            reason,
        } => json!({
            "readiness": "ready",
            "recommended_status": recommended_status,
            "active_flow": active_flow,
            "flow_sequence": flow_sequence,
            "current_position": current_position,
            "matched_tags": matched_tags,
            "current_role": current_role,
            "next_role": next_role,
            "reason": reason,
        }),
        Readiness::Blocked {
            current_status,
            blockers,
            active_flow,
            flow_sequence,
            current_position,
        } => json!({
            "readiness": "blocked",
            "current_status": current_status,
            "blockers": blockers.iter().map(blocker_status_to_json).collect::<Vec<_>>(),
            "active_flow": active_flow,
            "flow_sequence": flow_sequence,
            "current_position": current_position,
        }),
        Readiness::Terminal {
            terminal_status,
            active_flow,
            reason,
        } => json!({
            "readiness": "terminal",
            "terminal_status": terminal_status,
            "active_flow": active_flow,
            "reason": reason,
        }),
    }
}

fn blocker_status_to_json(b: &BlockerStatus) -> Value {
    json!({
        "blocker_task_id": b.blocker_task_id,
        "unblock_at": b.unblock_at.to_string(),
        "satisfied": b.satisfied,
    })
}

fn parse<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::Validation(format!("invalid arguments: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orchestrator_core::config::WorkflowConfig;
    use orchestrator_core::error::{OrchestratorError, Result as CoreResult};
    use orchestrator_core::models::*;
    use orchestrator_core::repository::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct MemStore {
        projects: Mutex<std::collections::HashMap<Uuid, Project>>,
        features: Mutex<std::collections::HashMap<Uuid, Feature>>,
        tasks: Mutex<std::collections::HashMap<Uuid, Task>>,
        sections: Mutex<std::collections::HashMap<Uuid, Section>>,
        dependencies: Mutex<std::collections::HashMap<Uuid, Dependency>>,
        role_transitions: Mutex<Vec<RoleTransition>>,
    }

    struct MemProjects(Arc<MemStore>);
    struct MemFeatures(Arc<MemStore>);
    struct MemTasks(Arc<MemStore>);
    struct MemSections(Arc<MemStore>);
    struct MemDependencies(Arc<MemStore>);
    struct MemRoleTransitions(Arc<MemStore>);

    fn not_found() -> OrchestratorError {
        OrchestratorError::not_found("entity", "unknown")
    }

    #[async_trait]
    impl ProjectRepository for MemProjects {
        async fn create(&self, new: NewProject) -> CoreResult<Project> {
            let now = chrono::Utc::now();
            let project = Project {
                id: Uuid::new_v4(),
                name: new.name,
                summary: new.summary,
                status: StatusLabel::new("planning"),
                priority: new.priority,
                tags: new.tags,
                created_at: now,
                modified_at: now,
            };
            self.0.projects.lock().unwrap().insert(project.id, project.clone());
            Ok(project)
        }

        async fn get(&self, id: Uuid) -> CoreResult<Project> {
            self.0.projects.lock().unwrap().get(&id).cloned().ok_or_else(not_found)
        }

        async fn update(&self, id: Uuid, patch: UpdateProject) -> CoreResult<Project> {
            let mut guard = self.0.projects.lock().unwrap();
            let project = guard.get_mut(&id).ok_or_else(not_found)?;
            if let Some(name) = patch.name {
                project.name = name;
            }
            if let Some(summary) = patch.summary {
                project.summary = summary;
            }
            if let Some(priority) = patch.priority {
                project.priority = priority;
            }
            if let Some(tags) = patch.tags {
                project.tags = tags;
            }
            project.modified_at = chrono::Utc::now();
            Ok(project.clone())
        }

        async fn set_status(&self, id: Uuid, status: StatusLabel) -> CoreResult<Project> {
            let mut guard = self.0.projects.lock().unwrap();
            let project = guard.get_mut(&id).ok_or_else(not_found)?;
            project.status = status;
            project.modified_at = chrono::Utc::now();
            Ok(project.clone())
        }

        async fn delete(&self, id: Uuid) -> CoreResult<()> {
            self.0.projects.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn list(&self, _filter: EntityFilter) -> CoreResult<Vec<Project>> {
            Ok(self.0.projects.lock().unwrap().values().cloned().collect())
        }
    }

    #[async_trait]
    impl FeatureRepository for MemFeatures {
        async fn create(&self, new: NewFeature) -> CoreResult<Feature> {
            let now = chrono::Utc::now();
            let feature = Feature {
                id: Uuid::new_v4(),
                project_id: new.project_id,
                name: new.name,
                summary: new.summary,
                status: StatusLabel::new("draft"),
                priority: new.priority,
                tags: new.tags,
                requires_verification: new.requires_verification,
                created_at: now,
                modified_at: now,
            };
            self.0.features.lock().unwrap().insert(feature.id, feature.clone());
            Ok(feature)
        }

        async fn get(&self, id: Uuid) -> CoreResult<Feature> {
            self.0.features.lock().unwrap().get(&id).cloned().ok_or_else(not_found)
        }

        async fn update(&self, id: Uuid, patch: UpdateFeature) -> CoreResult<Feature> {
            let mut guard = self.0.features.lock().unwrap();
            let feature = guard.get_mut(&id).ok_or_else(not_found)?;
            if let Some(project_id) = patch.project_id {
                feature.project_id = project_id;
            }
            if let Some(name) = patch.name {
                feature.name = name;
            }
            if let Some(summary) = patch.summary {
                feature.summary = summary;
            }
            if let Some(priority) = patch.priority {
                feature.priority = priority;
            }
            if let Some(tags) = patch.tags {
                feature.tags = tags;
            }
            if let Some(rv) = patch.requires_verification {
                feature.requires_verification = rv;
            }
            feature.modified_at = chrono::Utc::now();
            Ok(feature.clone())
        }

        async fn set_status(&self, id: Uuid, status: StatusLabel) -> CoreResult<Feature> {
            let mut guard = self.0.features.lock().unwrap();
            let feature = guard.get_mut(&id).ok_or_else(not_found)?;
            feature.status = status;
            feature.modified_at = chrono::Utc::now();
            Ok(feature.clone())
        }

        async fn delete(&self, id: Uuid) -> CoreResult<()> {
            self.0.features.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn list(&self, _filter: EntityFilter) -> CoreResult<Vec<Feature>> {
            Ok(self.0.features.lock().unwrap().values().cloned().collect())
        }

        async fn list_by_project(&self, project_id: Uuid) -> CoreResult<Vec<Feature>> {
            Ok(self
                .0
                .features
                .lock()
                .unwrap()
                .values()
                .filter(|f| f.project_id == Some(project_id))
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl TaskRepository for MemTasks {
        async fn create(&self, new: NewTask) -> CoreResult<Task> {
            let now = chrono::Utc::now();
            let task = Task {
                id: Uuid::new_v4(),
                feature_id: new.feature_id,
                name: new.name,
                description: new.description,
                summary: None,
                status: StatusLabel::new("backlog"),
                priority: new.priority,
                complexity: new.complexity,
                tags: new.tags,
                created_at: now,
                modified_at: now,
            };
            self.0.tasks.lock().unwrap().insert(task.id, task.clone());
            Ok(task)
        }

        async fn get(&self, id: Uuid) -> CoreResult<Task> {
            self.0.tasks.lock().unwrap().get(&id).cloned().ok_or_else(not_found)
        }

        async fn update(&self, id: Uuid, patch: UpdateTask) -> CoreResult<Task> {
            let mut guard = self.0.tasks.lock().unwrap();
            let task = guard.get_mut(&id).ok_or_else(not_found)?;
            if let Some(feature_id) = patch.feature_id {
                task.feature_id = feature_id;
            }
            if let Some(name) = patch.name {
                task.name = name;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(summary) = patch.summary {
                task.summary = Some(summary);
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(complexity) = patch.complexity {
                task.complexity = complexity;
            }
            if let Some(tags) = patch.tags {
                task.tags = tags;
            }
            task.modified_at = chrono::Utc::now();
            Ok(task.clone())
        }

        async fn set_status(&self, id: Uuid, status: StatusLabel) -> CoreResult<Task> {
            let mut guard = self.0.tasks.lock().unwrap();
            let task = guard.get_mut(&id).ok_or_else(not_found)?;
            task.status = status;
            task.modified_at = chrono::Utc::now();
            Ok(task.clone())
        }

        async fn delete(&self, id: Uuid) -> CoreResult<()> {
            self.0.tasks.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn list(&self, _filter: EntityFilter) -> CoreResult<Vec<Task>> {
            Ok(self.0.tasks.lock().unwrap().values().cloned().collect())
        }

        async fn list_by_feature(&self, feature_id: Uuid) -> CoreResult<Vec<Task>> {
            Ok(self
                .0
                .tasks
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.feature_id == Some(feature_id))
                .cloned()
                .collect())
        }

        async fn list_unblocked_candidates(&self, limit: u32) -> CoreResult<Vec<Task>> {
            let mut tasks: Vec<Task> = self.0.tasks.lock().unwrap().values().cloned().collect();
            tasks.sort_by_key(|t| t.created_at);
            tasks.truncate(limit as usize);
            Ok(tasks)
        }

        async fn stats(&self) -> CoreResult<RepositoryStats> {
            let tasks = self.0.tasks.lock().unwrap();
            let mut by_status: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
            for t in tasks.values() {
                *by_status.entry(t.status.to_wire()).or_insert(0) += 1;
            }
            Ok(RepositoryStats {
                project_count: self.0.projects.lock().unwrap().len() as i64,
                feature_count: self.0.features.lock().unwrap().len() as i64,
                task_count: tasks.len() as i64,
                dependency_count: self.0.dependencies.lock().unwrap().len() as i64,
                counts_by_status: by_status.into_iter().collect(),
            })
        }
    }

    #[async_trait]
    impl SectionRepository for MemSections {
        async fn create(&self, new: NewSection) -> CoreResult<Section> {
            let now = chrono::Utc::now();
            let section = Section {
                id: Uuid::new_v4(),
                entity_type: new.entity_type,
                entity_id: new.entity_id,
                title: new.title,
                usage_description: new.usage_description,
                content: new.content,
                ordinal: new.ordinal,
                tags: new.tags,
                created_at: now,
                modified_at: now,
                version: 1,
            };
            self.0.sections.lock().unwrap().insert(section.id, section.clone());
            Ok(section)
        }

        async fn get(&self, id: Uuid) -> CoreResult<Section> {
            self.0.sections.lock().unwrap().get(&id).cloned().ok_or_else(not_found)
        }

        async fn bulk_create(&self, news: Vec<NewSection>) -> CoreResult<Vec<Section>> {
            let mut created = Vec::with_capacity(news.len());
            for new in news {
                created.push(self.create(new).await?);
            }
            Ok(created)
        }

        async fn list_for_entity(
            &self,
            entity_type: SectionEntityType,
            entity_id: Uuid,
        ) -> CoreResult<Vec<Section>> {
            Ok(self
                .0
                .sections
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.entity_type == entity_type && s.entity_id == entity_id)
                .cloned()
                .collect())
        }

        async fn list_by_tags(&self, tags: &[String]) -> CoreResult<Vec<Section>> {
            Ok(self
                .0
                .sections
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.tags.iter().any(|t| tags.contains(t)))
                .cloned()
                .collect())
        }

        async fn update_text(&self, patch: UpdateSectionText) -> CoreResult<Section> {
            let mut guard = self.0.sections.lock().unwrap();
            let section = guard.get_mut(&patch.id).ok_or_else(not_found)?;
            if section.version != patch.expected_version {
                return Err(OrchestratorError::Conflict("version mismatch".to_string()));
            }
            section.content = patch.content;
            section.version += 1;
            section.modified_at = chrono::Utc::now();
            Ok(section.clone())
        }

        async fn delete(&self, id: Uuid) -> CoreResult<()> {
            self.0.sections.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    #[async_trait]
    impl DependencyRepository for MemDependencies {
        async fn create(&self, new: NewDependency) -> CoreResult<Dependency> {
            let dependency = Dependency {
                id: Uuid::new_v4(),
                from_task_id: new.from_task_id,
                to_task_id: new.to_task_id,
                dependency_type: new.dependency_type,
                unblock_at: new.unblock_at,
                created_at: chrono::Utc::now(),
            };
            self.0
                .dependencies
                .lock()
                .unwrap()
                .insert(dependency.id, dependency.clone());
            Ok(dependency)
        }

        async fn delete(&self, id: Uuid) -> CoreResult<()> {
            self.0.dependencies.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn list_for_task(&self, task_id: Uuid) -> CoreResult<Vec<Dependency>> {
            Ok(self
                .0
                .dependencies
                .lock()
                .unwrap()
                .values()
                .filter(|d| d.from_task_id == task_id || d.to_task_id == task_id)
                .cloned()
                .collect())
        }

        async fn list_all_blocking(&self) -> CoreResult<Vec<Dependency>> {
            Ok(self
                .0
                .dependencies
                .lock()
                .unwrap()
                .values()
                .filter(|d| d.dependency_type.is_blocking())
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl RoleTransitionRepository for MemRoleTransitions {
        async fn record(&self, transition: RoleTransition) -> CoreResult<()> {
            self.0.role_transitions.lock().unwrap().push(transition);
            Ok(())
        }

        async fn query(
            &self,
            entity_id: Option<Uuid>,
            entity_type: Option<EntityKind>,
            limit: u32,
            offset: u32,
        ) -> CoreResult<Page<RoleTransition>> {
            let all: Vec<RoleTransition> = self
                .0
                .role_transitions
                .lock()
                .unwrap()
                .iter()
                .filter(|t| entity_id.map_or(true, |id| t.entity_id == id))
                .filter(|t| entity_type.map_or(true, |k| t.entity_type == k))
                .cloned()
                .collect();
            let total = all.len() as i64;
            let items = all
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            Ok(Page { items, total })
        }
    }

    fn build_dispatcher() -> Dispatcher {
        let store = Arc::new(MemStore::default());
        let projects: Arc<dyn ProjectRepository> = Arc::new(MemProjects(store.clone()));
        let features: Arc<dyn FeatureRepository> = Arc::new(MemFeatures(store.clone()));
        let tasks: Arc<dyn TaskRepository> = Arc::new(MemTasks(store.clone()));
        let sections: Arc<dyn SectionRepository> = Arc::new(MemSections(store.clone()));
        let dependencies: Arc<dyn DependencyRepository> = Arc::new(MemDependencies(store.clone()));
        let role_transitions: Arc<dyn RoleTransitionRepository> =
            Arc::new(MemRoleTransitions(store.clone()));
        let config = WorkflowConfig::default();
        let executor = Arc::new(TransitionExecutor::new(
            config.clone(),
            projects.clone(),
            features.clone(),
            tasks.clone(),
            sections.clone(),
            dependencies.clone(),
            role_transitions.clone(),
        ));
        Dispatcher::new(
            config,
            projects,
            features,
            tasks,
            sections,
            dependencies,
            role_transitions,
            executor,
        )
    }

    #[tokio::test]
    async fn create_and_query_standalone_task() {
        let dispatcher = build_dispatcher();
        let response = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "wire up retries"}),
            })
            .await;
        assert!(response.success);
        let id = response.data.unwrap()["id"].as_str().unwrap().to_string();

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "query_container".to_string(),
                arguments: json!({"kind": "task", "include_standalone": true}),
            })
            .await;
        assert!(response.success);
        let items = response.data.unwrap().as_array().unwrap().len();
        assert_eq!(items, 1);
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn request_transition_moves_task_through_flow() {
        let dispatcher = build_dispatcher();
        let created = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "ship the release"}),
            })
            .await;
        let id = created.data.unwrap()["id"].as_str().unwrap().to_string();

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "task", "id": id, "target_status": "pending"}),
            })
            .await;
        assert!(response.success, "{:?}", response.error);
        let data = response.data.unwrap();
        assert_eq!(data["to_status"], "pending");
    }

    #[tokio::test]
    async fn request_transition_rejects_unknown_status() {
        let dispatcher = build_dispatcher();
        let created = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "a task"}),
            })
            .await;
        let id = created.data.unwrap()["id"].as_str().unwrap().to_string();

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "task", "id": id, "target_status": "teleported"}),
            })
            .await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn manage_dependencies_rejects_cycle() {
        let dispatcher = build_dispatcher();
        let a = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "a"}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        let b = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "b"}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let first = dispatcher
            .dispatch(ToolCall {
                tool: "manage_dependencies".to_string(),
                arguments: json!({
                    "action": "create",
                    "from_task_id": a,
                    "to_task_id": b,
                    "dependency_type": "BLOCKS",
                }),
            })
            .await;
        assert!(first.success);

        let cyclic = dispatcher
            .dispatch(ToolCall {
                tool: "manage_dependencies".to_string(),
                arguments: json!({
                    "action": "create",
                    "from_task_id": b,
                    "to_task_id": a,
                    "dependency_type": "BLOCKS",
                }),
            })
            .await;
        assert!(!cyclic.success);
    }

    #[tokio::test]
    async fn get_next_task_skips_blocked_task() {
        let dispatcher = build_dispatcher();
        let blocker = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "blocker"}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        let blocked = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "blocked"}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        dispatcher
            .dispatch(ToolCall {
                tool: "manage_dependencies".to_string(),
                arguments: json!({
                    "action": "create",
                    "from_task_id": blocked,
                    "to_task_id": blocker,
                    "dependency_type": "IS_BLOCKED_BY",
                }),
            })
            .await;

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "get_next_task".to_string(),
                arguments: json!({}),
            })
            .await;
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data["id"].as_str().unwrap(), blocker);
    }

    #[tokio::test]
    async fn health_check_reports_counts() {
        let dispatcher = build_dispatcher();
        dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "project", "name": "orbit"}),
            })
            .await;

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "health_check".to_string(),
                arguments: json!({}),
            })
            .await;
        assert!(response.success);
        assert_eq!(response.data.unwrap()["projects"], 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_protocol_error() {
        let dispatcher = build_dispatcher();
        let response = dispatcher
            .dispatch(ToolCall {
                tool: "reticulate_splines".to_string(),
                arguments: json!({}),
            })
            .await;
        assert!(!response.success);
    }

    async fn create_task(dispatcher: &Dispatcher, name: &str, tags: Vec<&str>) -> String {
        dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": name, "tags": tags}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn complete_task(dispatcher: &Dispatcher, id: &str) {
        for status in ["pending", "in-progress", "testing"] {
            let response = dispatcher
                .dispatch(ToolCall {
                    tool: "request_transition".to_string(),
                    arguments: json!({"kind": "task", "id": id, "target_status": status}),
                })
                .await;
            assert!(response.success, "{:?}", response.error);
        }

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({
                    "action": "update",
                    "kind": "task",
                    "id": id,
                    "summary_text": "x".repeat(320),
                }),
            })
            .await;
        assert!(response.success, "{:?}", response.error);

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "task", "id": id, "target_status": "completed"}),
            })
            .await;
        assert!(response.success, "{:?}", response.error);
    }

    #[tokio::test]
    async fn manage_sections_bulk_create_and_tag_filter() {
        let dispatcher = build_dispatcher();
        let task_id = create_task(&dispatcher, "track notes", vec![]).await;

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "manage_sections".to_string(),
                arguments: json!({
                    "action": "bulk_create",
                    "items": [
                        {"entity_type": "task", "entity_id": task_id, "title": "context", "tags": ["design"]},
                        {"entity_type": "task", "entity_id": task_id, "title": "risks", "tags": ["ops"]},
                    ],
                }),
            })
            .await;
        assert!(response.success, "{:?}", response.error);
        assert_eq!(response.data.unwrap().as_array().unwrap().len(), 2);

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "manage_sections".to_string(),
                arguments: json!({"action": "list", "tags": ["design"]}),
            })
            .await;
        assert!(response.success);
        let items = response.data.unwrap();
        let items = items.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title"], "context");
    }

    #[tokio::test]
    async fn manage_dependencies_list_and_create_pattern() {
        let dispatcher = build_dispatcher();
        let a = create_task(&dispatcher, "a", vec![]).await;
        let b = create_task(&dispatcher, "b", vec![]).await;
        let c = create_task(&dispatcher, "c", vec![]).await;

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "manage_dependencies".to_string(),
                arguments: json!({
                    "action": "create_pattern",
                    "pattern": "linear",
                    "task_ids": [a, b, c],
                    "dependency_type": "BLOCKS",
                }),
            })
            .await;
        assert!(response.success, "{:?}", response.error);
        assert_eq!(response.data.unwrap().as_array().unwrap().len(), 2);

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "manage_dependencies".to_string(),
                arguments: json!({"action": "list", "task_id": b}),
            })
            .await;
        assert!(response.success);
        assert_eq!(response.data.unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn task_cannot_enter_work_role_while_blocked() {
        let dispatcher = build_dispatcher();
        let blocker = create_task(&dispatcher, "blocker", vec![]).await;
        let blocked = create_task(&dispatcher, "blocked", vec![]).await;

        dispatcher
            .dispatch(ToolCall {
                tool: "manage_dependencies".to_string(),
                arguments: json!({
                    "action": "create",
                    "from_task_id": blocked,
                    "to_task_id": blocker,
                    "dependency_type": "IS_BLOCKED_BY",
                }),
            })
            .await;

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "task", "id": blocked, "target_status": "pending"}),
            })
            .await;
        assert!(response.success, "{:?}", response.error);

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "task", "id": blocked, "target_status": "in-progress"}),
            })
            .await;
        assert!(!response.success, "blocked task should not enter the work role");

        complete_task(&dispatcher, &blocker).await;

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "task", "id": blocked, "target_status": "in-progress"}),
            })
            .await;
        assert!(response.success, "{:?}", response.error);
    }

    #[tokio::test]
    async fn feature_requires_child_task_to_enter_work_role() {
        let dispatcher = build_dispatcher();
        let feature_id = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "feature", "name": "checkout revamp"}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "feature", "id": feature_id, "target_status": "planning"}),
            })
            .await;
        assert!(response.success, "{:?}", response.error);

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "feature", "id": feature_id, "target_status": "in-development"}),
            })
            .await;
        assert!(!response.success, "feature with no child tasks should not enter the work role");

        dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "step one", "feature_id": feature_id}),
            })
            .await;

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "feature", "id": feature_id, "target_status": "in-development"}),
            })
            .await;
        assert!(response.success, "{:?}", response.error);
    }

    #[tokio::test]
    async fn feature_completion_cleans_up_non_retained_tasks() {
        let dispatcher = build_dispatcher();
        let feature_id = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "feature", "name": "billing fix"}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let plain_task = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "plain", "feature_id": feature_id}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        let retained_task = dispatcher
            .dispatch(ToolCall {
                tool: "manage_container".to_string(),
                arguments: json!({"action": "create", "kind": "task", "name": "hotfix", "feature_id": feature_id, "tags": ["bug"]}),
            })
            .await
            .data
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        for status in ["planning", "in-development"] {
            let response = dispatcher
                .dispatch(ToolCall {
                    tool: "request_transition".to_string(),
                    arguments: json!({"kind": "feature", "id": feature_id, "target_status": status}),
                })
                .await;
            assert!(response.success, "{:?}", response.error);
        }

        complete_task(&dispatcher, &plain_task).await;
        complete_task(&dispatcher, &retained_task).await;

        for status in ["testing", "validating"] {
            let response = dispatcher
                .dispatch(ToolCall {
                    tool: "request_transition".to_string(),
                    arguments: json!({"kind": "feature", "id": feature_id, "target_status": status}),
                })
                .await;
            assert!(response.success, "{:?}", response.error);
        }

        let response = dispatcher
            .dispatch(ToolCall {
                tool: "request_transition".to_string(),
                arguments: json!({"kind": "feature", "id": feature_id, "target_status": "completed"}),
            })
            .await;
        assert!(response.success, "{:?}", response.error);
        let cleanup = &response.data.unwrap()["cleanup"];
        assert_eq!(cleanup["tasks_deleted"], 1);
        assert_eq!(cleanup["tasks_retained"], 1);

        let remaining = dispatcher
            .dispatch(ToolCall {
                tool: "query_container".to_string(),
                arguments: json!({"kind": "task", "parent_id": feature_id}),
            })
            .await;
        let remaining = remaining.data.unwrap();
        let remaining = remaining.as_array().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["id"].as_str().unwrap(), retained_task);
    }
}
