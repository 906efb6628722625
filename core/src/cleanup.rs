//! Feature-completion cleanup: once a feature reaches a terminal status its
//! finished child tasks are no longer useful scratch space and are removed,
//! along with their sections and dependency edges, unless a task carries one
//! of the configured `retain_tags` — bug-adjacent work keeps its full detail
//! for later audit.

use crate::config::CompletionCleanupConfig;
use crate::models::Task;
use uuid::Uuid;

/// Whether a single task survives cleanup because of a retained tag.
pub fn should_retain(cfg: &CompletionCleanupConfig, tags: &[String]) -> bool {
    tags.iter().any(|t| cfg.retain_tags.contains(t))
}

/// Splits a feature's child tasks into those to delete and those to keep.
pub fn partition(cfg: &CompletionCleanupConfig, tasks: &[Task]) -> (Vec<Uuid>, Vec<Uuid>) {
    let mut to_delete = Vec::new();
    let mut to_retain = Vec::new();
    for task in tasks {
        if should_retain(cfg, &task.tags) {
            to_retain.push(task.id);
        } else {
            to_delete.push(task.id);
        }
    }
    (to_delete, to_retain)
}

/// Result of running (or skipping) cleanup for one feature completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub performed: bool,
    pub tasks_deleted: u32,
    pub tasks_retained: u32,
    pub retained_task_ids: Vec<Uuid>,
    pub sections_deleted: u32,
    pub dependencies_deleted: u32,
    pub reason: Option<String>,
}

impl CleanupOutcome {
    /// A no-op outcome, carrying the reason cleanup did not run.
    pub fn skipped(reason: impl Into<String>) -> Self {
        CleanupOutcome {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}
