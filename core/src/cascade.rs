//! Cascade detection: automatic parent rollup when every child
//! reaches a terminal status, and downstream-unblock discovery when a task's
//! role advances far enough to satisfy dependents waiting on it.
//!
//! A single `request_transition` call may ripple through several of these in
//! sequence (task completes -> feature rolls up -> project rolls up), so the
//! depth is tracked by [`CascadeBudget`] and capped regardless of what the
//! workflow config asks for.

use crate::config::{WorkflowConfig, CASCADE_DEPTH_HARD_CAP};
use crate::graph::{blockers_of, directly_blocks, is_blocked};
use crate::models::{Dependency, EntityKind};
use crate::role::Role;
use uuid::Uuid;

/// Tracks remaining cascade depth for one `request_transition` call.
#[derive(Debug, Clone, Copy)]
pub struct CascadeBudget {
    remaining: u32,
}

impl CascadeBudget {
    pub fn new(cfg: &WorkflowConfig) -> Self {
        let depth = if cfg.auto_cascade.enabled {
            cfg.auto_cascade.effective_max_depth()
        } else {
            0
        };
        CascadeBudget {
            remaining: depth.min(CASCADE_DEPTH_HARD_CAP),
        }
    }

    pub fn has_budget(&self) -> bool {
        self.remaining > 0
    }

    /// Consume one level of cascade depth; returns the narrowed budget for
    /// the next hop.
    pub fn consume(self) -> Self {
        CascadeBudget {
            remaining: self.remaining.saturating_sub(1),
        }
    }
}

/// A parent-rollup cascade detected (or applied) while processing a
/// transition. Downstream task unblocks are reported separately, as a plain
/// task id list, since they don't recurse the way a rollup does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeEvent {
    /// A parent container is (or was) eligible to auto-advance because
    /// every child reached a terminal status.
    ParentRolledUp {
        entity_id: Uuid,
        entity_kind: EntityKind,
        to_status: String,
    },
}

/// Are all of a parent's children in one of its configured terminal
/// statuses? An empty child list never rolls up — an empty feature or
/// project isn't "done", it's unstarted.
pub fn all_children_terminal(cfg: &crate::config::KindFlowConfig, child_statuses: &[String]) -> bool {
    !child_statuses.is_empty() && child_statuses.iter().all(|s| cfg.is_terminal(s))
}

/// The status a parent should roll up to once every child is terminal:
/// the last entry of its default flow, if that entry is itself terminal,
/// otherwise the first configured terminal status.
pub fn rollup_target(cfg: &crate::config::KindFlowConfig) -> Option<&str> {
    if let Some(last) = cfg.default_flow.last() {
        if cfg.is_terminal(last) {
            return Some(last.as_str());
        }
    }
    cfg.terminal_statuses.first().map(|s| s.as_str())
}

/// Tasks directly blocked by `task_id` whose blockers are now fully
/// satisfied, given every blocking task's current role.
pub fn detect_downstream_unblocks(
    task_id: Uuid,
    all_edges: &[Dependency],
    role_of: impl Fn(Uuid) -> Option<Role>,
) -> Vec<Uuid> {
    directly_blocks(task_id, all_edges)
        .into_iter()
        .filter(|&downstream| {
            let blockers = blockers_of(downstream, all_edges, &role_of);
            !is_blocked(&blockers)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use chrono::Utc;
    use crate::models::DependencyType;

    fn dep(from: Uuid, to: Uuid, kind: DependencyType) -> Dependency {
        Dependency {
            id: Uuid::new_v4(),
            from_task_id: from,
            to_task_id: to,
            dependency_type: kind,
            unblock_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn budget_clamped_to_hard_cap_even_if_config_asks_more() {
        let mut cfg = WorkflowConfig::default();
        cfg.auto_cascade.max_depth = 100;
        let budget = CascadeBudget::new(&cfg);
        assert_eq!(budget.remaining, CASCADE_DEPTH_HARD_CAP);
    }

    #[test]
    fn budget_zero_when_cascade_disabled() {
        let mut cfg = WorkflowConfig::default();
        cfg.auto_cascade.enabled = false;
        let budget = CascadeBudget::new(&cfg);
        assert!(!budget.has_budget());
    }

    #[test]
    fn budget_exhausts_after_hard_cap_consumptions() {
        let cfg = WorkflowConfig::default();
        let mut budget = CascadeBudget::new(&cfg);
        for _ in 0..CASCADE_DEPTH_HARD_CAP {
            assert!(budget.has_budget());
            budget = budget.consume();
        }
        assert!(!budget.has_budget());
    }

    #[test]
    fn empty_child_list_never_rolls_up() {
        let cfg = WorkflowConfig::default().status_progression.tasks;
        assert!(!all_children_terminal(&cfg, &[]));
    }

    #[test]
    fn all_terminal_children_trigger_rollup() {
        let cfg = WorkflowConfig::default().status_progression.tasks;
        let statuses = vec!["completed".to_string(), "cancelled".to_string()];
        assert!(all_children_terminal(&cfg, &statuses));
        assert_eq!(rollup_target(&cfg), Some("completed"));
    }

    #[test]
    fn one_non_terminal_child_blocks_rollup() {
        let cfg = WorkflowConfig::default().status_progression.tasks;
        let statuses = vec!["completed".to_string(), "in-progress".to_string()];
        assert!(!all_children_terminal(&cfg, &statuses));
    }

    #[test]
    fn downstream_unblock_detected_when_blocker_completes() {
        let blocker = Uuid::new_v4();
        let downstream = Uuid::new_v4();
        let edges = vec![dep(blocker, downstream, DependencyType::Blocks)];
        let unblocked = detect_downstream_unblocks(blocker, &edges, |id| {
            if id == blocker {
                Some(Role::Terminal)
            } else {
                None
            }
        });
        assert_eq!(unblocked, vec![downstream]);
    }

    #[test]
    fn downstream_not_reported_when_other_blockers_remain() {
        let blocker_a = Uuid::new_v4();
        let blocker_b = Uuid::new_v4();
        let downstream = Uuid::new_v4();
        let edges = vec![
            dep(blocker_a, downstream, DependencyType::Blocks),
            dep(blocker_b, downstream, DependencyType::Blocks),
        ];
        let unblocked = detect_downstream_unblocks(blocker_a, &edges, |id| {
            if id == blocker_a {
                Some(Role::Terminal)
            } else {
                Some(Role::Queue)
            }
        });
        assert!(unblocked.is_empty());
    }
}
