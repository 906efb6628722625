//! Status progression rules: which transitions a configured flow permits,
//! and whether an entity counts as ready, blocked, or terminal.

use crate::config::{KindFlowConfig, StatusValidationConfig};
use crate::graph::{is_blocked, BlockerStatus};
use crate::role::Role;
use crate::validator::{validate_status_known, Validation};

/// Where an entity sits relative to being actionable right now, with enough
/// context attached that a caller never has to re-derive the flow position
/// or re-run the blocker check to explain the verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// Not terminal, not dependency-blocked, free to advance.
    Ready {
        recommended_status: String,
        active_flow: String,
        flow_sequence: Vec<String>,
        current_position: Option<usize>,
        matched_tags: Vec<String>,
        current_role: Option<Role>,
        next_role: Option<Role>,
        reason: String,
    },
    /// Lateral `blocked` role, or at least one unsatisfied dependency.
    Blocked {
        current_status: String,
        blockers: Vec<BlockerStatus>,
        active_flow: String,
        flow_sequence: Vec<String>,
        current_position: Option<usize>,
    },
    /// Status is one of the kind's configured `terminal_statuses`.
    Terminal {
        terminal_status: String,
        active_flow: String,
        reason: String,
    },
}

/// Position of `status` within the active flow sequence for `tags`, if any.
pub fn position_in_flow(flow: &[String], status: &str) -> Option<usize> {
    flow.iter().position(|s| s == status)
}

/// The status that would follow `current` in the active flow, if the entity
/// advanced normally. `None` once `current` is the flow's last entry or not
/// part of the flow at all.
pub fn next_in_flow(cfg: &KindFlowConfig, current: &str, tags: &[String]) -> Option<String> {
    let (_, flow) = cfg.active_flow(tags);
    match position_in_flow(flow, current) {
        Some(idx) => flow.get(idx + 1).cloned(),
        None => flow.first().cloned(),
    }
}

/// Tags among `tags` that actually selected the active flow (as opposed to
/// every tag the entity happens to carry).
fn matched_tags(cfg: &KindFlowConfig, tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|t| cfg.tag_flow_mapping.iter().any(|m| &m.tag == *t))
        .cloned()
        .collect()
}

/// An entity is `Terminal` once its status is in `terminal_statuses`,
/// `Blocked` when its role is the lateral `blocked` role or it has at least
/// one unsatisfied dependency, and `Ready` otherwise.
pub fn readiness(
    cfg: &KindFlowConfig,
    status: &str,
    role: Option<Role>,
    tags: &[String],
    blockers: &[BlockerStatus],
) -> Readiness {
    let (flow_name, flow) = cfg.active_flow(tags);
    let current_position = position_in_flow(flow, status);

    if cfg.is_terminal(status) {
        return Readiness::Terminal {
            terminal_status: status.to_string(),
            active_flow: flow_name.to_string(),
            reason: format!("'{status}' is a terminal status"),
        };
    }

    if role == Some(Role::Blocked) || is_blocked(blockers) {
        return Readiness::Blocked {
            current_status: status.to_string(),
            blockers: blockers.to_vec(),
            active_flow: flow_name.to_string(),
            flow_sequence: flow.to_vec(),
            current_position,
        };
    }

    let recommended_status = next_in_flow(cfg, status, tags).unwrap_or_else(|| status.to_string());
    let next_role = cfg.role_of(&recommended_status);
    Readiness::Ready {
        reason: format!("'{status}' is ready to advance to '{recommended_status}'"),
        recommended_status,
        active_flow: flow_name.to_string(),
        flow_sequence: flow.to_vec(),
        current_position,
        matched_tags: matched_tags(cfg, tags),
        current_role: role,
        next_role,
    }
}

/// Whether moving from `current` to `target` is permitted under `cfg` and
/// the validation toggles in `validation`.
pub fn validate_transition(
    cfg: &KindFlowConfig,
    validation: &StatusValidationConfig,
    current: &str,
    target: &str,
    tags: &[String],
) -> Validation {
    if let Validation::Invalid { reason, fix_suggestions } = validate_status_known(cfg, target) {
        return Validation::Invalid { reason, fix_suggestions };
    }

    if target == current {
        return Validation::Invalid {
            reason: format!("entity is already in status '{current}'"),
            fix_suggestions: vec!["choose a different target status".to_string()],
        };
    }

    if cfg.is_terminal(current) && !validation.allow_backward {
        return Validation::Invalid {
            reason: format!("'{current}' is a terminal status; no further transitions are allowed"),
            fix_suggestions: vec!["terminal statuses are final under the current configuration".to_string()],
        };
    }

    if cfg.is_emergency(target) && validation.allow_emergency {
        return Validation::Valid;
    }

    let (flow_name, flow) = cfg.active_flow(tags);
    let current_idx = position_in_flow(flow, current);
    let target_idx = position_in_flow(flow, target);

    match (current_idx, target_idx) {
        (None, Some(t)) if t == 0 => Validation::Valid,
        (Some(c), Some(t)) if validation.enforce_sequential => {
            if t == c + 1 {
                Validation::Valid
            } else if validation.allow_backward && t < c {
                Validation::Valid
            } else {
                Validation::Invalid {
                    reason: format!(
                        "'{target}' is not the next status after '{current}' in flow '{flow_name}'"
                    ),
                    fix_suggestions: next_in_flow(cfg, current, tags)
                        .map(|s| vec![format!("advance to '{s}' instead")])
                        .unwrap_or_default(),
                }
            }
        }
        (Some(c), Some(t)) => {
            if t > c || (validation.allow_backward && t < c) {
                Validation::Valid
            } else {
                Validation::Invalid {
                    reason: format!("'{target}' does not advance the flow from '{current}'"),
                    fix_suggestions: vec![],
                }
            }
        }
        _ => Validation::Invalid {
            reason: format!(
                "'{target}' is not reachable from '{current}' in flow '{flow_name}'"
            ),
            fix_suggestions: vec!["use an emergency transition if one applies".to_string()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;

    fn task_cfg() -> KindFlowConfig {
        WorkflowConfig::default().status_progression.tasks
    }

    #[test]
    fn sequential_next_status_is_valid() {
        let cfg = task_cfg();
        let v = validate_transition(
            &cfg,
            &StatusValidationConfig::default(),
            "pending",
            "in-progress",
            &[],
        );
        assert!(v.is_valid());
    }

    #[test]
    fn skipping_ahead_is_rejected_when_sequential_enforced() {
        let cfg = task_cfg();
        let v = validate_transition(
            &cfg,
            &StatusValidationConfig::default(),
            "pending",
            "completed",
            &[],
        );
        assert!(!v.is_valid());
    }

    #[test]
    fn emergency_transition_always_reachable() {
        let cfg = task_cfg();
        let v = validate_transition(
            &cfg,
            &StatusValidationConfig::default(),
            "in-progress",
            "blocked",
            &[],
        );
        assert!(v.is_valid());
    }

    #[test]
    fn terminal_status_is_absorbing_by_default() {
        let cfg = task_cfg();
        let v = validate_transition(
            &cfg,
            &StatusValidationConfig::default(),
            "completed",
            "in-progress",
            &[],
        );
        assert!(!v.is_valid());
    }

    #[test]
    fn backward_move_allowed_when_configured() {
        let cfg = task_cfg();
        let validation = StatusValidationConfig {
            allow_backward: true,
            ..StatusValidationConfig::default()
        };
        let v = validate_transition(&cfg, &validation, "testing", "pending", &[]);
        assert!(v.is_valid());
    }

    #[test]
    fn readiness_reflects_terminal_status() {
        let cfg = task_cfg();
        assert!(matches!(
            readiness(&cfg, "completed", None, &[], &[]),
            Readiness::Terminal { .. }
        ));
    }

    #[test]
    fn readiness_reflects_blocked_role() {
        let cfg = task_cfg();
        assert!(matches!(
            readiness(&cfg, "blocked", Some(Role::Blocked), &[], &[]),
            Readiness::Blocked { .. }
        ));
    }

    #[test]
    fn readiness_reflects_unsatisfied_dependency_even_when_role_is_not_blocked() {
        use crate::graph::BlockerStatus;
        use uuid::Uuid;

        let cfg = task_cfg();
        let blockers = vec![BlockerStatus {
            blocker_task_id: Uuid::new_v4(),
            unblock_at: Role::Terminal,
            satisfied: false,
        }];
        assert!(matches!(
            readiness(&cfg, "pending", Some(Role::Queue), &[], &blockers),
            Readiness::Blocked { .. }
        ));
    }

    #[test]
    fn readiness_ready_when_no_blockers_and_not_terminal() {
        let cfg = task_cfg();
        match readiness(&cfg, "pending", Some(Role::Queue), &[], &[]) {
            Readiness::Ready { recommended_status, .. } => {
                assert_eq!(recommended_status, "in-progress");
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn next_in_flow_returns_first_entry_for_unstarted_entity() {
        let cfg = task_cfg();
        assert_eq!(next_in_flow(&cfg, "investigating", &[]), Some("pending".to_string()));
    }
}
