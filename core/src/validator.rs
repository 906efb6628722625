//! Prerequisite and status-change validation.
//!
//! Checks run in a fixed order and stop at the first failure. Outcomes are a
//! sum type rather than a boolean-plus-message pair, so callers can't forget
//! to check the reason.

use crate::config::KindFlowConfig;
use crate::models::{EntityKind, Feature, Priority, Task};
use crate::role::{is_at_or_beyond, Role};

/// Result of validating a proposed status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid {
        reason: String,
        fix_suggestions: Vec<String>,
    },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    fn invalid(reason: impl Into<String>, fix_suggestions: Vec<String>) -> Self {
        Validation::Invalid {
            reason: reason.into(),
            fix_suggestions,
        }
    }
}

/// Minimum length of a task's agent-written summary before it may reach a
/// terminal status.
pub const TASK_SUMMARY_MIN_LEN: usize = 300;
pub const TASK_SUMMARY_MAX_LEN: usize = 500;

/// Validates a target status is structurally legal for the given flow,
/// independent of the entity's current status.
pub fn validate_status_known(cfg: &KindFlowConfig, status: &str) -> Validation {
    if cfg.is_allowed(status) {
        Validation::Valid
    } else {
        Validation::invalid(
            format!("'{status}' is not an allowed status for this entity kind"),
            vec![format!(
                "use one of: {}",
                cfg.allowed_statuses.join(", ")
            )],
        )
    }
}

/// Ordered prerequisite checks run before a task may move to or past the
/// `terminal` role. Stops at the first failing check.
pub fn validate_task_completion_prerequisites(task: &Task) -> Validation {
    if task.name.trim().is_empty() {
        return Validation::invalid(
            "task name cannot be empty",
            vec!["set a non-empty name before completing the task".to_string()],
        );
    }

    match &task.summary {
        None => Validation::invalid(
            "task has no completion summary",
            vec![format!(
                "write a summary between {TASK_SUMMARY_MIN_LEN} and {TASK_SUMMARY_MAX_LEN} characters describing what was done"
            )],
        ),
        Some(summary) => {
            let len = summary.trim().chars().count();
            if len < TASK_SUMMARY_MIN_LEN {
                Validation::invalid(
                    format!(
                        "completion summary is {len} characters, below the {TASK_SUMMARY_MIN_LEN}-character minimum"
                    ),
                    vec!["expand the summary with more detail on the work performed".to_string()],
                )
            } else if len > TASK_SUMMARY_MAX_LEN {
                Validation::invalid(
                    format!(
                        "completion summary is {len} characters, above the {TASK_SUMMARY_MAX_LEN}-character maximum"
                    ),
                    vec!["trim the summary to the essential points".to_string()],
                )
            } else {
                Validation::Valid
            }
        }
    }
}

/// Feature-level completion gate: when `requires_verification` is set, the
/// feature may not reach `terminal` until explicitly marked verified by a
/// status transition carrying the `validating`/`pending-review` role.
pub fn validate_feature_completion_prerequisites(
    feature: &Feature,
    current_role: Role,
) -> Validation {
    if !feature.requires_verification {
        return Validation::Valid;
    }
    if is_at_or_beyond(current_role, Role::Review) {
        Validation::Valid
    } else {
        Validation::invalid(
            "feature requires verification but has not passed through review",
            vec!["move the feature through a review-role status first".to_string()],
        )
    }
}

/// Validates a free-form entity name/summary pair shared by all three kinds.
pub fn validate_name(kind: EntityKind, name: &str) -> Validation {
    if name.trim().is_empty() {
        Validation::invalid(
            format!("{kind} name cannot be empty"),
            vec!["provide a non-empty name".to_string()],
        )
    } else if name.len() > 200 {
        Validation::invalid(
            format!("{kind} name exceeds 200 characters"),
            vec!["shorten the name".to_string()],
        )
    } else {
        Validation::Valid
    }
}

pub fn validate_priority_known(_priority: Priority) -> Validation {
    Validation::Valid
}

/// Validates a task's complexity score is within the configured 1-10 range.
pub fn validate_complexity(complexity: i32) -> Validation {
    if (1..=10).contains(&complexity) {
        Validation::Valid
    } else {
        Validation::invalid(
            format!("complexity {complexity} is outside the 1-10 range"),
            vec!["set complexity between 1 and 10".to_string()],
        )
    }
}
