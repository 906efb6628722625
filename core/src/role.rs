//! The five-role status classification.
//!
//! Roles are a coarser lens than status labels: every configured status maps
//! to exactly one role, and progression/prerequisite logic is written in
//! terms of roles rather than labels so that adding a status to the config
//! never requires a code change.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Queue,
    Work,
    Review,
    Terminal,
    /// Lateral — outside the queue/work/review/terminal progression order.
    Blocked,
}

impl Role {
    /// Fixed progression order for the four non-lateral roles. `Blocked` has
    /// no place in this order; it is compared specially in
    /// [`is_at_or_beyond`].
    fn order(self) -> Option<u8> {
        match self {
            Role::Queue => Some(0),
            Role::Work => Some(1),
            Role::Review => Some(2),
            Role::Terminal => Some(3),
            Role::Blocked => None,
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "queue" => Some(Role::Queue),
            "work" => Some(Role::Work),
            "review" => Some(Role::Review),
            "terminal" => Some(Role::Terminal),
            "blocked" => Some(Role::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Queue => "queue",
            Role::Work => "work",
            Role::Review => "review",
            Role::Terminal => "terminal",
            Role::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

/// `is_at_or_beyond(current, threshold)` role comparison.
///
/// `blocked` is lateral: it only satisfies a `blocked` threshold, and a
/// `blocked` current role never satisfies any other threshold.
pub fn is_at_or_beyond(current: Role, threshold: Role) -> bool {
    if threshold == Role::Blocked {
        return current == Role::Blocked;
    }
    if current == Role::Blocked {
        return false;
    }
    match (current.order(), threshold.order()) {
        (Some(c), Some(t)) => c >= t,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_threshold_only_satisfied_by_blocked() {
        assert!(is_at_or_beyond(Role::Blocked, Role::Blocked));
        assert!(!is_at_or_beyond(Role::Terminal, Role::Blocked));
    }

    #[test]
    fn blocked_current_never_satisfies_non_blocked_threshold() {
        assert!(!is_at_or_beyond(Role::Blocked, Role::Queue));
        assert!(!is_at_or_beyond(Role::Blocked, Role::Work));
        assert!(!is_at_or_beyond(Role::Blocked, Role::Terminal));
    }

    #[test]
    fn progression_order_compares_normally() {
        assert!(is_at_or_beyond(Role::Work, Role::Queue));
        assert!(is_at_or_beyond(Role::Work, Role::Work));
        assert!(!is_at_or_beyond(Role::Queue, Role::Work));
        assert!(is_at_or_beyond(Role::Terminal, Role::Review));
    }

    #[test]
    fn unblock_at_work_example() {
        // unblockAt = work; blocker role = work -> unblocked
        assert!(is_at_or_beyond(Role::Work, Role::Work));
        // blocker role = queue -> still blocked
        assert!(!is_at_or_beyond(Role::Queue, Role::Work));
        // blocker role = blocked -> always still blocked
        assert!(!is_at_or_beyond(Role::Blocked, Role::Work));
    }
}
