//! Dependency graph engine: cycle detection and blocker resolution
//! `RELATES_TO` edges are informational and never participate
//! in either.

use crate::models::{Dependency, DependencyType};
use crate::role::{is_at_or_beyond, Role};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Canonical (blocker, blocked) pair: `blocker` must reach the edge's
/// `unblock_at` role before `blocked` is considered unblocked by it.
/// `RelatesTo` edges carry no ordering and are excluded (`None`).
fn normalize(dep: &Dependency) -> Option<(Uuid, Uuid)> {
    match dep.dependency_type {
        DependencyType::Blocks => Some((dep.from_task_id, dep.to_task_id)),
        DependencyType::IsBlockedBy => Some((dep.to_task_id, dep.from_task_id)),
        DependencyType::RelatesTo => None,
    }
}

/// Adjacency map from blocker task id to the tasks it directly blocks.
fn adjacency(edges: &[Dependency]) -> HashMap<Uuid, Vec<Uuid>> {
    let mut map: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for dep in edges {
        if let Some((blocker, blocked)) = normalize(dep) {
            map.entry(blocker).or_default().push(blocked);
        }
    }
    map
}

/// Would adding a `new_blocker -> new_blocked` edge introduce a cycle in the
/// blocking graph? Bounded DFS from `new_blocked`, looking for a path back
/// to `new_blocker` through the existing edges.
pub fn would_create_cycle(
    existing_edges: &[Dependency],
    new_blocker: Uuid,
    new_blocked: Uuid,
) -> Option<Vec<Uuid>> {
    if new_blocker == new_blocked {
        return Some(vec![new_blocker, new_blocked]);
    }

    let adj = adjacency(existing_edges);
    let mut visited = HashSet::new();
    let mut path = vec![new_blocked];
    if dfs_find(&adj, new_blocked, new_blocker, &mut visited, &mut path) {
        path.push(new_blocker);
        Some(path)
    } else {
        None
    }
}

fn dfs_find(
    adj: &HashMap<Uuid, Vec<Uuid>>,
    at: Uuid,
    target: Uuid,
    visited: &mut HashSet<Uuid>,
    path: &mut Vec<Uuid>,
) -> bool {
    if !visited.insert(at) {
        return false;
    }
    let Some(next) = adj.get(&at) else {
        return false;
    };
    for &n in next {
        if n == target {
            return true;
        }
        path.push(n);
        if dfs_find(adj, n, target, visited, path) {
            return true;
        }
        path.pop();
    }
    false
}

/// One unresolved-or-resolved blocking dependency on a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockerStatus {
    pub blocker_task_id: Uuid,
    pub unblock_at: Role,
    pub satisfied: bool,
}

/// Default role threshold used when a dependency has no explicit
/// `unblock_at` (invariant: a blocker must fully complete by default).
pub const DEFAULT_UNBLOCK_AT: Role = Role::Terminal;

/// Every blocking dependency on `task_id`, resolved against the current
/// role of each blocker (via `role_of`, which returns `None` for an unknown
/// or deleted task — treated as unsatisfied).
pub fn blockers_of(
    task_id: Uuid,
    edges: &[Dependency],
    role_of: impl Fn(Uuid) -> Option<Role>,
) -> Vec<BlockerStatus> {
    edges
        .iter()
        .filter_map(|dep| {
            let (blocker, blocked) = normalize(dep)?;
            if blocked != task_id {
                return None;
            }
            let unblock_at = dep
                .unblock_at
                .as_deref()
                .and_then(Role::parse)
                .unwrap_or(DEFAULT_UNBLOCK_AT);
            let satisfied = role_of(blocker)
                .map(|role| is_at_or_beyond(role, unblock_at))
                .unwrap_or(false);
            Some(BlockerStatus {
                blocker_task_id: blocker,
                unblock_at,
                satisfied,
            })
        })
        .collect()
}

/// A task is blocked by dependencies iff at least one blocker is
/// unsatisfied.
pub fn is_blocked(blockers: &[BlockerStatus]) -> bool {
    blockers.iter().any(|b| !b.satisfied)
}

/// Tasks downstream of `task_id` that this task directly blocks (used by the
/// cascade detector to find candidates for unblock notifications).
pub fn directly_blocks(task_id: Uuid, edges: &[Dependency]) -> Vec<Uuid> {
    adjacency(edges).remove(&task_id).unwrap_or_default()
}
