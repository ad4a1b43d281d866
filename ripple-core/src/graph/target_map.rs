//! The process-wide dependency graph: target id → key → [`Dep`].
//!
//! The map is keyed by id, not by the target, so it never keeps a target
//! alive. A target removes its own entry when it is dropped.

use std::sync::OnceLock;

use dashmap::DashMap;
use indexmap::IndexMap;
use smallvec::SmallVec;

use super::dep::Dep;
use super::operations::TriggerOp;
use crate::observe::{Key, TargetId};

type KeyToDepMap = IndexMap<Key, Dep>;

static TARGET_MAP: OnceLock<DashMap<TargetId, KeyToDepMap>> = OnceLock::new();

fn target_map() -> &'static DashMap<TargetId, KeyToDepMap> {
    TARGET_MAP.get_or_init(DashMap::new)
}

/// The dep for (target, key), created on first use.
pub(crate) fn dep_for(target: TargetId, key: Key) -> Dep {
    target_map()
        .entry(target)
        .or_default()
        .entry(key)
        .or_default()
        .clone()
}

/// The deps a change to (target, key) must notify.
///
/// - the dep for `key` itself;
/// - a structural change to a plain object also hits the enumeration
///   sentinel; appending to an array hits its length;
/// - assigning an array's length hits the length and every index at or
///   beyond the new length.
pub(crate) fn deps_for_change(
    target: TargetId,
    op: TriggerOp,
    key: &Key,
    new_length: Option<usize>,
) -> SmallVec<[Dep; 4]> {
    let mut deps = SmallVec::new();
    let Some(key_map) = target_map().get(&target) else {
        return deps;
    };

    if let (TriggerOp::Set, Key::Length, Some(new_length)) = (op, key, new_length) {
        for (tracked, dep) in key_map.iter() {
            match tracked {
                Key::Length => deps.push(dep.clone()),
                Key::Index(index) if *index >= new_length => deps.push(dep.clone()),
                _ => {}
            }
        }
        return deps;
    }

    if let Some(dep) = key_map.get(key) {
        deps.push(dep.clone());
    }
    if op.is_structural() {
        let structural = match (op, key) {
            (TriggerOp::Add, Key::Index(_)) => Some(Key::Length),
            // Deleting an array element leaves a hole; the keys are unchanged.
            (TriggerOp::Delete, Key::Index(_)) => None,
            _ => Some(Key::Iterate),
        };
        if let Some(dep) = structural.and_then(|structural| key_map.get(&structural)) {
            deps.push(dep.clone());
        }
    }
    deps
}

/// Drop all dependency data of a target.
pub(crate) fn forget_target(target: TargetId) {
    // The removed entry is dropped after the shard lock is released.
    let removed = target_map().remove(&target);
    drop(removed);
}

pub(crate) fn is_tracked(target: TargetId) -> bool {
    target_map().contains_key(&target)
}

pub(crate) fn tracked_key_count(target: TargetId) -> usize {
    target_map().get(&target).map_or(0, |key_map| key_map.len())
}

pub(crate) fn subscriber_count(target: TargetId, key: &Key) -> usize {
    target_map()
        .get(&target)
        .and_then(|key_map| key_map.get(key).map(Dep::len))
        .unwrap_or(0)
}
