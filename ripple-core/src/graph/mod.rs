//! Dependency Graph
//!
//! This module implements the data structure linking observed state to the
//! effects that read it.
//!
//! # Overview
//!
//! The graph is a two-level mapping:
//!
//! - target id → key → [`Dep`], where a target is an observed object or array
//! - each [`Dep`] is the set of effects that read that (target, key)
//!
//! Refs and computeds own a standalone [`Dep`] instead of a graph entry.
//!
//! # Design Decisions
//!
//! 1. Edges are stored in both directions: the Dep knows its effects, and
//!    each effect keeps a reverse index of its Deps. Re-running or stopping
//!    an effect therefore touches only that effect's own edges, never the
//!    whole graph.
//!
//! 2. Neither direction owns the other side. Deps hold effects weakly and
//!    effects hold Deps weakly; only the graph (or the owning ref) keeps a
//!    Dep alive.
//!
//! 3. The outer level is keyed by [`TargetId`](crate::observe::TargetId), so
//!    dependency data never keeps a target alive.

mod dep;
mod operations;
mod target_map;

pub use dep::{Dep, DepId};
pub use operations::{TrackOp, TriggerOp};

pub(crate) use dep::WeakDep;
pub(crate) use target_map::{
    dep_for, deps_for_change, forget_target, is_tracked, subscriber_count, tracked_key_count,
};
