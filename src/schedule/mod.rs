//! Ordering passes over the task list: the barrier-aware topological sort and the optional
//! clustering/merge pass.

pub(crate) mod cluster;
pub(crate) mod topo;
