//! Orchestration: the task list, task construction, and the flush protocol.

pub(crate) mod drawing_manager;
pub(crate) mod factories;
pub(crate) mod flush;
pub(crate) mod graph;
pub(crate) mod on_flush;
pub(crate) mod options;
