use crate::alloc::contract::ResourceAllocator;
use crate::device::flush_state::FlushState;
use crate::foundation::ids::ResourceId;
use crate::resource::table::ResourceTable;
use crate::task::{Task, TaskBehavior};

/// A closed, sorted task list detached from a recorder, together with the resources it refers
/// to.
///
/// Graphs are plain data and can be moved to another thread for [`TaskGraph::pre_prepare`] before
/// being replayed with [`crate::DrawingManager::new_subgraph_task`].
#[derive(Clone, Debug)]
pub struct TaskGraph {
    pub(crate) tasks: Vec<Task>,
    pub(crate) resources: ResourceTable,
    pub(crate) target: Option<ResourceId>,
}

impl TaskGraph {
    /// Tasks in execution order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Resources declared while recording.
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Recorded surface that replay redirects to the destination.
    pub fn target(&self) -> Option<ResourceId> {
        self.target
    }

    /// Run the off-thread preparation step of every task.
    pub fn pre_prepare(&mut self) {
        for t in &mut self.tasks {
            t.pre_prepare();
        }
    }

    /// Address-free listing, one task per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (pos, t) in self.tasks.iter().enumerate() {
            out.push_str(&format!("{pos:>3}: {}\n", t.describe()));
        }
        out
    }
}

/// A replayed [`TaskGraph`] spliced in as one opaque node; its target is the replay destination.
#[derive(Clone, Debug)]
pub struct SubGraphTask {
    tasks: Vec<Task>,
}

impl SubGraphTask {
    pub(crate) fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Wrapped tasks in execution order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

impl TaskBehavior for SubGraphTask {
    fn name(&self) -> &'static str {
        "subgraph"
    }

    fn gather_intervals(&self, _targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        // Every task advances the op index, even one that touches nothing itself.
        alloc.inc_ops();
        for t in &self.tasks {
            t.gather_intervals(alloc);
        }
    }

    fn on_is_used(&self, resource: ResourceId) -> bool {
        self.tasks.iter().any(|t| t.is_used(resource))
    }

    fn pre_prepare(&mut self) {
        for t in &mut self.tasks {
            t.pre_prepare();
        }
    }

    fn prepare(&mut self, _targets: &[ResourceId], state: &mut FlushState<'_>) {
        for t in &mut self.tasks {
            if t.is_instantiated(state.resources()) {
                t.prepare(state);
            }
        }
    }

    fn execute(&mut self, _targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let mut any = false;
        for t in &mut self.tasks {
            if t.is_instantiated(state.resources()) {
                any |= t.execute(state);
            }
        }
        any
    }

    fn end_flush(&mut self) {
        for t in &mut self.tasks {
            t.end_flush();
        }
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        for t in &mut self.tasks {
            t.remap_resources(map);
        }
    }
}
