//! Tasks: the schedulable units of GPU work and their per-variant behavior.

pub(crate) mod buffer;
pub(crate) mod copy;
pub(crate) mod draw;
pub(crate) mod resolve;
pub(crate) mod subgraph;
pub(crate) mod transfer;
pub(crate) mod wait;
pub(crate) mod write_pixels;

use crate::alloc::contract::ResourceAllocator;
use crate::device::flush_state::FlushState;
use crate::foundation::geom::IRect;
use crate::foundation::ids::{ResourceId, TaskId};
use crate::resource::table::ResourceTable;
use smallvec::SmallVec;

use buffer::{BufferTransferTask, BufferUpdateTask};
use copy::CopyTask;
use draw::DrawTask;
use resolve::TextureResolveTask;
use subgraph::SubGraphTask;
use transfer::TransferFromSurfaceTask;
use wait::WaitTask;
use write_pixels::WritePixelsTask;

/// Lifecycle and scheduling flags of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskFlags {
    pub(crate) closed: bool,
    pub(crate) blocks_reordering: bool,
    pub(crate) requires_explicit_cleanup: bool,
    pub(crate) atlas: bool,
    pub(crate) skippable: bool,
}

/// What closing a task did to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExpectedOutcome {
    TargetUnchanged,
    /// The target's contents changed inside the given rectangle.
    TargetDirty(IRect),
}

/// Capabilities every task variant provides to the scheduler.
pub(crate) trait TaskBehavior {
    fn name(&self) -> &'static str;

    /// Declare every resource this task touches, then advance the allocator's op index.
    fn gather_intervals(&self, targets: &[ResourceId], alloc: &mut dyn ResourceAllocator);

    fn on_make_closed(
        &mut self,
        _targets: &[ResourceId],
        _resources: &ResourceTable,
    ) -> ExpectedOutcome {
        ExpectedOutcome::TargetUnchanged
    }

    /// Resources read (not written) by the task.
    fn on_is_used(&self, _resource: ResourceId) -> bool {
        false
    }

    fn is_instantiated(&self, targets: &[ResourceId], resources: &ResourceTable) -> bool {
        targets.iter().all(|&t| resources.is_instantiated(t))
    }

    fn pre_prepare(&mut self) {}

    fn prepare(&mut self, _targets: &[ResourceId], _state: &mut FlushState<'_>) {}

    /// Issue device commands. Returns whether anything was issued.
    fn execute(&mut self, targets: &[ResourceId], state: &mut FlushState<'_>) -> bool;

    fn end_flush(&mut self) {}

    fn make_skippable(&mut self) {}

    /// Rewrite every resource reference through `map` (indexed by old id).
    fn remap_resources(&mut self, map: &[ResourceId]);
}

/// Variant payload of a [`Task`].
#[derive(Clone, Debug)]
pub enum TaskKind {
    /// Batch of draws into one surface.
    Draw(DrawTask),
    /// Surface region copy.
    Copy(CopyTask),
    /// Buffer to buffer copy.
    BufferTransfer(BufferTransferTask),
    /// Host bytes into a buffer.
    BufferUpdate(BufferUpdateTask),
    /// Wait on external semaphores.
    Wait(WaitTask),
    /// Surface pixels into a buffer.
    TransferFromSurface(TransferFromSurfaceTask),
    /// Host pixels into a surface.
    WritePixels(WritePixelsTask),
    /// MSAA resolve and mip regeneration.
    Resolve(TextureResolveTask),
    /// A previously recorded task graph replayed as one node.
    SubGraph(SubGraphTask),
}

impl TaskKind {
    pub(crate) fn behavior(&self) -> &dyn TaskBehavior {
        match self {
            TaskKind::Draw(t) => t,
            TaskKind::Copy(t) => t,
            TaskKind::BufferTransfer(t) => t,
            TaskKind::BufferUpdate(t) => t,
            TaskKind::Wait(t) => t,
            TaskKind::TransferFromSurface(t) => t,
            TaskKind::WritePixels(t) => t,
            TaskKind::Resolve(t) => t,
            TaskKind::SubGraph(t) => t,
        }
    }

    pub(crate) fn behavior_mut(&mut self) -> &mut dyn TaskBehavior {
        match self {
            TaskKind::Draw(t) => t,
            TaskKind::Copy(t) => t,
            TaskKind::BufferTransfer(t) => t,
            TaskKind::BufferUpdate(t) => t,
            TaskKind::Wait(t) => t,
            TaskKind::TransferFromSurface(t) => t,
            TaskKind::WritePixels(t) => t,
            TaskKind::Resolve(t) => t,
            TaskKind::SubGraph(t) => t,
        }
    }
}

/// One schedulable unit of GPU work.
///
/// Dependencies and dependents are kept as id lists; the [`crate::DrawingManager`] owns every task
/// and maintains both directions.
#[derive(Clone, Debug)]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) flags: TaskFlags,
    pub(crate) targets: SmallVec<[ResourceId; 1]>,
    pub(crate) dependencies: SmallVec<[TaskId; 4]>,
    pub(crate) dependents: SmallVec<[TaskId; 4]>,
    /// Resolve task created while this task was open; depended on and closed when this closes.
    pub(crate) resolve_task: Option<TaskId>,
    pub(crate) kind: TaskKind,
}

impl Task {
    pub(crate) fn new(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            flags: TaskFlags::default(),
            targets: SmallVec::new(),
            dependencies: SmallVec::new(),
            dependents: SmallVec::new(),
            resolve_task: None,
            kind,
        }
    }

    /// Stable id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Variant payload.
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Short variant name used in dumps and logs.
    pub fn name(&self) -> &'static str {
        self.kind.behavior().name()
    }

    /// Resources this task writes.
    pub fn targets(&self) -> &[ResourceId] {
        &self.targets
    }

    /// Tasks that must execute before this one.
    pub fn dependencies(&self) -> &[TaskId] {
        &self.dependencies
    }

    /// Tasks that depend on this one.
    pub fn dependents(&self) -> &[TaskId] {
        &self.dependents
    }

    /// No more content or dependencies can be added.
    pub fn is_closed(&self) -> bool {
        self.flags.closed
    }

    /// Fixed ordering point for sorting and clustering.
    pub fn blocks_reordering(&self) -> bool {
        self.flags.blocks_reordering
    }

    /// Receives an explicit end-of-flush notification.
    pub fn requires_explicit_cleanup(&self) -> bool {
        self.flags.requires_explicit_cleanup
    }

    /// Shared atlas target that stays open across producers.
    pub fn is_atlas(&self) -> bool {
        self.flags.atlas
    }

    /// Content was dropped; the task issues nothing.
    pub fn is_skippable(&self) -> bool {
        self.flags.skippable
    }

    /// Return `true` if `other` is a direct dependency.
    pub fn depends_on(&self, other: TaskId) -> bool {
        self.dependencies.contains(&other)
    }

    /// Return `true` if this task writes or reads `resource`.
    pub fn is_used(&self, resource: ResourceId) -> bool {
        self.targets.contains(&resource) || self.kind.behavior().on_is_used(resource)
    }

    /// Drawing payload, if this is a draw task.
    pub fn as_draw(&self) -> Option<&DrawTask> {
        match &self.kind {
            TaskKind::Draw(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn as_draw_mut(&mut self) -> Option<&mut DrawTask> {
        match &mut self.kind {
            TaskKind::Draw(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn add_dependency_edge(&mut self, on: TaskId) -> bool {
        assert_ne!(on, self.id, "{} cannot depend on itself", self.id);
        if self.dependencies.contains(&on) {
            return false;
        }
        self.dependencies.push(on);
        true
    }

    pub(crate) fn add_dependent_edge(&mut self, dependent: TaskId) {
        if !self.dependents.contains(&dependent) {
            self.dependents.push(dependent);
        }
    }

    pub(crate) fn is_instantiated(&self, resources: &ResourceTable) -> bool {
        self.kind.behavior().is_instantiated(&self.targets, resources)
    }

    pub(crate) fn gather_intervals(&self, alloc: &mut dyn ResourceAllocator) {
        self.kind.behavior().gather_intervals(&self.targets, alloc);
    }

    pub(crate) fn on_make_closed(&mut self, resources: &ResourceTable) -> ExpectedOutcome {
        let Task { targets, kind, .. } = self;
        kind.behavior_mut().on_make_closed(targets, resources)
    }

    pub(crate) fn pre_prepare(&mut self) {
        self.kind.behavior_mut().pre_prepare();
    }

    pub(crate) fn prepare(&mut self, state: &mut FlushState<'_>) {
        let Task { targets, kind, .. } = self;
        kind.behavior_mut().prepare(targets, state);
    }

    pub(crate) fn execute(&mut self, state: &mut FlushState<'_>) -> bool {
        let Task { targets, kind, .. } = self;
        kind.behavior_mut().execute(targets, state)
    }

    pub(crate) fn end_flush(&mut self) {
        self.kind.behavior_mut().end_flush();
    }

    pub(crate) fn make_skippable(&mut self) {
        self.flags.skippable = true;
        self.kind.behavior_mut().make_skippable();
    }

    /// Rewrite resource references after importing into another resource table.
    pub(crate) fn remap_resources(&mut self, map: &[ResourceId]) {
        for t in &mut self.targets {
            *t = map[t.0 as usize];
        }
        self.kind.behavior_mut().remap_resources(map);
    }

    /// One-line, address-free description used by dumps.
    pub(crate) fn describe(&self) -> String {
        let mut flags = String::new();
        for (set, c) in [
            (self.flags.closed, 'C'),
            (self.flags.blocks_reordering, 'B'),
            (self.flags.requires_explicit_cleanup, 'E'),
            (self.flags.atlas, 'A'),
            (self.flags.skippable, 'S'),
        ] {
            flags.push(if set { c } else { '-' });
        }
        let targets: Vec<String> = self.targets.iter().map(ToString::to_string).collect();
        let deps: Vec<String> = self.dependencies.iter().map(ToString::to_string).collect();
        format!(
            "{} {} [{}] targets=[{}] deps=[{}]",
            self.id,
            self.name(),
            flags,
            targets.join(","),
            deps.join(",")
        )
    }
}

pub(crate) fn remap(map: &[ResourceId], id: ResourceId) -> ResourceId {
    map[id.0 as usize]
}

#[cfg(test)]
#[path = "../../tests/unit/task/task.rs"]
mod tests;
