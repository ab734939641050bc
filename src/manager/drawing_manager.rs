use crate::alloc::contract::ResourceAllocator;
use crate::alloc::interval::IntervalAllocator;
use crate::device::backend::Device;
use crate::device::command::{LoadOp, Semaphore, SurfaceAccess};
use crate::device::flush_state::{StagingPool, TokenTracker};
use crate::device::headless::HeadlessDevice;
use crate::foundation::error::{FlushError, FlushResult};
use crate::foundation::geom::IRect;
use crate::foundation::ids::{BackingId, ResourceId, TaskId};
use crate::manager::flush::{FlushInfo, FlushStats};
use crate::manager::graph::TaskDag;
use crate::manager::on_flush::OnFlushCallback;
use crate::manager::options::{DrawingManagerOpts, max_cached_staging_buffers};
use crate::resource::desc::ResourceDesc;
use crate::resource::table::ResourceTable;
use crate::task::Task;
use crate::task::draw::DrawOp;
use crate::task::resolve::ResolveFlags;
use crate::task::subgraph::TaskGraph;

/// Builds the task graph for one device and drives it through flushes.
///
/// Producers create resources and tasks through the `new_*` factories; every factory closes the
/// active drawing task unless it explicitly keeps it open. [`DrawingManager::flush`] closes and
/// sorts the list, assigns backing memory, executes every instantiated task in order and tears
/// the list down again.
///
/// A manager built with [`DrawingManager::recorder`] has no device: it records and detaches task
/// graphs for later replay but cannot flush.
pub struct DrawingManager<D: Device = HeadlessDevice> {
    pub(crate) opts: DrawingManagerOpts,
    pub(crate) device: Option<D>,
    pub(crate) graph: TaskDag,
    pub(crate) allocator: Box<dyn ResourceAllocator>,
    pub(crate) on_flush_callbacks: Vec<Box<dyn OnFlushCallback>>,
    pub(crate) tokens: TokenTracker,
    pub(crate) staging: StagingPool,
    pub(crate) flushing: bool,
    pub(crate) stats: FlushStats,
}

impl<D: Device> DrawingManager<D> {
    /// Manager that flushes to `device`.
    pub fn new(device: D, opts: DrawingManagerOpts) -> Self {
        let staging =
            StagingPool::new(max_cached_staging_buffers(device.caps().prefer_client_side_dynamic_buffers));
        Self::build(Some(device), opts, staging)
    }

    /// Device-less manager used to record a [`TaskGraph`].
    pub fn recorder(opts: DrawingManagerOpts) -> Self {
        Self::build(None, opts, StagingPool::new(max_cached_staging_buffers(false)))
    }

    fn build(device: Option<D>, opts: DrawingManagerOpts, staging: StagingPool) -> Self {
        Self {
            opts,
            device,
            graph: TaskDag::new(),
            allocator: Box::new(IntervalAllocator::new()),
            on_flush_callbacks: Vec::new(),
            tokens: TokenTracker::default(),
            staging,
            flushing: false,
            stats: FlushStats::default(),
        }
    }

    /// Scheduling options.
    pub fn opts(&self) -> &DrawingManagerOpts {
        &self.opts
    }

    /// The device, unless this is a recorder.
    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    /// Mutable access to the device, unless this is a recorder.
    pub fn device_mut(&mut self) -> Option<&mut D> {
        self.device.as_mut()
    }

    /// Counters accumulated over every flush.
    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    /// Replace the allocator used by subsequent flushes.
    pub fn set_allocator(&mut self, allocator: Box<dyn ResourceAllocator>) {
        self.allocator = allocator;
    }

    /// Register a callback run around every flush, in registration order.
    pub fn add_on_flush_callback(&mut self, callback: Box<dyn OnFlushCallback>) {
        self.on_flush_callbacks.push(callback);
    }

    /// Declared resources.
    pub fn resources(&self) -> &ResourceTable {
        &self.graph.resources
    }

    /// Declare a resource. Backing memory is assigned at flush time.
    pub fn create_resource(&mut self, desc: ResourceDesc) -> ResourceId {
        self.graph.resources.create(desc)
    }

    /// Declare a resource whose backing is owned outside the scheduler.
    pub fn wrap_resource(&mut self, desc: ResourceDesc, backing: BackingId) -> ResourceId {
        self.graph.resources.wrap(desc, backing)
    }

    /// Mark a surface as write-only; copies out of it are dropped.
    pub fn set_framebuffer_only(&mut self, id: ResourceId, framebuffer_only: bool) -> FlushResult<()> {
        self.graph.check_surface(id)?;
        self.graph.resources.set_framebuffer_only(id, framebuffer_only);
        Ok(())
    }

    /// Look up a live task.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.graph.task(id)
    }

    /// Task ids in list order.
    pub fn task_ids(&self) -> &[TaskId] {
        &self.graph.dag
    }

    /// Tasks in list order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.graph.dag.iter().filter_map(|id| self.graph.tasks.get(id))
    }

    /// List positions of the reorder barriers.
    pub fn reorder_barriers(&self) -> &[usize] {
        &self.graph.reorder_barriers
    }

    /// The open drawing task, if any. Always the last task in the list.
    pub fn active_task(&self) -> Option<TaskId> {
        self.graph.active_task
    }

    /// Most recent task that wrote `resource`.
    pub fn last_task_for(&self, resource: ResourceId) -> Option<TaskId> {
        self.graph.last_task.get(&resource).copied()
    }

    /// Close the active drawing task, if any.
    pub fn close_active_task(&mut self) {
        self.graph.close_active_task();
    }

    /// Open a drawing task on `target` in recording group 0.
    pub fn new_drawing_task(&mut self, target: ResourceId) -> FlushResult<TaskId> {
        self.graph.new_drawing_task(target, 0)
    }

    /// Open a drawing task on `target`. Only tasks of the same group may be merged.
    pub fn new_drawing_task_in_group(
        &mut self,
        target: ResourceId,
        recording_group: u32,
    ) -> FlushResult<TaskId> {
        self.graph.new_drawing_task(target, recording_group)
    }

    /// Record a draw into an open drawing (or atlas) task.
    pub fn record_draw(&mut self, task: TaskId, op: DrawOp) -> FlushResult<()> {
        self.graph.record_draw(task, op)
    }

    /// Set the load op of an open drawing task. Clearing dirties the whole target.
    pub fn set_load_op(&mut self, task: TaskId, op: LoadOp) -> FlushResult<()> {
        self.graph.set_load_op(task, op)
    }

    /// Discard the target's contents. Ignored once the task has draws.
    pub fn discard(&mut self, task: TaskId) -> FlushResult<()> {
        self.graph.discard(task)
    }

    /// Forbid folding `task` into an earlier task on the same target.
    pub fn set_cannot_merge_backward(&mut self, task: TaskId, v: bool) -> FlushResult<()> {
        self.graph.set_cannot_merge_backward(task, v)
    }

    /// Gate later consumers of `resource` behind external semaphores.
    pub fn new_wait_task(
        &mut self,
        resource: ResourceId,
        semaphores: Vec<Semaphore>,
    ) -> FlushResult<TaskId> {
        self.graph.new_wait_task(resource, semaphores)
    }

    /// Copy a surface region. `Ok(None)` when the source is framebuffer-only.
    pub fn new_copy_task(
        &mut self,
        src: ResourceId,
        src_rect: IRect,
        dst: ResourceId,
        dst_rect: IRect,
    ) -> FlushResult<Option<TaskId>> {
        self.graph.new_copy_task(src, src_rect, dst, dst_rect)
    }

    /// Copy bytes between buffers. Always a reorder barrier.
    pub fn new_buffer_transfer_task(
        &mut self,
        src: ResourceId,
        src_offset: usize,
        dst: ResourceId,
        dst_offset: usize,
        size: usize,
    ) -> FlushResult<TaskId> {
        self.graph
            .new_buffer_transfer_task(src, src_offset, dst, dst_offset, size)
    }

    /// Write host bytes into a buffer. Always a reorder barrier.
    pub fn new_buffer_update_task(
        &mut self,
        dst: ResourceId,
        offset: usize,
        data: Vec<u8>,
    ) -> FlushResult<TaskId> {
        self.graph.new_buffer_update_task(dst, offset, data)
    }

    /// Read a surface region into a buffer.
    pub fn new_transfer_from_surface_task(
        &mut self,
        src: ResourceId,
        rect: IRect,
        dst: ResourceId,
        dst_offset: usize,
    ) -> FlushResult<TaskId> {
        self.graph
            .new_transfer_from_surface_task(src, rect, dst, dst_offset)
    }

    /// Upload host pixels into a surface.
    ///
    /// Devices that prefer flushing over holding staging memory get everything recorded so far
    /// flushed first.
    pub fn new_write_pixels_task(
        &mut self,
        dst: ResourceId,
        rect: IRect,
        levels: Vec<Vec<u8>>,
    ) -> FlushResult<TaskId> {
        self.graph.check_write_pixels(dst, rect, &levels)?;
        self.graph.close_active_task();
        if self
            .device
            .as_ref()
            .is_some_and(|d| !d.caps().prefer_vram_use_over_flushes)
        {
            tracing::debug!(%dst, "flushing ahead of pixel upload");
            self.flush(&[], SurfaceAccess::NoAccess, FlushInfo::default(), None);
        }
        self.graph.new_write_pixels_task(dst, rect, levels)
    }

    /// Resolve MSAA and/or regenerate mips of `resource` now. `Ok(None)` when nothing is dirty.
    pub fn new_texture_resolve_task(
        &mut self,
        resource: ResourceId,
        flags: ResolveFlags,
    ) -> FlushResult<Option<TaskId>> {
        self.graph.new_texture_resolve_task(resource, flags)
    }

    /// Open an atlas task on `target`, retiring `previous` and every task that used it.
    pub fn new_atlas_task(
        &mut self,
        target: ResourceId,
        previous: Option<TaskId>,
    ) -> FlushResult<TaskId> {
        self.graph.new_atlas_task(target, previous)
    }

    /// Drop the content of a closed task.
    pub fn make_skippable(&mut self, task: TaskId) -> FlushResult<()> {
        self.graph.make_skippable(task)
    }

    /// Replay a recorded graph into `dest` as a single closed task.
    pub fn new_subgraph_task(&mut self, graph: TaskGraph, dest: ResourceId) -> FlushResult<TaskId> {
        self.graph.new_subgraph_task(graph, dest)
    }

    /// Close, sort and hand over everything recorded so far, resources included.
    ///
    /// `target` names the recorded surface that replay redirects to its destination.
    pub fn detach_task_graph(&mut self, target: Option<ResourceId>) -> FlushResult<TaskGraph> {
        if self.flushing {
            return Err(FlushError::validation("cannot detach while flushing"));
        }
        self.graph.detach(target)
    }

    /// Close every task and sort the list the way the next flush will.
    pub fn close_and_sort(&mut self) {
        self.graph.close_all_tasks();
        self.graph.sort_tasks();
    }

    /// Check the task-list invariants.
    pub fn validate(&self) -> FlushResult<()> {
        self.graph.validate()
    }

    /// Address-free listing of the task list, one task per line.
    pub fn dump(&self) -> String {
        self.graph.dump()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manager/drawing_manager.rs"]
mod tests;
