//! Task construction on the task list: validation of caller input, then wiring.

use crate::device::command::{LoadOp, Semaphore};
use crate::foundation::error::{FlushError, FlushResult};
use crate::foundation::geom::IRect;
use crate::foundation::ids::{ResourceId, TaskId};
use crate::manager::graph::TaskDag;
use crate::resource::desc::Mipmapped;
use crate::task::buffer::{BufferTransferTask, BufferUpdateTask};
use crate::task::copy::CopyTask;
use crate::task::draw::{DrawOp, DrawTask};
use crate::task::resolve::{ResolveFlags, TextureResolveTask};
use crate::task::subgraph::{SubGraphTask, TaskGraph};
use crate::task::transfer::TransferFromSurfaceTask;
use crate::task::wait::WaitTask;
use crate::task::write_pixels::WritePixelsTask;
use crate::task::{Task, TaskKind};

fn within(outer: IRect, r: IRect, what: &str) -> FlushResult<()> {
    if r.is_empty() || !outer.contains(r) {
        return Err(FlushError::validation(format!(
            "{what} {r:?} is empty or outside {outer:?}"
        )));
    }
    Ok(())
}

fn byte_range(offset: usize, size: usize, capacity: usize, what: &str) -> FlushResult<()> {
    match offset.checked_add(size) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(FlushError::validation(format!(
            "{what} range {offset}+{size} exceeds {capacity} bytes"
        ))),
    }
}

impl TaskDag {
    fn open_draw(&mut self, task: TaskId) -> FlushResult<&mut DrawTask> {
        let Some(t) = self.tasks.get_mut(&task) else {
            return Err(FlushError::validation(format!("unknown task {task}")));
        };
        if t.is_closed() {
            return Err(FlushError::validation(format!("{task} is closed")));
        }
        t.as_draw_mut()
            .ok_or_else(|| FlushError::validation(format!("{task} is not a drawing task")))
    }

    fn draw_target_bounds(&self, task: TaskId) -> IRect {
        self.tasks
            .get(&task)
            .and_then(|t| t.targets().first())
            .and_then(|&r| self.resources.desc(r).bounds())
            .unwrap_or(IRect::EMPTY)
    }

    /// Close the active task and open a drawing task on `target`.
    pub(crate) fn new_drawing_task(
        &mut self,
        target: ResourceId,
        recording_group: u32,
    ) -> FlushResult<TaskId> {
        self.check_surface(target)?;
        self.close_active_task();
        let task = self.new_task(TaskKind::Draw(DrawTask::new(recording_group)));
        let id = self.push_task(task);
        self.add_target(id, target);
        self.active_task = Some(id);
        Ok(id)
    }

    /// Record `op` into an open drawing task, wiring a read of every resource it samples.
    pub(crate) fn record_draw(&mut self, task: TaskId, op: DrawOp) -> FlushResult<()> {
        self.open_draw(task)?;
        for s in &op.sampled {
            self.check_surface(s.resource)?;
        }
        for s in &op.sampled {
            self.add_dependency_on_resource(task, s.resource, s.mipmapped);
        }
        self.open_draw(task)?.record(op);
        Ok(())
    }

    pub(crate) fn set_load_op(&mut self, task: TaskId, op: LoadOp) -> FlushResult<()> {
        let bounds = self.draw_target_bounds(task);
        self.open_draw(task)?.set_load_op(op, bounds);
        Ok(())
    }

    pub(crate) fn discard(&mut self, task: TaskId) -> FlushResult<()> {
        self.open_draw(task)?.discard();
        Ok(())
    }

    pub(crate) fn set_cannot_merge_backward(&mut self, task: TaskId, v: bool) -> FlushResult<()> {
        self.open_draw(task)?.set_cannot_merge_backward(v);
        Ok(())
    }

    /// Gate later consumers of `resource` behind `semaphores`.
    pub(crate) fn new_wait_task(
        &mut self,
        resource: ResourceId,
        semaphores: Vec<Semaphore>,
    ) -> FlushResult<TaskId> {
        self.check_resource(resource)?;
        let mut wait = self.new_task(TaskKind::Wait(WaitTask::new(resource, semaphores)));

        let active_on_resource = self
            .active_task
            .filter(|a| self.tasks[a].targets().first() == Some(&resource));
        let id = if let Some(active) = active_on_resource {
            // Keep the active task open; the wait slots in ahead of it with the same
            // dependencies so it is not pulled earlier than the work it gates.
            let inherited: Vec<TaskId> = self.tasks[&active].dependencies().to_vec();
            let id = self.insert_before_last(wait);
            for d in inherited {
                self.add_dependency_edge(id, d);
            }
            self.add_dependency_edge(active, id);
            id
        } else {
            wait.flags.blocks_reordering = true;
            let last = self.last_task.get(&resource).copied();
            self.close_active_task();
            let id = self.push_task(wait);
            if let Some(last) = last
                && self.tasks.contains_key(&last)
            {
                self.add_dependency_edge(id, last);
            }
            self.last_task.insert(resource, id);
            id
        };
        self.make_closed(id);
        Ok(id)
    }

    /// Copy a region of `src` into `dst`. `Ok(None)` when `src` cannot be read back.
    pub(crate) fn new_copy_task(
        &mut self,
        src: ResourceId,
        src_rect: IRect,
        dst: ResourceId,
        dst_rect: IRect,
    ) -> FlushResult<Option<TaskId>> {
        let src_bounds = self.check_surface(src)?;
        let dst_bounds = self.check_surface(dst)?;
        within(src_bounds, src_rect, "copy source rect")?;
        within(dst_bounds, dst_rect, "copy destination rect")?;
        if src_rect.width() != dst_rect.width() || src_rect.height() != dst_rect.height() {
            return Err(FlushError::validation(format!(
                "copy rects differ in size: {src_rect:?} vs {dst_rect:?}"
            )));
        }
        if self.resources.entry(src).is_framebuffer_only() {
            tracing::debug!(%src, "copy from framebuffer-only surface dropped");
            return Ok(None);
        }

        self.close_active_task();
        let task = self.new_task(TaskKind::Copy(CopyTask::new(src, src_rect, dst_rect)));
        let id = self.push_task(task);
        self.add_target(id, dst);
        // Only the base level is copied.
        self.add_dependency_on_resource(id, src, Mipmapped::No);
        self.make_closed(id);
        Ok(Some(id))
    }

    fn push_barrier(&mut self, mut task: Task) -> TaskId {
        task.flags.blocks_reordering = true;
        self.close_active_task();
        let id = self.push_task(task);
        self.make_closed(id);
        id
    }

    pub(crate) fn new_buffer_transfer_task(
        &mut self,
        src: ResourceId,
        src_offset: usize,
        dst: ResourceId,
        dst_offset: usize,
        size: usize,
    ) -> FlushResult<TaskId> {
        let src_size = self.check_buffer(src)?;
        let dst_size = self.check_buffer(dst)?;
        if src == dst {
            return Err(FlushError::validation(format!(
                "buffer transfer from {src} into itself"
            )));
        }
        byte_range(src_offset, size, src_size, "transfer source")?;
        byte_range(dst_offset, size, dst_size, "transfer destination")?;
        let task = self.new_task(TaskKind::BufferTransfer(BufferTransferTask::new(
            src, src_offset, dst, dst_offset, size,
        )));
        Ok(self.push_barrier(task))
    }

    pub(crate) fn new_buffer_update_task(
        &mut self,
        dst: ResourceId,
        offset: usize,
        data: Vec<u8>,
    ) -> FlushResult<TaskId> {
        let dst_size = self.check_buffer(dst)?;
        byte_range(offset, data.len(), dst_size, "buffer update")?;
        let task = self.new_task(TaskKind::BufferUpdate(BufferUpdateTask::new(dst, offset, data)));
        Ok(self.push_barrier(task))
    }

    pub(crate) fn new_transfer_from_surface_task(
        &mut self,
        src: ResourceId,
        rect: IRect,
        dst: ResourceId,
        dst_offset: usize,
    ) -> FlushResult<TaskId> {
        let bounds = self.check_surface(src)?;
        within(bounds, rect, "transfer rect")?;
        let dst_size = self.check_buffer(dst)?;
        let bpp = self.resources.desc(src).bytes_per_pixel();
        let bytes = (rect.width() as usize)
            .saturating_mul(rect.height() as usize)
            .saturating_mul(bpp);
        byte_range(dst_offset, bytes, dst_size, "transfer destination")?;

        self.close_active_task();
        let task = self.new_task(TaskKind::TransferFromSurface(TransferFromSurfaceTask::new(
            src, rect, dst, dst_offset,
        )));
        let id = self.push_task(task);
        self.add_dependency_on_resource(id, src, Mipmapped::No);
        self.make_closed(id);
        Ok(id)
    }

    pub(crate) fn check_write_pixels(
        &self,
        dst: ResourceId,
        rect: IRect,
        levels: &[Vec<u8>],
    ) -> FlushResult<()> {
        let bounds = self.check_surface(dst)?;
        within(bounds, rect, "write rect")?;
        if levels.is_empty() {
            return Err(FlushError::validation("write_pixels needs at least one level"));
        }
        let need = (rect.width() as usize)
            .saturating_mul(rect.height() as usize)
            .saturating_mul(self.resources.desc(dst).bytes_per_pixel());
        if levels[0].len() < need {
            return Err(FlushError::validation(format!(
                "base level holds {} bytes, {need} needed",
                levels[0].len()
            )));
        }
        Ok(())
    }

    pub(crate) fn new_write_pixels_task(
        &mut self,
        dst: ResourceId,
        rect: IRect,
        levels: Vec<Vec<u8>>,
    ) -> FlushResult<TaskId> {
        self.check_write_pixels(dst, rect, &levels)?;
        self.close_active_task();
        let task = self.new_task(TaskKind::WritePixels(WritePixelsTask::new(rect, levels)));
        let id = self.push_task(task);
        self.add_target(id, dst);
        self.make_closed(id);
        Ok(id)
    }

    /// Resolve `resource` now. `Ok(None)` when there is nothing to resolve.
    pub(crate) fn new_texture_resolve_task(
        &mut self,
        resource: ResourceId,
        flags: ResolveFlags,
    ) -> FlushResult<Option<TaskId>> {
        self.check_surface(resource)?;
        if !self.resources.requires_manual_msaa_resolve(resource) || flags.is_empty() {
            return Ok(None);
        }
        let last_open = self
            .last_task
            .get(&resource)
            .and_then(|t| self.tasks.get(t))
            .is_some_and(|t| !t.is_closed());
        if self.resources.entry(resource).msaa_dirty_rect().is_none() && !last_open {
            return Ok(None);
        }

        self.close_active_task();
        if let Some(&last) = self.last_task.get(&resource) {
            self.make_closed(last);
        }
        let entry = self.resources.entry(resource);
        let msaa = if flags.msaa { entry.msaa_dirty_rect() } else { None };
        let mipmaps = flags.mipmaps
            && entry.desc().mipmapped() == Mipmapped::Yes
            && entry.mipmaps_dirty();
        let task = (msaa.is_some() || mipmaps)
            .then(|| self.new_task(TaskKind::Resolve(TextureResolveTask::new())));
        let Some(id) = self.append_task(task) else {
            return Ok(None);
        };
        self.resolve_into(id, resource, msaa, mipmaps);
        self.make_closed(id);
        Ok(Some(id))
    }

    /// Open an atlas drawing task on `target`, retiring `previous`.
    ///
    /// Every user of the previous atlas is closed and becomes a dependency of the new one, so at
    /// most one atlas is in service at a time.
    pub(crate) fn new_atlas_task(
        &mut self,
        target: ResourceId,
        previous: Option<TaskId>,
    ) -> FlushResult<TaskId> {
        self.check_surface(target)?;
        if let Some(p) = previous
            && !self.tasks.get(&p).is_some_and(Task::is_atlas)
        {
            return Err(FlushError::validation(format!("{p} is not a live atlas task")));
        }

        let mut atlas = self.new_task(TaskKind::Draw(DrawTask::new(0)));
        atlas.flags.atlas = true;
        let id = self.insert_before_last(atlas);

        if let Some(p) = previous {
            self.make_closed(p);
            let users: Vec<TaskId> = self.tasks[&p].dependents().to_vec();
            for user in users {
                if user == id {
                    continue;
                }
                self.add_dependency_edge(id, user);
                self.make_closed(user);
                if self.active_task == Some(user) {
                    self.active_task = None;
                }
            }
        }
        self.add_target(id, target);
        Ok(id)
    }

    /// Drop a closed task's content; it stays in the list but issues nothing.
    pub(crate) fn make_skippable(&mut self, task: TaskId) -> FlushResult<()> {
        let Some(t) = self.tasks.get_mut(&task) else {
            return Err(FlushError::validation(format!("unknown task {task}")));
        };
        if !t.is_closed() {
            return Err(FlushError::validation(format!(
                "{task} must be closed before it is made skippable"
            )));
        }
        if !t.is_skippable() {
            t.make_skippable();
        }
        Ok(())
    }

    /// Splice a detached graph in as one closed node writing `dest`.
    pub(crate) fn new_subgraph_task(
        &mut self,
        graph: TaskGraph,
        dest: ResourceId,
    ) -> FlushResult<TaskId> {
        self.check_surface(dest)?;
        if let Some(t) = graph.target
            && !graph.resources.contains(t)
        {
            return Err(FlushError::validation(format!(
                "recorded target {t} is not in the recorded resources"
            )));
        }
        self.close_active_task();

        if let Some(t) = graph.target {
            let recorded = graph.resources.entry(t);
            if let Some(rect) = recorded.msaa_dirty_rect()
                && self.resources.requires_manual_msaa_resolve(dest)
            {
                self.resources.mark_msaa_dirty(dest, rect);
            }
        }
        self.resources.mark_mipmaps_dirty(dest);

        let map = self
            .resources
            .import(&graph.resources, graph.target.map(|t| (t, dest)));
        let mut inner = graph.tasks;
        for t in &mut inner {
            t.remap_resources(&map);
        }
        let inner_targets: Vec<ResourceId> = inner
            .iter()
            .flat_map(|t| t.targets().iter().copied())
            .filter(|&r| r != dest)
            .collect();

        let mut task = self.new_task(TaskKind::SubGraph(SubGraphTask::new(inner)));
        task.flags.requires_explicit_cleanup = true;
        let id = self.push_task(task);
        self.add_target(id, dest);
        for r in inner_targets {
            self.last_task.insert(r, id);
        }
        self.make_closed(id);
        Ok(id)
    }

    /// Close, sort and move every task out into a [`TaskGraph`]. The list starts over empty.
    pub(crate) fn detach(&mut self, target: Option<ResourceId>) -> FlushResult<TaskGraph> {
        if let Some(t) = target {
            self.check_surface(t)?;
        }
        self.close_all_tasks();
        self.sort_tasks();
        let mut tasks = Vec::with_capacity(self.dag.len());
        for id in self.dag.drain(..) {
            if let Some(t) = self.tasks.remove(&id) {
                tasks.push(t);
            }
        }
        self.reorder_barriers.clear();
        self.last_task.clear();
        Ok(TaskGraph {
            tasks,
            resources: std::mem::take(&mut self.resources),
            target,
        })
    }
}
