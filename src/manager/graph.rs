use crate::foundation::error::{FlushError, FlushResult};
use crate::foundation::geom::IRect;
use crate::foundation::ids::{BackingId, ResourceId, TaskId};
use crate::resource::desc::Mipmapped;
use crate::resource::table::ResourceTable;
use crate::schedule::topo::sort_partitions;
use crate::task::resolve::{ResolveEntry, TextureResolveTask};
use crate::task::{ExpectedOutcome, Task, TaskKind};
use std::collections::HashMap;

/// The task list and the side tables used to wire it.
///
/// Owns every live task (`tasks`), their execution order (`dag`), the positions of reorder
/// barriers, the single open drawing task and the last task that wrote each resource. Nothing
/// here touches a device, so recorders and on-flush providers share it.
#[derive(Debug, Default)]
pub(crate) struct TaskDag {
    pub(crate) resources: ResourceTable,
    pub(crate) tasks: HashMap<TaskId, Task>,
    pub(crate) dag: Vec<TaskId>,
    pub(crate) reorder_barriers: Vec<usize>,
    pub(crate) active_task: Option<TaskId>,
    pub(crate) last_task: HashMap<ResourceId, TaskId>,
    next_task_id: u32,
}

impl TaskDag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn new_task(&mut self, kind: TaskKind) -> Task {
        let id = TaskId(self.next_task_id);
        self.next_task_id = self.next_task_id.saturating_add(1);
        Task::new(id, kind)
    }

    pub(crate) fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    fn task_mut(&mut self, id: TaskId) -> &mut Task {
        match self.tasks.get_mut(&id) {
            Some(t) => t,
            None => panic!("{id} is not in the task list"),
        }
    }

    pub(crate) fn check_resource(&self, id: ResourceId) -> FlushResult<()> {
        if self.resources.contains(id) {
            Ok(())
        } else {
            Err(FlushError::validation(format!("unknown resource {id}")))
        }
    }

    pub(crate) fn check_surface(&self, id: ResourceId) -> FlushResult<IRect> {
        self.check_resource(id)?;
        self.resources
            .desc(id)
            .bounds()
            .ok_or_else(|| FlushError::validation(format!("{id} is not a surface")))
    }

    pub(crate) fn check_buffer(&self, id: ResourceId) -> FlushResult<usize> {
        self.check_resource(id)?;
        self.resources
            .desc(id)
            .buffer_size()
            .ok_or_else(|| FlushError::validation(format!("{id} is not a buffer")))
    }

    /// Append `task` to the list; barriers record their position. `None` is ignored.
    pub(crate) fn append_task(&mut self, task: Option<Task>) -> Option<TaskId> {
        task.map(|t| self.push_task(t))
    }

    pub(crate) fn push_task(&mut self, task: Task) -> TaskId {
        let id = task.id;
        if task.blocks_reordering() {
            self.reorder_barriers.push(self.dag.len());
        }
        self.dag.push(id);
        self.tasks.insert(id, task);
        id
    }

    /// Insert `task` just ahead of the last task so an open task stays at the tail.
    pub(crate) fn insert_task_before_last(&mut self, task: Option<Task>) -> Option<TaskId> {
        task.map(|t| self.insert_before_last(t))
    }

    pub(crate) fn insert_before_last(&mut self, task: Task) -> TaskId {
        let id = task.id;
        let Some(last) = self.dag.len().checked_sub(1) else {
            self.dag.push(id);
            self.tasks.insert(id, task);
            return id;
        };
        // The old tail shifts one slot; a barrier sitting there moves with it.
        if let Some(b) = self.reorder_barriers.last_mut()
            && *b == last
        {
            *b += 1;
        }
        self.dag.insert(last, id);
        self.tasks.insert(id, task);
        id
    }

    /// `dependent` executes after `on`.
    pub(crate) fn add_dependency_edge(&mut self, dependent: TaskId, on: TaskId) {
        if self.task_mut(dependent).add_dependency_edge(on) {
            self.task_mut(on).add_dependent_edge(dependent);
        }
    }

    /// Make `task` the writer of `resource`, ordered after (and closing) the previous writer.
    pub(crate) fn add_target(&mut self, task: TaskId, resource: ResourceId) {
        if let Some(prev) = self.last_task.get(&resource).copied()
            && prev != task
            && self.tasks.contains_key(&prev)
        {
            if !self.tasks[&prev].is_atlas() {
                self.make_closed(prev);
            }
            self.add_dependency_edge(task, prev);
        }
        self.last_task.insert(resource, task);
        self.task_mut(task).targets.push(resource);
    }

    /// Wire `task` to read the current contents of `resource`.
    ///
    /// Depends on (and closes) the last writer. When the read needs an MSAA resolve or fresh
    /// mips, a resolve task is inserted ahead of `task` instead and `task` picks it up on close.
    pub(crate) fn add_dependency_on_resource(
        &mut self,
        task: TaskId,
        resource: ResourceId,
        mipmapped: Mipmapped,
    ) {
        let mut depended_on = self.last_task.get(&resource).copied();
        if depended_on == Some(task) {
            return;
        }
        if let Some(d) = depended_on {
            let t = &self.tasks[&task];
            if t.depends_on(d) || t.resolve_task == Some(d) {
                depended_on = None;
            } else if self.tasks.get(&d).is_some_and(|dt| !dt.is_atlas()) {
                self.make_closed(d);
            }
        }

        let entry = self.resources.entry(resource);
        let msaa = if entry.desc().requires_manual_msaa_resolve() {
            entry.msaa_dirty_rect()
        } else {
            None
        };
        let mipmaps = mipmapped == Mipmapped::Yes
            && entry.desc().mipmapped() == Mipmapped::Yes
            && entry.mipmaps_dirty();

        if msaa.is_some() || mipmaps {
            let fresh = self.tasks[&task]
                .resolve_task
                .is_none()
                .then(|| self.new_task(TaskKind::Resolve(TextureResolveTask::new())));
            if let Some(r) = self.insert_task_before_last(fresh) {
                self.task_mut(task).resolve_task = Some(r);
            }
            if let Some(resolve) = self.tasks[&task].resolve_task {
                self.resolve_into(resolve, resource, msaa, mipmaps);
            }
            // The resolve task depends on the last writer and runs before `task`.
            depended_on = None;
        }

        if let Some(d) = depended_on {
            self.add_dependency_edge(task, d);
        }
    }

    /// Add `resource` to a resolve task: it reads the current contents and becomes the writer.
    pub(crate) fn resolve_into(
        &mut self,
        resolve: TaskId,
        resource: ResourceId,
        msaa: Option<IRect>,
        mipmaps: bool,
    ) {
        if msaa.is_some() {
            self.resources.mark_msaa_resolved(resource);
        }
        if mipmaps {
            self.resources.mark_mipmaps_clean(resource);
        }
        if let TaskKind::Resolve(r) = &mut self.task_mut(resolve).kind {
            r.push(ResolveEntry {
                resource,
                msaa,
                mipmaps,
            });
        }
        self.add_dependency_on_resource(resolve, resource, Mipmapped::No);
        self.add_target(resolve, resource);
    }

    /// Freeze a task's content and dependencies.
    pub(crate) fn make_closed(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if task.is_closed() {
            return;
        }
        if let ExpectedOutcome::TargetDirty(rect) = task.on_make_closed(&self.resources)
            && let Some(&target) = task.targets.first()
        {
            if self.resources.requires_manual_msaa_resolve(target) {
                self.resources.mark_msaa_dirty(target, rect);
            }
            self.resources.mark_mipmaps_dirty(target);
        }
        let resolve = self.task_mut(id).resolve_task.take();
        if let Some(r) = resolve {
            self.add_dependency_edge(id, r);
            self.make_closed(r);
        }
        self.task_mut(id).flags.closed = true;
    }

    pub(crate) fn close_active_task(&mut self) {
        if let Some(active) = self.active_task.take() {
            self.make_closed(active);
        }
    }

    pub(crate) fn close_all_tasks(&mut self) {
        for i in 0..self.dag.len() {
            let id = self.dag[i];
            self.make_closed(id);
        }
        self.active_task = None;
    }

    pub(crate) fn sort_tasks(&mut self) {
        sort_partitions(&mut self.dag, &self.reorder_barriers, &self.tasks);
    }

    /// Return `true` if any task in the list writes or reads `resource`.
    pub(crate) fn is_used_by_any(&self, resource: ResourceId) -> bool {
        self.dag
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .any(|t| t.is_used(resource))
    }

    /// Tear the list down after a flush and return the transient backings to give back.
    ///
    /// Draws and tasks that ask for it get [`Task::end_flush`] before they are dropped.
    pub(crate) fn remove_render_tasks(&mut self) -> Vec<BackingId> {
        for id in self.dag.drain(..) {
            let Some(mut task) = self.tasks.remove(&id) else {
                continue;
            };
            if task.requires_explicit_cleanup() || task.as_draw().is_some() {
                task.end_flush();
            }
        }
        self.tasks.clear();
        self.reorder_barriers.clear();
        self.last_task.clear();
        self.active_task = None;
        self.resources.release_transients()
    }

    /// Check the structural invariants of the list.
    pub(crate) fn validate(&self) -> FlushResult<()> {
        if self.tasks.len() != self.dag.len() {
            return Err(FlushError::validation(format!(
                "{} tasks owned but {} listed",
                self.tasks.len(),
                self.dag.len()
            )));
        }
        if let Some(active) = self.active_task {
            if self.dag.last() != Some(&active) {
                return Err(FlushError::validation(format!(
                    "active task {active} is not at the tail"
                )));
            }
            if self.tasks[&active].is_closed() {
                return Err(FlushError::validation(format!("active task {active} is closed")));
            }
        }
        for id in &self.dag {
            let Some(t) = self.tasks.get(id) else {
                return Err(FlushError::validation(format!("{id} is listed but not owned")));
            };
            if Some(*id) != self.active_task && !t.is_closed() && !t.is_atlas() {
                return Err(FlushError::validation(format!("{id} is open but not active")));
            }
            for dep in t.dependencies() {
                if dep == id {
                    return Err(FlushError::validation(format!("{id} depends on itself")));
                }
                if let Some(d) = self.tasks.get(dep)
                    && !d.dependents().contains(id)
                {
                    return Err(FlushError::validation(format!(
                        "{dep} does not list {id} as a dependent"
                    )));
                }
            }
        }
        for &b in &self.reorder_barriers {
            let blocks = self
                .dag
                .get(b)
                .and_then(|id| self.tasks.get(id))
                .is_some_and(Task::blocks_reordering);
            if !blocks {
                return Err(FlushError::validation(format!(
                    "reorder barrier at {b} is not a blocking task"
                )));
            }
        }
        Ok(())
    }

    /// Deterministic, address-free listing.
    pub(crate) fn dump(&self) -> String {
        let mut out = String::new();
        for (pos, id) in self.dag.iter().enumerate() {
            let Some(t) = self.tasks.get(id) else {
                continue;
            };
            out.push_str(&format!("{pos:>3}: {}", t.describe()));
            if self.active_task == Some(*id) {
                out.push_str(" (active)");
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manager/graph.rs"]
mod tests;
