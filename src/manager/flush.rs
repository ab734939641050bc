//! The flush protocol: close, sort, allocate, execute, hand off, tear down.

use crate::device::backend::{Device, FlushCallback};
use crate::device::command::{Command, SurfaceAccess, SurfaceLayout};
use crate::device::flush_state::FlushState;
use crate::foundation::ids::{BackingId, ResourceId};
use crate::manager::drawing_manager::DrawingManager;
use crate::manager::on_flush::OnFlushResourceProvider;
use crate::resource::desc::Mipmapped;
use crate::schedule::cluster::{cluster_span, merge_draw_tasks};

/// Caller-supplied extras of one flush.
///
/// Both callbacks fire exactly once per flush call: with `true` once the device has submitted (or
/// finished) the work, with `false` as soon as the flush is known to have failed.
#[derive(Default)]
pub struct FlushInfo {
    /// Semaphores to signal once the flushed work completes.
    pub num_semaphores: usize,
    /// Fired when the flushed work is submitted.
    pub submitted: Option<FlushCallback>,
    /// Fired when the flushed work is finished on the device.
    pub finished: Option<FlushCallback>,
}

impl std::fmt::Debug for FlushInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushInfo")
            .field("num_semaphores", &self.num_semaphores)
            .field("submitted", &self.submitted.is_some())
            .field("finished", &self.finished.is_some())
            .finish()
    }
}

/// Counters accumulated over the life of a [`DrawingManager`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FlushStats {
    /// Flushes that got past the entry guard.
    pub flushes: u64,
    /// Flushes whose pre-flush callbacks or allocation failed.
    pub failed_flushes: u64,
    /// Tasks whose `execute` issued work.
    pub tasks_executed: u64,
    /// Submissions forced by `max_tasks_before_submit`.
    pub intermediate_submits: u64,
    /// Flushes that ran in clustered order.
    pub reordered_dags: u64,
    /// Clustered orders discarded because they did not fit the memory budget.
    pub reordered_over_budget: u64,
    /// Drawing tasks folded into an earlier task on the same target.
    pub merged_tasks: u64,
}

/// Whether the semaphores requested by [`DrawingManager::flush_surfaces`] will be signalled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemaphoresSubmitted {
    /// They were handed to the device.
    Yes,
    /// The flush failed or the device cannot signal semaphores.
    No,
}

fn fail_callbacks(submitted: Option<FlushCallback>, finished: Option<FlushCallback>) {
    if let Some(cb) = submitted {
        cb(false);
    }
    if let Some(cb) = finished {
        cb(false);
    }
}

impl<D: Device> DrawingManager<D> {
    /// Execute everything recorded so far.
    ///
    /// `targets` names the surfaces the caller is about to consume; when none of them is touched
    /// by recorded work and nothing else was requested, the flush is a no-op success. Returns
    /// `false` when the flush was refused (already flushing, abandoned device, recorder) or when
    /// pre-flush callbacks or allocation failed.
    ///
    /// Once the flush gets past the refusal and no-op checks the task list is torn down, whether
    /// or not it succeeds. A refused or no-op flush leaves the list as it was.
    #[tracing::instrument(level = "debug", skip_all, fields(targets = targets.len()))]
    pub fn flush(
        &mut self,
        targets: &[ResourceId],
        access: SurfaceAccess,
        info: FlushInfo,
        layout: Option<SurfaceLayout>,
    ) -> bool {
        let FlushInfo {
            num_semaphores,
            submitted,
            finished,
        } = info;

        if self.flushing || self.device.as_ref().is_none_or(|d| d.is_abandoned()) {
            tracing::warn!(
                flushing = self.flushing,
                has_device = self.device.is_some(),
                "flush refused"
            );
            fail_callbacks(submitted, finished);
            return false;
        }

        if !targets.is_empty()
            && num_semaphores == 0
            && finished.is_none()
            && access == SurfaceAccess::NoAccess
            && layout.is_none()
            && !targets.iter().any(|&r| self.graph.is_used_by_any(r))
        {
            tracing::debug!("no recorded work touches the flushed surfaces");
            if let Some(cb) = submitted {
                cb(true);
            }
            return true;
        }

        let Some(mut device) = self.device.take() else {
            fail_callbacks(submitted, finished);
            return false;
        };
        self.flushing = true;
        let ok = self.flush_with(
            &mut device,
            targets,
            access,
            layout,
            num_semaphores,
            submitted,
            finished,
        );
        self.flushing = false;
        self.device = Some(device);
        ok
    }

    #[allow(clippy::too_many_arguments)]
    fn flush_with(
        &mut self,
        device: &mut D,
        targets: &[ResourceId],
        access: SurfaceAccess,
        layout: Option<SurfaceLayout>,
        num_semaphores: usize,
        submitted: Option<FlushCallback>,
        finished: Option<FlushCallback>,
    ) -> bool {
        self.stats.flushes += 1;
        self.graph.close_all_tasks();
        self.graph.sort_tasks();
        tracing::debug!(
            tasks = self.graph.dag.len(),
            barriers = self.graph.reorder_barriers.len(),
            "sorted task list"
        );

        let mut callbacks = std::mem::take(&mut self.on_flush_callbacks);
        let mut preflush_ok = true;
        {
            let mut provider = OnFlushResourceProvider::new(&mut self.graph, device);
            for cb in &mut callbacks {
                preflush_ok &= cb.pre_flush(&mut provider);
            }
        }
        self.graph.close_all_tasks();

        let mut alloc_failed = false;
        let mut executed = false;
        if preflush_ok {
            self.allocator.reset();
            let reordered = self.opts.reduce_task_splitting && self.reorder_tasks(device);
            if self.opts.reduce_task_splitting && !reordered {
                self.allocator.reset();
            }
            if !reordered {
                for id in &self.graph.dag {
                    if let Some(t) = self.graph.tasks.get(id) {
                        t.gather_intervals(self.allocator.as_mut());
                    }
                }
                self.allocator.plan_assignment(&self.graph.resources);
            }
            alloc_failed = !self.allocator.assign(&mut self.graph.resources, device)
                || self.allocator.failed_instantiation();
            if alloc_failed {
                tracing::warn!("resource allocation failed; nothing executes this flush");
            } else {
                executed = self.execute_render_tasks(device);
            }
        } else {
            tracing::warn!("pre-flush callback failed; skipping allocation and execution");
        }

        let flushed: Vec<BackingId> = targets
            .iter()
            .filter_map(|&r| self.graph.resources.backing(r))
            .collect();
        let released = self.graph.remove_render_tasks();
        let purge = executed || !released.is_empty() || !callbacks.is_empty();
        for b in released {
            device.release_backing(b);
        }
        self.allocator.reset();

        let ok = preflush_ok && !alloc_failed;
        if ok {
            device.execute_flush_info(&flushed, access, layout, num_semaphores, submitted, finished);
        } else {
            self.stats.failed_flushes += 1;
            fail_callbacks(submitted, finished);
        }

        let token = self.tokens.next_flush_token();
        for cb in &mut callbacks {
            cb.post_flush(token);
        }
        if purge {
            device.purge_as_needed();
        }

        // Callbacks cannot register more callbacks, so the list is restored as it was.
        self.on_flush_callbacks = callbacks;
        ok
    }

    /// Cluster each partition, dry-run the allocator over the new order and adopt it if it fits.
    ///
    /// On `false` the task list is untouched and the caller falls back to the sorted order.
    fn reorder_tasks(&mut self, device: &mut D) -> bool {
        let dag = &self.graph.dag;
        let mut order = Vec::with_capacity(dag.len());
        let mut clustered = false;
        let mut start = 0;
        for &b in &self.graph.reorder_barriers {
            clustered |= cluster_span(&dag[start..b], &self.graph.tasks, &mut order);
            order.push(dag[b]);
            start = b + 1;
        }
        clustered |= cluster_span(&dag[start..], &self.graph.tasks, &mut order);
        if !clustered {
            tracing::trace!("clustering left the order unchanged");
            return false;
        }

        for id in &order {
            if let Some(t) = self.graph.tasks.get(id) {
                t.gather_intervals(self.allocator.as_mut());
            }
        }
        if !self.allocator.plan_assignment(&self.graph.resources) {
            return false;
        }
        if !self.allocator.make_budget_headroom(device) {
            self.stats.reordered_over_budget += 1;
            tracing::warn!("clustered order exceeds the memory budget; keeping sorted order");
            return false;
        }

        self.graph.dag = order;
        let merged = merge_draw_tasks(
            &mut self.graph.dag,
            &mut self.graph.reorder_barriers,
            &mut self.graph.tasks,
        );
        self.stats.merged_tasks += merged as u64;
        self.stats.reordered_dags += 1;
        tracing::debug!(merged, tasks = self.graph.dag.len(), "adopted clustered order");
        true
    }

    /// Prepare then execute every instantiated task. Returns `true` if any task issued work.
    fn execute_render_tasks(&mut self, device: &mut D) -> bool {
        let max_before_submit = self.opts.max_tasks_before_submit.max(1);
        let mut state = FlushState::new(
            device,
            &self.graph.resources,
            &mut self.tokens,
            &mut self.staging,
        );

        for id in &self.graph.dag {
            if let Some(task) = self.graph.tasks.get_mut(id)
                && task.is_instantiated(state.resources())
            {
                task.prepare(&mut state);
            }
        }
        state.pre_execute_draws();

        let mut executed = 0u64;
        let mut since_submit = 0usize;
        for id in &self.graph.dag {
            let Some(task) = self.graph.tasks.get_mut(id) else {
                continue;
            };
            if !task.is_instantiated(state.resources()) {
                tracing::trace!(task = %id, "skipping task with unbound resources");
                continue;
            }
            if task.execute(&mut state) {
                executed += 1;
            }
            since_submit += 1;
            if since_submit >= max_before_submit {
                state.device().submit(false);
                self.stats.intermediate_submits += 1;
                since_submit = 0;
            }
        }

        state.reset();
        drop(state);
        self.tokens.issue_flush_token();
        self.stats.tasks_executed += executed;
        tracing::debug!(executed, "executed render tasks");
        executed > 0
    }

    /// Flush, then resolve MSAA and regenerate mips of every instantiated surface in `targets`.
    pub fn flush_surfaces(
        &mut self,
        targets: &[ResourceId],
        access: SurfaceAccess,
        info: FlushInfo,
        layout: Option<SurfaceLayout>,
    ) -> SemaphoresSubmitted {
        let wants_semaphores = info.num_semaphores > 0;
        let flushed = self.flush(targets, access, info, layout);
        for &r in targets {
            self.resolve_and_mipmap(r);
        }
        let supported = self
            .device
            .as_ref()
            .is_some_and(|d| d.caps().semaphore_support);
        if !flushed || (wants_semaphores && !supported) {
            SemaphoresSubmitted::No
        } else {
            SemaphoresSubmitted::Yes
        }
    }

    fn resolve_and_mipmap(&mut self, resource: ResourceId) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        let resources = &mut self.graph.resources;
        let Some(entry) = resources.get(resource) else {
            return;
        };
        let Some(target) = entry.backing() else {
            return;
        };
        let msaa = entry
            .msaa_dirty_rect()
            .filter(|_| entry.desc().requires_manual_msaa_resolve());
        let mips = entry.desc().mipmapped() == Mipmapped::Yes && entry.mipmaps_dirty();

        if let Some(rect) = msaa {
            device.encode(Command::ResolveMsaa { target, rect });
            resources.mark_msaa_resolved(resource);
        }
        if mips {
            device.encode(Command::RegenerateMips { target });
            resources.mark_mipmaps_clean(resource);
        }
    }

    /// Submit pending device work. Blocks until it completes when `sync_to_cpu` is set.
    pub fn submit(&mut self, sync_to_cpu: bool) -> bool {
        self.device.as_mut().is_some_and(|d| d.submit(sync_to_cpu))
    }

    /// Flush everything and submit it.
    pub fn flush_and_submit(&mut self, sync_to_cpu: bool) -> bool {
        let flushed = self.flush(&[], SurfaceAccess::NoAccess, FlushInfo::default(), None);
        let submitted = self.submit(sync_to_cpu);
        flushed && submitted
    }

    /// Flush and submit if the device asked for it. Returns `true` if a flush was attempted.
    pub fn flush_if_necessary(&mut self) -> bool {
        if !self.device.as_ref().is_some_and(|d| d.requests_flush()) {
            return false;
        }
        tracing::debug!("device requested a flush");
        if self.flush(&[], SurfaceAccess::NoAccess, FlushInfo::default(), None) {
            self.submit(false);
        }
        if let Some(d) = self.device.as_mut() {
            d.purge_as_needed();
        }
        true
    }

    /// Drop cached device memory and every on-flush callback that does not ask to be kept.
    pub fn free_gpu_resources(&mut self) {
        self.on_flush_callbacks
            .retain(|cb| cb.retain_on_free_gpu_resources());
        if let Some(d) = self.device.as_mut() {
            d.free_gpu_resources();
        }
    }
}
