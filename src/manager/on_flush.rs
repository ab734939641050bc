use crate::device::backend::{Device, DeviceCaps};
use crate::foundation::error::FlushResult;
use crate::foundation::ids::{FlushToken, ResourceId, TaskId};
use crate::manager::graph::TaskDag;
use crate::resource::desc::ResourceDesc;
use crate::task::draw::DrawOp;

/// Hook run around every flush, typically to build atlases just in time.
///
/// `pre_flush` runs after the task list is closed and sorted and before allocation; it may only
/// add tasks. A `false` return skips allocation and execution for this flush.
pub trait OnFlushCallback {
    /// Add work for this flush. Return `false` on failure.
    fn pre_flush(&mut self, provider: &mut OnFlushResourceProvider<'_>) -> bool;

    /// The flush identified by `token` has been handed to the device.
    fn post_flush(&mut self, _token: FlushToken) {}

    /// Keep this callback registered across [`crate::DrawingManager::free_gpu_resources`].
    fn retain_on_free_gpu_resources(&self) -> bool {
        false
    }
}

/// The narrow view of the manager available to [`OnFlushCallback::pre_flush`].
pub struct OnFlushResourceProvider<'a> {
    graph: &'a mut TaskDag,
    device: &'a mut dyn Device,
}

impl<'a> OnFlushResourceProvider<'a> {
    pub(crate) fn new(graph: &'a mut TaskDag, device: &'a mut dyn Device) -> Self {
        Self { graph, device }
    }

    /// Device capabilities.
    pub fn caps(&self) -> &DeviceCaps {
        self.device.caps()
    }

    /// Declare a resource for use by the tasks this callback adds.
    pub fn create_resource(&mut self, desc: ResourceDesc) -> ResourceId {
        self.graph.resources.create(desc)
    }

    /// Bind backing memory to `resource` right away. Already bound resources succeed.
    pub fn instantiate_resource(&mut self, resource: ResourceId) -> bool {
        let Some(entry) = self.graph.resources.get(resource) else {
            return false;
        };
        if entry.is_instantiated() {
            return true;
        }
        let desc = *entry.desc();
        match self.device.create_backing(&desc) {
            Ok(b) => {
                self.graph.resources.instantiate(resource, b);
                true
            }
            Err(err) => {
                tracing::warn!(%err, %resource, "on-flush instantiation failed");
                false
            }
        }
    }

    /// Append a drawing task on `target`.
    pub fn new_drawing_task(&mut self, target: ResourceId) -> FlushResult<TaskId> {
        self.graph.new_drawing_task(target, 0)
    }

    /// Record a draw into a task created by [`OnFlushResourceProvider::new_drawing_task`].
    pub fn record_draw(&mut self, task: TaskId, op: DrawOp) -> FlushResult<()> {
        self.graph.record_draw(task, op)
    }
}
