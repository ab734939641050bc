use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::command::{Command, Semaphore};
use crate::device::flush_state::FlushState;
use crate::foundation::ids::ResourceId;
use crate::resource::table::ResourceTable;
use crate::task::{TaskBehavior, remap};

/// Gates every later consumer of `waited_on` behind external semaphores.
///
/// The resource is not a target: the wait does not change its contents, so it must not replace
/// the resource's last writer.
#[derive(Clone, Debug)]
pub struct WaitTask {
    waited_on: ResourceId,
    semaphores: Vec<Semaphore>,
}

impl WaitTask {
    pub(crate) fn new(waited_on: ResourceId, semaphores: Vec<Semaphore>) -> Self {
        Self {
            waited_on,
            semaphores,
        }
    }

    /// Resource gated by the wait.
    pub fn waited_on(&self) -> ResourceId {
        self.waited_on
    }

    /// Semaphores waited on.
    pub fn semaphores(&self) -> &[Semaphore] {
        &self.semaphores
    }
}

impl TaskBehavior for WaitTask {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn gather_intervals(&self, _targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        let cur = alloc.cur_op();
        alloc.add_interval(self.waited_on, cur, cur, UsageHint::USE);
        alloc.inc_ops();
    }

    fn on_is_used(&self, resource: ResourceId) -> bool {
        resource == self.waited_on
    }

    fn is_instantiated(&self, _targets: &[ResourceId], resources: &ResourceTable) -> bool {
        resources.is_instantiated(self.waited_on)
    }

    fn execute(&mut self, _targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let Some(target) = state.backing(self.waited_on) else {
            return false;
        };
        state.encode(Command::WaitSemaphores {
            target,
            semaphores: self.semaphores.clone(),
        });
        true
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        self.waited_on = remap(map, self.waited_on);
    }
}
