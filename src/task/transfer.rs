use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::command::Command;
use crate::device::flush_state::FlushState;
use crate::foundation::geom::IRect;
use crate::foundation::ids::ResourceId;
use crate::resource::table::ResourceTable;
use crate::task::{TaskBehavior, remap};

/// Reads a surface region into a buffer. Only the base level is read.
#[derive(Clone, Debug)]
pub struct TransferFromSurfaceTask {
    src: ResourceId,
    rect: IRect,
    dst: ResourceId,
    dst_offset: usize,
}

impl TransferFromSurfaceTask {
    pub(crate) fn new(src: ResourceId, rect: IRect, dst: ResourceId, dst_offset: usize) -> Self {
        Self {
            src,
            rect,
            dst,
            dst_offset,
        }
    }

    /// Surface read.
    pub fn src(&self) -> ResourceId {
        self.src
    }

    /// Region read.
    pub fn rect(&self) -> IRect {
        self.rect
    }

    /// Buffer written.
    pub fn dst(&self) -> ResourceId {
        self.dst
    }
}

impl TaskBehavior for TransferFromSurfaceTask {
    fn name(&self) -> &'static str {
        "transfer_from_surface"
    }

    fn gather_intervals(&self, _targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        let cur = alloc.cur_op();
        alloc.add_interval(self.src, cur, cur, UsageHint::USE);
        alloc.add_interval(self.dst, cur, cur, UsageHint::USE_NO_RECYCLE);
        alloc.inc_ops();
    }

    fn on_is_used(&self, resource: ResourceId) -> bool {
        resource == self.src || resource == self.dst
    }

    fn is_instantiated(&self, _targets: &[ResourceId], resources: &ResourceTable) -> bool {
        resources.is_instantiated(self.src) && resources.is_instantiated(self.dst)
    }

    fn execute(&mut self, _targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let (Some(src), Some(dst)) = (state.backing(self.src), state.backing(self.dst)) else {
            return false;
        };
        state.encode(Command::TransferFromSurface {
            src,
            rect: self.rect,
            dst,
            dst_offset: self.dst_offset,
        });
        true
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        self.src = remap(map, self.src);
        self.dst = remap(map, self.dst);
    }
}
