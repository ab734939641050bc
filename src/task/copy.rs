use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::command::Command;
use crate::device::flush_state::FlushState;
use crate::foundation::geom::IRect;
use crate::foundation::ids::ResourceId;
use crate::resource::table::ResourceTable;
use crate::task::{ExpectedOutcome, TaskBehavior, remap};

/// Copies `src_rect` of `src` into `dst` at `dst_rect`; `dst` is the task's only target.
#[derive(Clone, Debug)]
pub struct CopyTask {
    src: Option<ResourceId>,
    src_rect: IRect,
    dst_rect: IRect,
}

impl CopyTask {
    pub(crate) fn new(src: ResourceId, src_rect: IRect, dst_rect: IRect) -> Self {
        Self {
            src: Some(src),
            src_rect,
            dst_rect,
        }
    }

    /// Source resource; cleared when the copy was made skippable.
    pub fn src(&self) -> Option<ResourceId> {
        self.src
    }

    /// Region read from the source.
    pub fn src_rect(&self) -> IRect {
        self.src_rect
    }

    /// Region written in the destination.
    pub fn dst_rect(&self) -> IRect {
        self.dst_rect
    }
}

impl TaskBehavior for CopyTask {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn gather_intervals(&self, targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        let Some(src) = self.src else {
            alloc.inc_ops();
            return;
        };
        let cur = alloc.cur_op();
        alloc.add_interval(src, cur, cur, UsageHint::USE);
        alloc.add_interval(targets[0], cur, cur, UsageHint::USE);
        alloc.inc_ops();
    }

    fn on_make_closed(&mut self, _targets: &[ResourceId], _resources: &ResourceTable) -> ExpectedOutcome {
        ExpectedOutcome::TargetDirty(self.dst_rect)
    }

    fn on_is_used(&self, resource: ResourceId) -> bool {
        self.src == Some(resource)
    }

    fn is_instantiated(&self, targets: &[ResourceId], resources: &ResourceTable) -> bool {
        targets.iter().all(|&t| resources.is_instantiated(t))
            && self.src.is_none_or(|s| resources.is_instantiated(s))
    }

    fn execute(&mut self, targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let Some(src) = self.src else {
            return false;
        };
        let (Some(src), Some(dst)) = (state.backing(src), state.backing(targets[0])) else {
            return false;
        };
        state.encode(Command::CopySurface {
            src,
            src_rect: self.src_rect,
            dst,
            dst_rect: self.dst_rect,
        });
        true
    }

    fn make_skippable(&mut self) {
        self.src = None;
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        self.src = self.src.map(|s| remap(map, s));
    }
}
