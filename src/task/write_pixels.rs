use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::command::Command;
use crate::device::flush_state::FlushState;
use crate::foundation::geom::IRect;
use crate::foundation::ids::ResourceId;
use crate::resource::table::ResourceTable;
use crate::task::{ExpectedOutcome, TaskBehavior};

/// Host pixels uploaded into a region of the task's target surface.
#[derive(Clone, Debug)]
pub struct WritePixelsTask {
    rect: IRect,
    levels: Vec<Vec<u8>>,
}

impl WritePixelsTask {
    pub(crate) fn new(rect: IRect, levels: Vec<Vec<u8>>) -> Self {
        Self { rect, levels }
    }

    /// Region written.
    pub fn rect(&self) -> IRect {
        self.rect
    }

    /// Number of mip levels supplied.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

impl TaskBehavior for WritePixelsTask {
    fn name(&self) -> &'static str {
        "write_pixels"
    }

    fn gather_intervals(&self, targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        let cur = alloc.cur_op();
        alloc.add_interval(targets[0], cur, cur, UsageHint::USE);
        alloc.inc_ops();
    }

    fn on_make_closed(&mut self, _targets: &[ResourceId], _resources: &ResourceTable) -> ExpectedOutcome {
        ExpectedOutcome::TargetDirty(self.rect)
    }

    fn execute(&mut self, targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let Some(dst) = state.backing(targets[0]) else {
            return false;
        };
        state.encode(Command::WritePixels {
            dst,
            rect: self.rect,
            levels: u32::try_from(self.levels.len()).unwrap_or(u32::MAX),
        });
        true
    }

    fn end_flush(&mut self) {
        self.levels = Vec::new();
    }

    fn remap_resources(&mut self, _map: &[ResourceId]) {}
}
