use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::command::Command;
use crate::device::flush_state::FlushState;
use crate::foundation::ids::ResourceId;
use crate::resource::table::ResourceTable;
use crate::task::{TaskBehavior, remap};

// Buffer tasks declare no targets: their byte ranges are ordered by the reorder barrier they sit
// on, not by last-writer tracking. Their buffers are never recycled within a flush.

/// Byte copy between two buffers.
#[derive(Clone, Debug)]
pub struct BufferTransferTask {
    src: ResourceId,
    src_offset: usize,
    dst: ResourceId,
    dst_offset: usize,
    size: usize,
}

impl BufferTransferTask {
    pub(crate) fn new(
        src: ResourceId,
        src_offset: usize,
        dst: ResourceId,
        dst_offset: usize,
        size: usize,
    ) -> Self {
        Self {
            src,
            src_offset,
            dst,
            dst_offset,
            size,
        }
    }

    /// Source buffer.
    pub fn src(&self) -> ResourceId {
        self.src
    }

    /// Destination buffer.
    pub fn dst(&self) -> ResourceId {
        self.dst
    }

    /// Bytes moved.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl TaskBehavior for BufferTransferTask {
    fn name(&self) -> &'static str {
        "buffer_transfer"
    }

    fn gather_intervals(&self, _targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        let cur = alloc.cur_op();
        alloc.add_interval(self.src, cur, cur, UsageHint::USE_NO_RECYCLE);
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
        state.encode(Command::TransferBuffer {
            src,
            src_offset: self.src_offset,
            dst,
            dst_offset: self.dst_offset,
            size: self.size,
        });
        true
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        self.src = remap(map, self.src);
        self.dst = remap(map, self.dst);
    }
}

/// Host bytes written into a buffer range.
#[derive(Clone, Debug)]
pub struct BufferUpdateTask {
    dst: ResourceId,
    offset: usize,
    data: Vec<u8>,
}

impl BufferUpdateTask {
    pub(crate) fn new(dst: ResourceId, offset: usize, data: Vec<u8>) -> Self {
        Self { dst, offset, data }
    }

    /// Destination buffer.
    pub fn dst(&self) -> ResourceId {
        self.dst
    }

    /// Byte offset into the destination.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes to write.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl TaskBehavior for BufferUpdateTask {
    fn name(&self) -> &'static str {
        "buffer_update"
    }

    fn gather_intervals(&self, _targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        let cur = alloc.cur_op();
        alloc.add_interval(self.dst, cur, cur, UsageHint::USE_NO_RECYCLE);
        alloc.inc_ops();
    }

    fn on_is_used(&self, resource: ResourceId) -> bool {
        resource == self.dst
    }

    fn is_instantiated(&self, _targets: &[ResourceId], resources: &ResourceTable) -> bool {
        resources.is_instantiated(self.dst)
    }

    fn execute(&mut self, _targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let Some(dst) = state.backing(self.dst) else {
            return false;
        };
        state.encode(Command::UpdateBuffer {
            dst,
            offset: self.offset,
            size: self.data.len(),
        });
        true
    }

    fn end_flush(&mut self) {
        self.data = Vec::new();
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        self.dst = remap(map, self.dst);
    }
}
