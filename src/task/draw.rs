use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::command::{Command, LoadOp};
use crate::device::flush_state::FlushState;
use crate::foundation::geom::IRect;
use crate::foundation::ids::ResourceId;
use crate::resource::desc::Mipmapped;
use crate::resource::table::ResourceTable;
use crate::task::{ExpectedOutcome, TaskBehavior, remap};
use smallvec::SmallVec;

/// A resource sampled by a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SampledResource {
    /// Resource read.
    pub resource: ResourceId,
    /// Whether the draw reads the mip chain (dirty mips then need regenerating first).
    #[serde(default)]
    pub mipmapped: Mipmapped,
}

/// One recorded draw. Geometry is opaque to the scheduler: only its footprint matters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DrawOp {
    /// Human-readable label carried into the command stream.
    pub label: String,
    /// Device-space bounds the draw may touch.
    pub bounds: IRect,
    /// Resources the draw samples.
    #[serde(default)]
    pub sampled: Vec<SampledResource>,
    /// Vertex data staged before execution.
    #[serde(default)]
    pub vertex_bytes: usize,
}

impl DrawOp {
    /// Draw with no sampled resources and no vertex data.
    pub fn new(label: impl Into<String>, bounds: IRect) -> Self {
        Self {
            label: label.into(),
            bounds,
            sampled: Vec::new(),
            vertex_bytes: 0,
        }
    }

    /// Add a sampled resource.
    pub fn sampling(mut self, resource: ResourceId, mipmapped: Mipmapped) -> Self {
        self.sampled.push(SampledResource {
            resource,
            mipmapped,
        });
        self
    }

    /// Set the staged vertex byte count.
    pub fn with_vertex_bytes(mut self, bytes: usize) -> Self {
        self.vertex_bytes = bytes;
        self
    }
}

/// Accumulates draws into one surface until closed.
#[derive(Clone, Debug, Default)]
pub struct DrawTask {
    ops: Vec<DrawOp>,
    load_op: LoadOp,
    total_bounds: Option<IRect>,
    clipped_bounds: Option<IRect>,
    sampled: SmallVec<[ResourceId; 4]>,
    recording_group: u32,
    cannot_merge_backward: bool,
    pre_prepared: bool,
}

impl DrawTask {
    pub(crate) fn new(recording_group: u32) -> Self {
        Self {
            recording_group,
            ..Self::default()
        }
    }

    /// Recorded draws in order.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Color attachment load op.
    pub fn load_op(&self) -> LoadOp {
        self.load_op
    }

    /// Producers sharing a recording group may have their tasks merged.
    pub fn recording_group(&self) -> u32 {
        self.recording_group
    }

    /// A later merge may not fold this task into its predecessor.
    pub fn cannot_merge_backward(&self) -> bool {
        self.cannot_merge_backward
    }

    /// Distinct resources sampled by the recorded draws.
    pub fn sampled(&self) -> &[ResourceId] {
        &self.sampled
    }

    /// Bounds written on execution, known once closed.
    pub fn clipped_bounds(&self) -> Option<IRect> {
        self.clipped_bounds
    }

    /// Whether [`crate::TaskGraph::pre_prepare`] already ran for this task.
    pub fn is_pre_prepared(&self) -> bool {
        self.pre_prepared
    }

    /// No draws and a load op that preserves contents.
    pub fn is_color_noop(&self) -> bool {
        self.ops.is_empty() && self.load_op == LoadOp::Load
    }

    /// No draws recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn set_cannot_merge_backward(&mut self, v: bool) {
        self.cannot_merge_backward = v;
    }

    pub(crate) fn record(&mut self, op: DrawOp) {
        self.total_bounds = Some(match self.total_bounds {
            Some(b) => b.join(op.bounds),
            None => op.bounds,
        });
        for s in &op.sampled {
            if !self.sampled.contains(&s.resource) {
                self.sampled.push(s.resource);
            }
        }
        self.ops.push(op);
    }

    /// Clearing covers the whole backing store.
    pub(crate) fn set_load_op(&mut self, op: LoadOp, target_bounds: IRect) {
        self.load_op = op;
        if let LoadOp::Clear(_) = op {
            self.total_bounds = Some(target_bounds);
        }
    }

    /// Only honored before the first draw.
    pub(crate) fn discard(&mut self) {
        if self.is_empty() {
            self.load_op = LoadOp::Discard;
            self.total_bounds = None;
        }
    }

    /// Merge compatibility of `later` (targeting `later_target`) onto this task.
    pub(crate) fn can_merge(
        &self,
        target: ResourceId,
        later: &DrawTask,
        later_target: ResourceId,
    ) -> bool {
        target == later_target
            && self.recording_group == later.recording_group
            && !later.cannot_merge_backward
    }

    /// Append `later`'s content after this task's.
    pub(crate) fn absorb(&mut self, later: DrawTask) {
        for op in later.ops {
            self.record(op);
        }
        self.clipped_bounds = match (self.clipped_bounds, later.clipped_bounds) {
            (Some(a), Some(b)) => Some(a.join(b)),
            (a, b) => a.or(b),
        };
    }
}

impl TaskBehavior for DrawTask {
    fn name(&self) -> &'static str {
        "draw"
    }

    fn gather_intervals(&self, targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        if self.is_color_noop() {
            return;
        }
        let target = targets[0];
        let cur = alloc.cur_op();
        if self.ops.is_empty() {
            // A bare load op still needs the target for one op slot.
            alloc.add_interval(target, cur, cur, UsageHint::USE);
            alloc.inc_ops();
            return;
        }
        let last = cur.saturating_add(self.ops.len() as u32 - 1);
        alloc.add_interval(target, cur, last, UsageHint::USE);
        for op in &self.ops {
            let at = alloc.cur_op();
            for s in &op.sampled {
                alloc.add_interval(s.resource, at, at, UsageHint::USE);
            }
            alloc.inc_ops();
        }
    }

    fn on_make_closed(&mut self, targets: &[ResourceId], resources: &ResourceTable) -> ExpectedOutcome {
        if self.is_color_noop() {
            return ExpectedOutcome::TargetUnchanged;
        }
        let backing_bounds = resources
            .desc(targets[0])
            .bounds()
            .unwrap_or(IRect::EMPTY);
        self.clipped_bounds = self.total_bounds.and_then(|b| backing_bounds.intersect(b));
        match self.clipped_bounds {
            Some(r) => ExpectedOutcome::TargetDirty(r),
            None => ExpectedOutcome::TargetUnchanged,
        }
    }

    fn on_is_used(&self, resource: ResourceId) -> bool {
        self.sampled.contains(&resource)
    }

    fn pre_prepare(&mut self) {
        if !self.is_color_noop() {
            self.pre_prepared = true;
        }
    }

    fn prepare(&mut self, _targets: &[ResourceId], state: &mut FlushState<'_>) {
        if self.is_color_noop()
            || (self.clipped_bounds.is_none() && self.load_op != LoadOp::Discard)
        {
            return;
        }
        for op in &self.ops {
            state.stage(op.vertex_bytes);
        }
    }

    fn execute(&mut self, targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let Some(bounds) = self.clipped_bounds else {
            return false;
        };
        if self.is_color_noop() {
            return false;
        }
        let Some(target) = state.backing(targets[0]) else {
            return false;
        };
        let mut draws = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            state.tokens().issue_draw_token();
            draws.push(op.label.clone());
        }
        state.encode(Command::RenderPass {
            target,
            load: self.load_op,
            bounds,
            draws,
        });
        true
    }

    fn end_flush(&mut self) {
        self.ops.clear();
        self.sampled.clear();
    }

    fn make_skippable(&mut self) {
        self.ops.clear();
        self.sampled.clear();
        self.load_op = LoadOp::Load;
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        for op in &mut self.ops {
            for s in &mut op.sampled {
                s.resource = remap(map, s.resource);
            }
        }
        for r in &mut self.sampled {
            *r = remap(map, *r);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/task/draw.rs"]
mod tests;
