use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::backend::Device;
use crate::foundation::ids::{BackingId, ResourceId};
use crate::resource::desc::{Lifetime, ResourceDesc, ResourceKind};
use crate::resource::table::ResourceTable;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone)]
struct Interval {
    resource: ResourceId,
    start: u32,
    end: u32,
    uses: u32,
    allow_recycling: bool,
    register: Option<usize>,
}

/// One backing to be created; shared by every interval assigned to it.
#[derive(Debug, Clone)]
struct Register {
    desc: ResourceDesc,
    recyclable: bool,
    backing: Option<BackingId>,
}

/// Counters from the most recent plan/assign.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Intervals declared.
    pub intervals: usize,
    /// Backings planned.
    pub registers: usize,
    /// Intervals that reused a register freed by an earlier interval.
    pub recycled: usize,
    /// Bytes of the planned backings.
    pub planned_bytes: usize,
}

/// Liveness-interval allocator.
///
/// Intervals are visited by start; when an interval's end falls before the next start its
/// register returns to a free list bucketed by [`ResourceKind`]. Only transient resources that
/// allow recycling share registers; everything else gets a dedicated one. Resources that are
/// already bound are left alone.
#[derive(Debug, Default)]
pub struct IntervalAllocator {
    cur_op: u32,
    intervals: Vec<Interval>,
    interval_by_resource: HashMap<ResourceId, usize>,
    registers: Vec<Register>,
    planned: bool,
    failed: bool,
    stats: AllocatorStats,
}

impl IntervalAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters from the most recent plan.
    pub fn stats(&self) -> AllocatorStats {
        self.stats.clone()
    }

    /// `[start, end]` and use count of `resource`'s interval, if declared.
    pub fn interval(&self, resource: ResourceId) -> Option<(u32, u32, u32)> {
        let &i = self.interval_by_resource.get(&resource)?;
        let iv = &self.intervals[i];
        Some((iv.start, iv.end, iv.uses))
    }

    /// Register index assigned to `resource` by the last plan.
    pub fn planned_register(&self, resource: ResourceId) -> Option<usize> {
        let &i = self.interval_by_resource.get(&resource)?;
        self.intervals[i].register
    }

    fn release_created(&mut self, device: &mut dyn Device) {
        for r in &mut self.registers {
            if let Some(b) = r.backing.take() {
                device.release_backing(b);
            }
        }
    }
}

impl ResourceAllocator for IntervalAllocator {
    fn cur_op(&self) -> u32 {
        self.cur_op
    }

    fn inc_ops(&mut self) {
        self.cur_op = self.cur_op.saturating_add(1);
    }

    fn add_interval(&mut self, resource: ResourceId, first: u32, last: u32, hint: UsageHint) {
        debug_assert!(first <= last, "interval for {resource} ends before it starts");
        if let Some(&i) = self.interval_by_resource.get(&resource) {
            let iv = &mut self.intervals[i];
            iv.start = iv.start.min(first);
            iv.end = iv.end.max(last);
            if hint.actual_use {
                iv.uses = iv.uses.saturating_add(1);
            }
            if !hint.allow_recycling {
                iv.allow_recycling = false;
            }
            return;
        }
        let i = self.intervals.len();
        self.intervals.push(Interval {
            resource,
            start: first,
            end: last,
            uses: u32::from(hint.actual_use),
            allow_recycling: hint.allow_recycling,
            register: None,
        });
        self.interval_by_resource.insert(resource, i);
    }

    #[tracing::instrument(level = "debug", skip_all, fields(intervals = self.intervals.len()))]
    fn plan_assignment(&mut self, resources: &ResourceTable) -> bool {
        self.registers.clear();
        for iv in &mut self.intervals {
            iv.register = None;
        }
        self.stats = AllocatorStats {
            intervals: self.intervals.len(),
            ..AllocatorStats::default()
        };

        let mut order: Vec<usize> = (0..self.intervals.len()).collect();
        order.sort_by_key(|&i| (self.intervals[i].start, i));

        let mut active: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
        let mut free: HashMap<ResourceKind, Vec<usize>> = HashMap::new();

        for i in order {
            let (start, end, resource, allow) = {
                let iv = &self.intervals[i];
                (iv.start, iv.end, iv.resource, iv.allow_recycling)
            };

            while let Some(&Reverse((active_end, ai))) = active.peek() {
                if active_end >= start {
                    break;
                }
                active.pop();
                if let Some(r) = self.intervals[ai].register
                    && self.registers[r].recyclable
                {
                    free.entry(self.registers[r].desc.kind).or_default().push(r);
                }
            }

            let Some(entry) = resources.get(resource) else {
                tracing::warn!(%resource, "interval declared for an unknown resource");
                self.failed = true;
                return false;
            };
            if entry.is_instantiated() {
                continue;
            }

            let desc = *entry.desc();
            let recyclable = allow && desc.lifetime == Lifetime::Transient;
            let reused = if recyclable {
                free.get_mut(&desc.kind).and_then(Vec::pop)
            } else {
                None
            };
            let r = match reused {
                Some(r) => {
                    self.stats.recycled += 1;
                    r
                }
                None => {
                    self.registers.push(Register {
                        desc,
                        recyclable,
                        backing: None,
                    });
                    self.stats.planned_bytes =
                        self.stats.planned_bytes.saturating_add(desc.byte_size());
                    self.registers.len() - 1
                }
            };
            self.intervals[i].register = Some(r);
            active.push(Reverse((end, i)));
        }

        self.stats.registers = self.registers.len();
        self.planned = true;
        tracing::debug!(
            registers = self.stats.registers,
            recycled = self.stats.recycled,
            "planned resource assignment"
        );
        true
    }

    fn make_budget_headroom(&mut self, device: &mut dyn Device) -> bool {
        let bytes = self
            .registers
            .iter()
            .filter(|r| r.backing.is_none())
            .map(|r| r.desc.byte_size())
            .fold(0usize, usize::saturating_add);
        device.make_budget_headroom(bytes)
    }

    fn assign(&mut self, resources: &mut ResourceTable, device: &mut dyn Device) -> bool {
        if self.failed {
            return false;
        }
        if !self.planned && !self.plan_assignment(resources) {
            return false;
        }

        for ri in 0..self.registers.len() {
            let desc = self.registers[ri].desc;
            match device.create_backing(&desc) {
                Ok(b) => self.registers[ri].backing = Some(b),
                Err(err) => {
                    tracing::warn!(%err, register = ri, "failed to instantiate backing");
                    self.release_created(device);
                    self.failed = true;
                    return false;
                }
            }
        }

        for iv in &self.intervals {
            if let Some(r) = iv.register
                && let Some(b) = self.registers[r].backing
            {
                resources.instantiate(iv.resource, b);
            }
        }
        true
    }

    fn failed_instantiation(&self) -> bool {
        self.failed
    }

    fn reset(&mut self) {
        self.cur_op = 0;
        self.intervals.clear();
        self.interval_by_resource.clear();
        self.registers.clear();
        self.planned = false;
        self.failed = false;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/alloc/interval.rs"]
mod tests;
