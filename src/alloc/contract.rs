use crate::device::backend::Device;
use crate::foundation::ids::ResourceId;
use crate::resource::table::ResourceTable;

/// How a task touches a resource inside its interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsageHint {
    /// The task really reads or writes the resource (as opposed to pinning it).
    pub actual_use: bool,
    /// The resource's backing may be shared with resources whose intervals do not overlap.
    pub allow_recycling: bool,
}

impl UsageHint {
    /// A real use whose backing may be recycled.
    pub const USE: UsageHint = UsageHint {
        actual_use: true,
        allow_recycling: true,
    };

    /// A real use that pins a dedicated backing.
    pub const USE_NO_RECYCLE: UsageHint = UsageHint {
        actual_use: true,
        allow_recycling: false,
    };
}

/// Assigns backing memory to the resources a flush touches.
///
/// The scheduler declares every resource of every task once per flush, in execution order,
/// advancing [`ResourceAllocator::inc_ops`] after each task. A failure at any step fails the
/// whole flush.
pub trait ResourceAllocator {
    /// Op index the next declared use is attributed to.
    fn cur_op(&self) -> u32;

    /// Advance to the next op index.
    fn inc_ops(&mut self);

    /// Declare that `resource` is live over `[first, last]`.
    fn add_interval(&mut self, resource: ResourceId, first: u32, last: u32, hint: UsageHint);

    /// Compute a feasible assignment without creating any backing.
    fn plan_assignment(&mut self, resources: &ResourceTable) -> bool;

    /// Ask `device` to make room for the planned backings.
    fn make_budget_headroom(&mut self, device: &mut dyn Device) -> bool;

    /// Create the planned backings and bind them. All or nothing.
    fn assign(&mut self, resources: &mut ResourceTable, device: &mut dyn Device) -> bool;

    /// A previous step failed; nothing was bound.
    fn failed_instantiation(&self) -> bool;

    /// Forget every interval and plan.
    fn reset(&mut self);
}
