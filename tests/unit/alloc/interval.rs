use super::*;
use crate::device::headless::{HeadlessDevice, HeadlessDeviceOpts};
use crate::resource::desc::PixelFormat;

fn scratch(t: &mut ResourceTable) -> ResourceId {
    t.create(ResourceDesc::surface(16, 16, PixelFormat::Rgba8).transient())
}

#[test]
fn disjoint_transient_intervals_share_a_backing() {
    let mut t = ResourceTable::new();
    let a = scratch(&mut t);
    let b = scratch(&mut t);
    let mut alloc = IntervalAllocator::new();
    alloc.add_interval(a, 0, 1, UsageHint::USE);
    alloc.add_interval(b, 2, 3, UsageHint::USE);

    assert!(alloc.plan_assignment(&t));
    assert_eq!(alloc.stats().registers, 1);
    assert_eq!(alloc.stats().recycled, 1);

    let mut dev = HeadlessDevice::default();
    assert!(alloc.assign(&mut t, &mut dev));
    assert_eq!(t.backing(a), t.backing(b));
    assert_eq!(dev.live_backings(), 1);
}

#[test]
fn touching_intervals_do_not_share() {
    let mut t = ResourceTable::new();
    let a = scratch(&mut t);
    let b = scratch(&mut t);
    let mut alloc = IntervalAllocator::new();
    alloc.add_interval(a, 0, 2, UsageHint::USE);
    alloc.add_interval(b, 2, 3, UsageHint::USE);

    assert!(alloc.plan_assignment(&t));
    assert_eq!(alloc.stats().registers, 2);
}

#[test]
fn persistent_and_non_recyclable_resources_get_dedicated_backing() {
    let mut t = ResourceTable::new();
    let p = t.create(ResourceDesc::surface(16, 16, PixelFormat::Rgba8));
    let q = scratch(&mut t);
    let r = scratch(&mut t);
    let mut alloc = IntervalAllocator::new();
    alloc.add_interval(p, 0, 0, UsageHint::USE);
    alloc.add_interval(q, 1, 1, UsageHint::USE_NO_RECYCLE);
    alloc.add_interval(r, 2, 2, UsageHint::USE);

    assert!(alloc.plan_assignment(&t));
    assert_eq!(alloc.stats().registers, 3);
}

#[test]
fn repeated_intervals_extend_and_count_uses() {
    let mut alloc = IntervalAllocator::new();
    let a = ResourceId(0);
    alloc.add_interval(a, 3, 3, UsageHint::USE);
    alloc.add_interval(a, 1, 1, UsageHint::USE);
    alloc.add_interval(
        a,
        5,
        6,
        UsageHint {
            actual_use: false,
            allow_recycling: true,
        },
    );
    assert_eq!(alloc.interval(a), Some((1, 6, 2)));
}

#[test]
fn instantiated_resources_are_skipped() {
    let mut t = ResourceTable::new();
    let w = t.wrap(ResourceDesc::surface(4, 4, PixelFormat::Rgba8), BackingId(99));
    let mut alloc = IntervalAllocator::new();
    alloc.add_interval(w, 0, 0, UsageHint::USE);
    assert!(alloc.plan_assignment(&t));
    assert_eq!(alloc.planned_register(w), None);

    let mut dev = HeadlessDevice::default();
    assert!(alloc.assign(&mut t, &mut dev));
    assert_eq!(t.backing(w), Some(BackingId(99)));
    assert_eq!(dev.live_backings(), 0);
}

#[test]
fn assign_is_all_or_nothing() {
    let mut t = ResourceTable::new();
    let small = t.create(ResourceDesc::surface(4, 4, PixelFormat::Rgba8));
    let big = t.create(ResourceDesc::surface(64, 64, PixelFormat::Rgba8));
    let mut alloc = IntervalAllocator::new();
    alloc.add_interval(small, 0, 0, UsageHint::USE);
    alloc.add_interval(big, 1, 1, UsageHint::USE);
    assert!(alloc.plan_assignment(&t));

    let mut dev = HeadlessDevice::new(HeadlessDeviceOpts {
        budget_bytes: 1024,
        ..HeadlessDeviceOpts::default()
    });
    assert!(!alloc.assign(&mut t, &mut dev));
    assert!(alloc.failed_instantiation());
    assert!(!t.is_instantiated(small));
    assert!(!t.is_instantiated(big));
    assert_eq!(dev.live_backings(), 0);
}

#[test]
fn headroom_covers_every_planned_register() {
    let mut t = ResourceTable::new();
    let a = t.create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8));
    let mut alloc = IntervalAllocator::new();
    alloc.add_interval(a, 0, 0, UsageHint::USE);
    assert!(alloc.plan_assignment(&t));

    let mut tight = HeadlessDevice::new(HeadlessDeviceOpts {
        budget_bytes: 255,
        ..HeadlessDeviceOpts::default()
    });
    assert!(!alloc.make_budget_headroom(&mut tight));
    let mut roomy = HeadlessDevice::new(HeadlessDeviceOpts {
        budget_bytes: 256,
        ..HeadlessDeviceOpts::default()
    });
    assert!(alloc.make_budget_headroom(&mut roomy));
}

#[test]
fn unknown_resource_fails_the_plan() {
    let t = ResourceTable::new();
    let mut alloc = IntervalAllocator::new();
    alloc.add_interval(ResourceId(4), 0, 0, UsageHint::USE);
    assert!(!alloc.plan_assignment(&t));
    assert!(alloc.failed_instantiation());
    alloc.reset();
    assert!(!alloc.failed_instantiation());
    assert_eq!(alloc.cur_op(), 0);
}
