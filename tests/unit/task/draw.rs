use super::*;
use crate::alloc::interval::IntervalAllocator;
use crate::resource::desc::{PixelFormat, ResourceDesc};

fn op(label: &str, w: i32) -> DrawOp {
    DrawOp::new(label, IRect::from_xywh(0, 0, w, w))
}

#[test]
fn empty_load_task_is_a_color_noop() {
    let mut t = DrawTask::new(0);
    assert!(t.is_color_noop());
    t.set_load_op(LoadOp::Clear([0.0, 0.0, 0.0, 1.0]), IRect::from_size(8, 8));
    assert!(!t.is_color_noop());
    assert!(t.is_empty());
}

#[test]
fn discard_only_applies_before_the_first_draw() {
    let mut t = DrawTask::new(0);
    t.discard();
    assert_eq!(t.load_op(), LoadOp::Discard);

    let mut u = DrawTask::new(0);
    u.record(op("a", 2));
    u.discard();
    assert_eq!(u.load_op(), LoadOp::Load);
}

#[test]
fn clear_dirties_the_whole_target() {
    let mut table = ResourceTable::new();
    let s = table.create(ResourceDesc::surface(16, 16, PixelFormat::Rgba8));
    let mut t = DrawTask::new(0);
    t.set_load_op(LoadOp::Clear([1.0; 4]), IRect::from_size(16, 16));
    t.record(op("a", 2));
    assert_eq!(
        t.on_make_closed(&[s], &table),
        ExpectedOutcome::TargetDirty(IRect::from_size(16, 16))
    );
}

#[test]
fn color_noop_gathers_nothing() {
    let t = DrawTask::new(0);
    let mut alloc = IntervalAllocator::new();
    t.gather_intervals(&[ResourceId(0)], &mut alloc);
    assert_eq!(alloc.cur_op(), 0);
    assert_eq!(alloc.interval(ResourceId(0)), None);
}

#[test]
fn gather_spans_every_op_and_samples_at_their_index() {
    let mut t = DrawTask::new(0);
    t.record(op("a", 2));
    t.record(op("b", 2).sampling(ResourceId(3), Mipmapped::No));
    t.record(op("c", 2));
    let mut alloc = IntervalAllocator::new();
    alloc.inc_ops();
    t.gather_intervals(&[ResourceId(0)], &mut alloc);
    assert_eq!(alloc.cur_op(), 4);
    assert_eq!(alloc.interval(ResourceId(0)), Some((1, 3, 1)));
    assert_eq!(alloc.interval(ResourceId(3)), Some((2, 2, 1)));
}

#[test]
fn merge_requires_target_group_and_backward_permission() {
    let a = DrawTask::new(1);
    let b = DrawTask::new(1);
    let other_group = DrawTask::new(2);
    let mut pinned = DrawTask::new(1);
    pinned.set_cannot_merge_backward(true);

    assert!(a.can_merge(ResourceId(0), &b, ResourceId(0)));
    assert!(!a.can_merge(ResourceId(0), &b, ResourceId(1)));
    assert!(!a.can_merge(ResourceId(0), &other_group, ResourceId(0)));
    assert!(!a.can_merge(ResourceId(0), &pinned, ResourceId(0)));
}

#[test]
fn absorb_appends_ops_and_reads() {
    let mut a = DrawTask::new(0);
    a.record(op("a", 2));
    let mut b = DrawTask::new(0);
    b.record(op("b", 4).sampling(ResourceId(9), Mipmapped::Yes));
    a.absorb(b);
    let labels: Vec<&str> = a.ops().iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, ["a", "b"]);
    assert_eq!(a.sampled(), &[ResourceId(9)]);
}

#[test]
fn skippable_task_drops_content() {
    let mut t = DrawTask::new(0);
    t.set_load_op(LoadOp::Clear([0.0; 4]), IRect::from_size(4, 4));
    t.record(op("a", 2).sampling(ResourceId(1), Mipmapped::No));
    t.make_skippable();
    assert!(t.is_color_noop());
    assert!(!t.on_is_used(ResourceId(1)));
}
