use super::*;
use crate::foundation::ids::TaskId;
use crate::resource::desc::{Mipmapped, PixelFormat, ResourceDesc};
use draw::DrawOp;

fn draw_task(id: u32, target: ResourceId) -> Task {
    let mut t = Task::new(TaskId(id), TaskKind::Draw(DrawTask::new(0)));
    t.targets.push(target);
    t
}

#[test]
fn dependency_edges_are_deduplicated() {
    let mut t = draw_task(1, ResourceId(0));
    assert!(t.add_dependency_edge(TaskId(0)));
    assert!(!t.add_dependency_edge(TaskId(0)));
    assert_eq!(t.dependencies(), &[TaskId(0)]);
    assert!(t.depends_on(TaskId(0)));
}

#[test]
#[should_panic(expected = "cannot depend on itself")]
fn self_dependency_panics() {
    let mut t = draw_task(3, ResourceId(0));
    t.add_dependency_edge(TaskId(3));
}

#[test]
fn is_used_covers_targets_and_reads() {
    let mut t = draw_task(0, ResourceId(0));
    t.as_draw_mut()
        .expect("draw")
        .record(DrawOp::new("a", IRect::from_size(4, 4)).sampling(ResourceId(2), Mipmapped::No));
    assert!(t.is_used(ResourceId(0)));
    assert!(t.is_used(ResourceId(2)));
    assert!(!t.is_used(ResourceId(1)));

    let mut c = Task::new(
        TaskId(1),
        TaskKind::Copy(CopyTask::new(
            ResourceId(5),
            IRect::from_size(2, 2),
            IRect::from_size(2, 2),
        )),
    );
    c.targets.push(ResourceId(6));
    assert!(c.is_used(ResourceId(5)));
    c.make_skippable();
    assert!(!c.is_used(ResourceId(5)));
    assert!(c.is_skippable());
}

#[test]
fn closing_a_draw_reports_clipped_dirty_bounds() {
    let mut table = ResourceTable::new();
    let s = table.create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8));
    let mut t = draw_task(0, s);
    t.as_draw_mut()
        .expect("draw")
        .record(DrawOp::new("a", IRect::from_xywh(4, 4, 10, 10)));
    assert_eq!(
        t.on_make_closed(&table),
        ExpectedOutcome::TargetDirty(IRect::from_ltrb(4, 4, 8, 8))
    );
}

#[test]
fn describe_is_address_free() {
    let mut t = draw_task(7, ResourceId(1));
    t.add_dependency_edge(TaskId(2));
    t.flags.closed = true;
    t.flags.blocks_reordering = true;
    assert_eq!(t.describe(), "T7 draw [CB---] targets=[R1] deps=[T2]");
}

#[test]
fn remap_rewrites_targets_and_reads() {
    let mut t = draw_task(0, ResourceId(0));
    t.as_draw_mut()
        .expect("draw")
        .record(DrawOp::new("a", IRect::from_size(4, 4)).sampling(ResourceId(1), Mipmapped::No));
    t.remap_resources(&[ResourceId(10), ResourceId(11)]);
    assert_eq!(t.targets(), &[ResourceId(10)]);
    assert_eq!(t.as_draw().expect("draw").sampled(), &[ResourceId(11)]);
}
