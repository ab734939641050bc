use super::*;
use crate::device::command::Semaphore;
use crate::resource::desc::{PixelFormat, ResourceDesc};
use crate::task::draw::DrawOp;

fn surface(g: &mut TaskDag) -> ResourceId {
    g.resources
        .create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8))
}

#[test]
fn insert_before_last_moves_a_barrier_at_the_tail() {
    let mut g = TaskDag::new();
    let buf = g.resources.create(ResourceDesc::buffer(16));
    let u = g
        .new_buffer_update_task(buf, 0, vec![1, 2, 3, 4])
        .expect("update");
    assert_eq!(g.reorder_barriers, vec![0]);

    let r = g.new_task(TaskKind::Resolve(TextureResolveTask::new()));
    let r = g.insert_before_last(r);
    g.make_closed(r);

    assert_eq!(g.dag, vec![r, u]);
    assert_eq!(g.reorder_barriers, vec![1]);
    g.validate().expect("valid");
}

#[test]
fn insert_into_empty_list_appends() {
    let mut g = TaskDag::new();
    assert_eq!(g.insert_task_before_last(None), None);
    assert_eq!(g.append_task(None), None);

    let t = g.new_task(TaskKind::Resolve(TextureResolveTask::new()));
    let id = g.insert_task_before_last(Some(t)).expect("inserted");
    assert_eq!(g.dag, vec![id]);
}

#[test]
fn second_writer_depends_on_and_closes_the_first() {
    let mut g = TaskDag::new();
    let s = surface(&mut g);
    let d1 = g.new_drawing_task(s, 0).expect("d1");
    let d2 = g.new_drawing_task(s, 0).expect("d2");

    assert!(g.task(d1).expect("d1").is_closed());
    assert!(g.task(d2).expect("d2").depends_on(d1));
    assert!(g.task(d1).expect("d1").dependents().contains(&d2));
    assert_eq!(g.last_task.get(&s), Some(&d2));
    assert_eq!(g.active_task, Some(d2));
    g.validate().expect("valid");
}

#[test]
fn sampling_a_dirty_msaa_surface_inserts_a_resolve() {
    let mut g = TaskDag::new();
    let s = g
        .resources
        .create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8).with_samples(4));
    let t = surface(&mut g);

    let d1 = g.new_drawing_task(s, 0).expect("d1");
    g.record_draw(d1, DrawOp::new("fill", IRect::from_xywh(0, 0, 4, 4)))
        .expect("record");
    let d2 = g.new_drawing_task(t, 0).expect("d2");
    assert_eq!(
        g.resources.entry(s).msaa_dirty_rect(),
        Some(IRect::from_xywh(0, 0, 4, 4))
    );

    g.record_draw(
        d2,
        DrawOp::new("blit", IRect::from_size(8, 8)).sampling(s, Mipmapped::No),
    )
    .expect("record");
    g.close_active_task();

    assert_eq!(g.dag.len(), 3);
    let r = g.dag[1];
    assert_eq!(g.dag, vec![d1, r, d2]);
    assert_eq!(g.task(r).expect("resolve").name(), "texture_resolve");
    assert!(g.task(r).expect("resolve").depends_on(d1));
    assert!(g.task(d2).expect("d2").depends_on(r));
    assert!(!g.task(d2).expect("d2").depends_on(d1));
    assert_eq!(g.resources.entry(s).msaa_dirty_rect(), None);
    assert_eq!(g.last_task.get(&s), Some(&r));
    g.validate().expect("valid");
}

#[test]
fn reading_own_target_adds_no_dependency() {
    let mut g = TaskDag::new();
    let s = surface(&mut g);
    let d = g.new_drawing_task(s, 0).expect("d");
    g.record_draw(
        d,
        DrawOp::new("feedback", IRect::from_size(8, 8)).sampling(s, Mipmapped::No),
    )
    .expect("record");
    assert!(g.task(d).expect("d").dependencies().is_empty());
    assert_eq!(g.dag.len(), 1);
}

#[test]
fn wait_on_the_active_target_slots_in_ahead_of_it() {
    let mut g = TaskDag::new();
    let u = surface(&mut g);
    let s = surface(&mut g);
    let d0 = g.new_drawing_task(u, 0).expect("d0");
    let d1 = g.new_drawing_task(s, 0).expect("d1");
    g.record_draw(
        d1,
        DrawOp::new("blit", IRect::from_size(8, 8)).sampling(u, Mipmapped::No),
    )
    .expect("record");

    let w = g.new_wait_task(s, vec![Semaphore(9)]).expect("wait");

    assert_eq!(g.dag, vec![d0, w, d1]);
    assert!(g.reorder_barriers.is_empty());
    assert!(g.task(w).expect("w").depends_on(d0));
    assert!(g.task(d1).expect("d1").depends_on(w));
    assert_eq!(g.active_task, Some(d1));
    g.validate().expect("valid");
}

#[test]
fn wait_on_another_resource_is_a_barrier() {
    let mut g = TaskDag::new();
    let u = surface(&mut g);
    let s = surface(&mut g);
    let d0 = g.new_drawing_task(u, 0).expect("d0");
    let d1 = g.new_drawing_task(s, 0).expect("d1");

    let w = g.new_wait_task(u, vec![Semaphore(1), Semaphore(2)]).expect("wait");

    assert_eq!(g.dag, vec![d0, d1, w]);
    assert_eq!(g.reorder_barriers, vec![2]);
    assert!(g.task(w).expect("w").depends_on(d0));
    assert!(g.task(d1).expect("d1").is_closed());
    assert_eq!(g.active_task, None);
    assert_eq!(g.last_task.get(&u), Some(&w));
    g.validate().expect("valid");
}

#[test]
fn validate_rejects_an_open_task_off_the_tail() {
    let mut g = TaskDag::new();
    let s = surface(&mut g);
    let t = surface(&mut g);
    let d1 = g.new_drawing_task(s, 0).expect("d1");
    g.new_drawing_task(t, 0).expect("d2");
    g.tasks.get_mut(&d1).expect("d1").flags.closed = false;

    let err = g.validate().expect_err("open task off the tail");
    assert!(err.to_string().contains("open but not active"));
}

#[test]
fn closing_all_tasks_clears_the_active_task() {
    let mut g = TaskDag::new();
    let s = surface(&mut g);
    let d = g.new_drawing_task(s, 0).expect("d");
    g.close_all_tasks();
    assert_eq!(g.active_task, None);
    assert!(g.task(d).expect("d").is_closed());
}

#[test]
fn teardown_unbinds_transients_once_per_backing() {
    let mut g = TaskDag::new();
    let a = g
        .resources
        .create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8).transient());
    let b = g
        .resources
        .create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8).transient());
    let keep = surface(&mut g);
    g.resources.instantiate(a, BackingId(7));
    g.resources.instantiate(b, BackingId(7));
    g.resources.instantiate(keep, BackingId(8));
    g.new_drawing_task(a, 0).expect("draw");
    g.new_drawing_task(keep, 0).expect("draw");

    let released = g.remove_render_tasks();

    assert_eq!(released, vec![BackingId(7)]);
    assert!(g.dag.is_empty());
    assert!(g.tasks.is_empty());
    assert!(g.last_task.is_empty());
    assert!(!g.resources.is_instantiated(a));
    assert!(g.resources.is_instantiated(keep));
}

#[test]
fn dump_marks_the_active_task() {
    let mut g = TaskDag::new();
    let s = surface(&mut g);
    let t = surface(&mut g);
    g.new_drawing_task(s, 0).expect("d0");
    g.new_drawing_task(t, 0).expect("d1");
    assert_eq!(
        g.dump(),
        "  0: T0 draw [C----] targets=[R0] deps=[]\n  1: T1 draw [-----] targets=[R1] deps=[] (active)\n"
    );
}

#[test]
fn atlas_stays_open_when_read() {
    let mut g = TaskDag::new();
    let atlas = surface(&mut g);
    let s = surface(&mut g);
    let d = g.new_drawing_task(s, 0).expect("d");
    let a = g.new_atlas_task(atlas, None).expect("atlas");
    assert_eq!(g.dag, vec![a, d]);

    g.record_draw(
        d,
        DrawOp::new("glyphs", IRect::from_size(8, 8)).sampling(atlas, Mipmapped::No),
    )
    .expect("record");
    assert!(!g.task(a).expect("atlas").is_closed());
    assert!(g.task(d).expect("d").depends_on(a));
    assert!(g.task(a).and_then(Task::as_draw).is_some());
    g.validate().expect("valid");
}
