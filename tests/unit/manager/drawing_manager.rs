use super::*;
use crate::device::backend::DeviceCaps;
use crate::device::command::Command;
use crate::device::headless::HeadlessDeviceOpts;
use crate::resource::desc::PixelFormat;
use std::cell::Cell;
use std::rc::Rc;

fn manager(opts: DrawingManagerOpts) -> DrawingManager {
    DrawingManager::new(HeadlessDevice::default(), opts)
}

fn rgba(w: u32, h: u32) -> ResourceDesc {
    ResourceDesc::surface(w, h, PixelFormat::Rgba8)
}

fn render_passes(m: &DrawingManager) -> Vec<Vec<String>> {
    m.device()
        .expect("device")
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::RenderPass { draws, .. } => Some(draws.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn recorder_refuses_to_flush_and_fails_callbacks() {
    let mut m: DrawingManager = DrawingManager::recorder(DrawingManagerOpts::default());
    let seen = Rc::new(Cell::new(None));
    let s2 = Rc::clone(&seen);
    let info = FlushInfo {
        submitted: Some(Box::new(move |ok| s2.set(Some(ok)))),
        ..FlushInfo::default()
    };
    assert!(!m.flush(&[], SurfaceAccess::NoAccess, info, None));
    assert_eq!(seen.get(), Some(false));
    assert_eq!(m.stats().flushes, 0);
}

#[test]
fn recorded_graph_replays_into_destination() {
    let mut rec: DrawingManager = DrawingManager::recorder(DrawingManagerOpts::default());
    let canvas = rec.create_resource(rgba(16, 16));
    let d = rec.new_drawing_task(canvas).expect("draw");
    rec.record_draw(d, DrawOp::new("recorded", IRect::from_size(16, 16)))
        .expect("record");
    let graph = rec.detach_task_graph(Some(canvas)).expect("detach");
    assert!(rec.task_ids().is_empty());
    assert_eq!(graph.tasks().len(), 1);

    let mut m = manager(DrawingManagerOpts::default());
    let dest = m.create_resource(rgba(16, 16));
    let sub = m.new_subgraph_task(graph, dest).expect("import");
    let t = m.task(sub).expect("subgraph");
    assert!(t.is_closed());
    assert!(t.requires_explicit_cleanup());
    assert_eq!(t.targets(), &[dest]);

    assert!(m.flush(&[], SurfaceAccess::NoAccess, FlushInfo::default(), None));
    assert_eq!(render_passes(&m), vec![vec!["recorded".to_string()]]);
    assert_eq!(m.stats().tasks_executed, 1);
}

#[test]
fn pixel_upload_flushes_first_when_vram_is_not_preferred() {
    let device = HeadlessDevice::new(HeadlessDeviceOpts {
        caps: DeviceCaps {
            prefer_vram_use_over_flushes: false,
            ..DeviceCaps::default()
        },
        ..HeadlessDeviceOpts::default()
    });
    let mut m = DrawingManager::new(device, DrawingManagerOpts::default());
    let s = m.create_resource(rgba(4, 4));
    let t = m.create_resource(rgba(4, 4));
    let d = m.new_drawing_task(s).expect("draw");
    m.record_draw(d, DrawOp::new("before", IRect::from_size(4, 4)))
        .expect("record");

    let w = m
        .new_write_pixels_task(t, IRect::from_size(2, 2), vec![vec![0; 16]])
        .expect("upload");

    assert_eq!(m.stats().flushes, 1);
    assert_eq!(render_passes(&m), vec![vec!["before".to_string()]]);
    assert_eq!(m.task_ids(), &[w]);
}

#[test]
fn pixel_upload_is_recorded_lazily_by_default() {
    let mut m = manager(DrawingManagerOpts::default());
    let s = m.create_resource(rgba(4, 4));
    let d = m.new_drawing_task(s).expect("draw");
    let w = m
        .new_write_pixels_task(s, IRect::from_size(4, 4), vec![vec![0; 64]])
        .expect("upload");
    assert_eq!(m.stats().flushes, 0);
    assert_eq!(m.task_ids(), &[d, w]);
    assert!(m.task(w).expect("w").depends_on(d));
}

#[test]
fn short_upload_is_rejected() {
    let mut m = manager(DrawingManagerOpts::default());
    let s = m.create_resource(rgba(4, 4));
    let err = m
        .new_write_pixels_task(s, IRect::from_size(4, 4), vec![vec![0; 8]])
        .expect_err("too few bytes");
    assert!(err.to_string().starts_with("validation error:"));
    assert!(m.task_ids().is_empty());
}

#[test]
fn copy_from_framebuffer_only_surface_is_dropped() {
    let mut m = manager(DrawingManagerOpts::default());
    let s = m.create_resource(rgba(4, 4));
    let t = m.create_resource(rgba(4, 4));
    m.set_framebuffer_only(s, true).expect("surface");
    let r = IRect::from_size(4, 4);
    assert_eq!(m.new_copy_task(s, r, t, r).expect("copy"), None);
    assert!(m.task_ids().is_empty());
}

#[test]
fn frequent_submits_bound_in_flight_work() {
    let mut m = manager(DrawingManagerOpts {
        max_tasks_before_submit: 2,
        ..DrawingManagerOpts::default()
    });
    for i in 0..5 {
        let s = m.create_resource(rgba(4, 4));
        let d = m.new_drawing_task(s).expect("draw");
        m.record_draw(d, DrawOp::new(format!("d{i}"), IRect::from_size(4, 4)))
            .expect("record");
    }
    assert!(m.flush(&[], SurfaceAccess::NoAccess, FlushInfo::default(), None));
    assert_eq!(m.stats().tasks_executed, 5);
    assert_eq!(m.stats().intermediate_submits, 2);
    assert_eq!(m.device().expect("device").submit_count(), 2);
}

#[test]
fn detach_rejects_a_buffer_target() {
    let mut rec: DrawingManager = DrawingManager::recorder(DrawingManagerOpts::default());
    let b = rec.create_resource(ResourceDesc::buffer(8));
    assert!(rec.detach_task_graph(Some(b)).is_err());
}
