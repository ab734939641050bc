use super::*;
use crate::resource::desc::PixelFormat;
use std::cell::Cell;
use std::rc::Rc;

fn surface(w: u32, h: u32) -> ResourceDesc {
    ResourceDesc::surface(w, h, PixelFormat::Rgba8)
}

#[test]
fn released_backings_are_reused_for_matching_descriptors() {
    let mut d = HeadlessDevice::default();
    let a = d.create_backing(&surface(8, 8)).unwrap();
    d.release_backing(a);
    assert_eq!(d.live_backings(), 0);
    assert_eq!(d.cached_bytes(), 256);

    let b = d.create_backing(&surface(8, 8)).unwrap();
    assert_eq!(a, b);
    assert_eq!(d.created_count(), 1);

    let c = d.create_backing(&surface(4, 4)).unwrap();
    assert_ne!(b, c);
    assert_eq!(d.created_count(), 2);
}

#[test]
fn budget_is_enforced_after_purging_the_cache() {
    let mut d = HeadlessDevice::new(HeadlessDeviceOpts {
        budget_bytes: 512,
        ..HeadlessDeviceOpts::default()
    });
    let a = d.create_backing(&surface(8, 8)).unwrap();
    d.release_backing(a);
    assert_eq!(d.cached_bytes(), 256);

    // 12x8 only fits once the cached 8x8 is dropped.
    let _big = d.create_backing(&surface(12, 8)).unwrap();
    assert_eq!(d.cached_bytes(), 0);
    assert_eq!(d.live_bytes(), 384);

    let err = d.create_backing(&surface(8, 8)).unwrap_err();
    assert!(err.to_string().starts_with("allocation error:"));
}

#[test]
fn zero_sized_backings_are_refused() {
    let mut d = HeadlessDevice::default();
    assert!(matches!(
        d.create_backing(&ResourceDesc::buffer(0)),
        Err(FlushError::Device(_))
    ));
    let err = d.create_backing(&surface(0, 8)).unwrap_err();
    assert!(err.to_string().starts_with("device error:"));
    assert_eq!(d.live_backings(), 0);
    assert_eq!(d.created_count(), 0);
}

#[test]
fn headroom_fails_only_when_live_bytes_leave_no_room() {
    let mut d = HeadlessDevice::new(HeadlessDeviceOpts {
        budget_bytes: 300,
        ..HeadlessDeviceOpts::default()
    });
    let a = d.create_backing(&surface(8, 8)).unwrap();
    assert!(!d.make_budget_headroom(100));
    d.release_backing(a);
    assert!(d.make_budget_headroom(100));
    assert_eq!(d.cached_bytes(), 0);
}

#[test]
fn callbacks_fire_on_submit() {
    let mut d = HeadlessDevice::default();
    let submitted = Rc::new(Cell::new(None));
    let finished = Rc::new(Cell::new(None));
    let s = submitted.clone();
    let f = finished.clone();
    d.execute_flush_info(
        &[],
        SurfaceAccess::NoAccess,
        None,
        0,
        Some(Box::new(move |ok| s.set(Some(ok)))),
        Some(Box::new(move |ok| f.set(Some(ok)))),
    );
    assert_eq!(submitted.get(), None);
    assert!(d.submit(false));
    assert_eq!(submitted.get(), Some(true));
    assert_eq!(finished.get(), Some(true));
    assert_eq!(d.submit_count(), 1);
}

#[test]
fn abandon_fails_pending_callbacks_and_future_work() {
    let mut d = HeadlessDevice::default();
    let submitted = Rc::new(Cell::new(None));
    let s = submitted.clone();
    d.execute_flush_info(
        &[],
        SurfaceAccess::NoAccess,
        None,
        0,
        Some(Box::new(move |ok| s.set(Some(ok)))),
        None,
    );
    d.abandon();
    assert_eq!(submitted.get(), Some(false));
    assert!(!d.submit(true));
    assert!(matches!(
        d.create_backing(&surface(1, 1)),
        Err(FlushError::Abandoned)
    ));
}

#[test]
fn semaphores_are_signalled_only_with_support() {
    let mut d = HeadlessDevice::new(HeadlessDeviceOpts {
        caps: DeviceCaps {
            semaphore_support: false,
            ..DeviceCaps::default()
        },
        ..HeadlessDeviceOpts::default()
    });
    d.execute_flush_info(&[BackingId(1)], SurfaceAccess::Present, None, 2, None, None);
    assert_eq!(d.commands().len(), 1);
    assert!(matches!(d.commands()[0], Command::PrepareSurfaces { .. }));
}
