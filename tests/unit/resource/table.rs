use super::*;
use crate::resource::desc::{PixelFormat, ResourceDesc};

#[test]
fn wrapped_resources_start_instantiated() {
    let mut t = ResourceTable::new();
    let a = t.create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8));
    let b = t.wrap(ResourceDesc::buffer(64), BackingId(7));
    assert!(!t.is_instantiated(a));
    assert!(t.is_instantiated(b));
    assert!(t.entry(b).is_wrapped());
    assert_eq!(t.backing(b), Some(BackingId(7)));
}

#[test]
fn mipmap_dirt_only_sticks_to_mipmapped_surfaces() {
    let mut t = ResourceTable::new();
    let plain = t.create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8));
    let mipped = t.create(ResourceDesc::surface(8, 8, PixelFormat::Rgba8).with_mipmaps());
    t.mark_mipmaps_dirty(plain);
    t.mark_mipmaps_dirty(mipped);
    assert!(!t.entry(plain).mipmaps_dirty());
    assert!(t.entry(mipped).mipmaps_dirty());
    t.mark_mipmaps_clean(mipped);
    assert!(!t.entry(mipped).mipmaps_dirty());
}

#[test]
fn msaa_dirty_rect_accumulates_until_resolved() {
    let mut t = ResourceTable::new();
    let s = t.create(ResourceDesc::surface(32, 32, PixelFormat::Rgba8).with_samples(4));
    assert!(t.requires_manual_msaa_resolve(s));
    t.mark_msaa_dirty(s, IRect::from_xywh(0, 0, 4, 4));
    t.mark_msaa_dirty(s, IRect::from_xywh(8, 8, 4, 4));
    assert_eq!(
        t.entry(s).msaa_dirty_rect(),
        Some(IRect::from_ltrb(0, 0, 12, 12))
    );
    t.mark_msaa_resolved(s);
    assert_eq!(t.entry(s).msaa_dirty_rect(), None);
}

#[test]
fn import_redirects_target_and_keeps_wrapped_backing() {
    let mut recorder = ResourceTable::new();
    let rec_target = recorder.create(ResourceDesc::surface(16, 16, PixelFormat::Rgba8));
    let rec_scratch = recorder.create(ResourceDesc::surface(4, 4, PixelFormat::Alpha8).transient());
    let rec_wrapped = recorder.wrap(ResourceDesc::buffer(32), BackingId(3));

    let mut live = ResourceTable::new();
    let dest = live.create(ResourceDesc::surface(16, 16, PixelFormat::Rgba8));
    let map = live.import(&recorder, Some((rec_target, dest)));

    assert_eq!(map[rec_target.0 as usize], dest);
    assert_ne!(map[rec_scratch.0 as usize], dest);
    assert_eq!(live.len(), 3);
    assert_eq!(live.backing(map[rec_wrapped.0 as usize]), Some(BackingId(3)));
    assert!(!live.is_instantiated(map[rec_scratch.0 as usize]));
}

#[test]
fn release_transients_dedups_shared_backing() {
    let mut t = ResourceTable::new();
    let a = t.create(ResourceDesc::surface(4, 4, PixelFormat::Rgba8).transient());
    let b = t.create(ResourceDesc::surface(4, 4, PixelFormat::Rgba8).transient());
    let p = t.create(ResourceDesc::surface(4, 4, PixelFormat::Rgba8));
    t.instantiate(a, BackingId(1));
    t.instantiate(b, BackingId(1));
    t.instantiate(p, BackingId(2));

    let released = t.release_transients();
    assert_eq!(released, vec![BackingId(1)]);
    assert!(!t.is_instantiated(a));
    assert!(!t.is_instantiated(b));
    assert!(t.is_instantiated(p));
}
