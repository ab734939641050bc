use crate::foundation::geom::IRect;
use crate::foundation::ids::{BackingId, ResourceId};
use crate::resource::desc::{Lifetime, Mipmapped, ResourceDesc};
use std::collections::HashSet;

/// State the scheduler tracks for one resource handle.
#[derive(Clone, Debug)]
pub struct ResourceEntry {
    desc: ResourceDesc,
    backing: Option<BackingId>,
    wrapped: bool,
    framebuffer_only: bool,
    msaa_dirty: Option<IRect>,
    mipmaps_dirty: bool,
}

impl ResourceEntry {
    fn new(desc: ResourceDesc) -> Self {
        Self {
            desc,
            backing: None,
            wrapped: false,
            framebuffer_only: false,
            msaa_dirty: None,
            mipmaps_dirty: false,
        }
    }

    /// Declared descriptor.
    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    /// Bound backing memory, if instantiated.
    pub fn backing(&self) -> Option<BackingId> {
        self.backing
    }

    /// Return `true` once backing memory is bound.
    pub fn is_instantiated(&self) -> bool {
        self.backing.is_some()
    }

    /// Backing was supplied from outside the scheduler and is never released by it.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Contents cannot be read back (no copies out of it).
    pub fn is_framebuffer_only(&self) -> bool {
        self.framebuffer_only
    }

    /// Region of the MSAA buffer written since the last resolve.
    pub fn msaa_dirty_rect(&self) -> Option<IRect> {
        self.msaa_dirty
    }

    /// Return `true` when mip levels are stale relative to the base level.
    pub fn mipmaps_dirty(&self) -> bool {
        self.mipmaps_dirty
    }
}

/// Registry of resource handles referenced by tasks.
///
/// Handles are created by producers and consumed by the scheduler; the allocator binds backing
/// memory to them once per flush.
#[derive(Clone, Debug, Default)]
pub struct ResourceTable {
    entries: Vec<ResourceEntry>,
}

impl ResourceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new, not yet instantiated resource.
    pub fn create(&mut self, desc: ResourceDesc) -> ResourceId {
        let id = ResourceId(u32::try_from(self.entries.len()).unwrap_or(u32::MAX));
        self.entries.push(ResourceEntry::new(desc));
        id
    }

    /// Declare a resource whose backing already exists outside the scheduler.
    pub fn wrap(&mut self, desc: ResourceDesc, backing: BackingId) -> ResourceId {
        let id = self.create(desc);
        let e = &mut self.entries[id.0 as usize];
        e.backing = Some(backing);
        e.wrapped = true;
        id
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` when no resource was declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return `true` when `id` names a declared resource.
    pub fn contains(&self, id: ResourceId) -> bool {
        (id.0 as usize) < self.entries.len()
    }

    /// Look up a resource.
    pub fn get(&self, id: ResourceId) -> Option<&ResourceEntry> {
        self.entries.get(id.0 as usize)
    }

    /// Look up a resource, panicking on ids this table did not hand out.
    pub fn entry(&self, id: ResourceId) -> &ResourceEntry {
        &self.entries[id.0 as usize]
    }

    /// Descriptor of `id`.
    pub fn desc(&self, id: ResourceId) -> &ResourceDesc {
        &self.entry(id).desc
    }

    /// Bound backing of `id`, if any.
    pub fn backing(&self, id: ResourceId) -> Option<BackingId> {
        self.entry(id).backing
    }

    /// Return `true` once `id` has backing memory.
    pub fn is_instantiated(&self, id: ResourceId) -> bool {
        self.entry(id).is_instantiated()
    }

    /// Mark `id` as not readable (copies from it are refused).
    pub fn set_framebuffer_only(&mut self, id: ResourceId, framebuffer_only: bool) {
        self.entries[id.0 as usize].framebuffer_only = framebuffer_only;
    }

    /// All declared ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        (0..self.entries.len()).map(|i| ResourceId(i as u32))
    }

    pub(crate) fn instantiate(&mut self, id: ResourceId, backing: BackingId) {
        self.entries[id.0 as usize].backing = Some(backing);
    }

    pub(crate) fn requires_manual_msaa_resolve(&self, id: ResourceId) -> bool {
        self.entry(id).desc.requires_manual_msaa_resolve()
    }

    pub(crate) fn mark_msaa_dirty(&mut self, id: ResourceId, rect: IRect) {
        let e = &mut self.entries[id.0 as usize];
        e.msaa_dirty = Some(e.msaa_dirty.map_or(rect, |r| r.join(rect)));
    }

    pub(crate) fn mark_msaa_resolved(&mut self, id: ResourceId) {
        self.entries[id.0 as usize].msaa_dirty = None;
    }

    pub(crate) fn mark_mipmaps_dirty(&mut self, id: ResourceId) {
        let e = &mut self.entries[id.0 as usize];
        if e.desc.mipmapped() == Mipmapped::Yes {
            e.mipmaps_dirty = true;
        }
    }

    pub(crate) fn mark_mipmaps_clean(&mut self, id: ResourceId) {
        self.entries[id.0 as usize].mipmaps_dirty = false;
    }

    /// Copy every entry of `other` into this table and return the id each one received.
    ///
    /// `redirect` maps one of `other`'s ids onto an existing id of this table instead of
    /// declaring a new resource.
    pub(crate) fn import(
        &mut self,
        other: &ResourceTable,
        redirect: Option<(ResourceId, ResourceId)>,
    ) -> Vec<ResourceId> {
        let mut map = Vec::with_capacity(other.entries.len());
        for (i, e) in other.entries.iter().enumerate() {
            let from = ResourceId(i as u32);
            if let Some((src, dst)) = redirect
                && src == from
            {
                map.push(dst);
                continue;
            }
            let id = self.create(e.desc);
            let dst = &mut self.entries[id.0 as usize];
            dst.framebuffer_only = e.framebuffer_only;
            if e.wrapped {
                dst.backing = e.backing;
                dst.wrapped = true;
            }
            map.push(id);
        }
        map
    }

    /// Unbind transient resources and return each distinct backing they held.
    pub(crate) fn release_transients(&mut self) -> Vec<BackingId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for e in &mut self.entries {
            if e.wrapped || e.desc.lifetime != Lifetime::Transient {
                continue;
            }
            if let Some(b) = e.backing.take()
                && seen.insert(b)
            {
                out.push(b);
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/resource/table.rs"]
mod tests;
