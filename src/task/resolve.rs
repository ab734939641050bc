use crate::alloc::contract::{ResourceAllocator, UsageHint};
use crate::device::command::Command;
use crate::device::flush_state::FlushState;
use crate::foundation::geom::IRect;
use crate::foundation::ids::ResourceId;
use crate::task::{TaskBehavior, remap};

/// What a resolve task does to one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ResolveFlags {
    /// Resolve the multisampled buffer.
    #[serde(default)]
    pub msaa: bool,
    /// Regenerate the mip chain.
    #[serde(default)]
    pub mipmaps: bool,
}

impl ResolveFlags {
    /// Neither resolve requested.
    pub fn is_empty(self) -> bool {
        !self.msaa && !self.mipmaps
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ResolveEntry {
    pub(crate) resource: ResourceId,
    pub(crate) msaa: Option<IRect>,
    pub(crate) mipmaps: bool,
}

/// Resolves MSAA and regenerates mips for each of its targets, in target order.
#[derive(Clone, Debug, Default)]
pub struct TextureResolveTask {
    entries: Vec<ResolveEntry>,
}

impl TextureResolveTask {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: ResolveEntry) {
        self.entries.push(entry);
    }

    /// `(resource, msaa rect, regenerate mips)` for every resolved resource.
    pub fn entries(&self) -> impl Iterator<Item = (ResourceId, Option<IRect>, bool)> + '_ {
        self.entries.iter().map(|e| (e.resource, e.msaa, e.mipmaps))
    }
}

impl TaskBehavior for TextureResolveTask {
    fn name(&self) -> &'static str {
        "texture_resolve"
    }

    fn gather_intervals(&self, targets: &[ResourceId], alloc: &mut dyn ResourceAllocator) {
        let cur = alloc.cur_op();
        for &t in targets {
            alloc.add_interval(t, cur, cur, UsageHint::USE);
        }
        alloc.inc_ops();
    }

    fn execute(&mut self, _targets: &[ResourceId], state: &mut FlushState<'_>) -> bool {
        let mut issued = false;
        for e in &self.entries {
            let Some(target) = state.backing(e.resource) else {
                continue;
            };
            if let Some(rect) = e.msaa {
                state.encode(Command::ResolveMsaa { target, rect });
                issued = true;
            }
            if e.mipmaps {
                state.encode(Command::RegenerateMips { target });
                issued = true;
            }
        }
        issued
    }

    fn remap_resources(&mut self, map: &[ResourceId]) {
        for e in &mut self.entries {
            e.resource = remap(map, e.resource);
        }
    }
}
