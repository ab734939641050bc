use crate::device::backend::Device;
use crate::device::command::Command;
use crate::foundation::ids::{BackingId, DrawToken, FlushToken, ResourceId};
use crate::resource::table::ResourceTable;

/// Issues monotonically increasing draw and flush tokens.
///
/// A draw token is issued per executed draw; the flush token advances once per flush so
/// post-flush callbacks can tell which of their uploads have landed.
#[derive(Debug, Default)]
pub struct TokenTracker {
    next_draw: u64,
    next_flush: u64,
}

impl TokenTracker {
    /// Issue the next draw token.
    pub fn issue_draw_token(&mut self) -> DrawToken {
        let t = DrawToken(self.next_draw);
        self.next_draw = self.next_draw.saturating_add(1);
        t
    }

    /// Token the next draw will receive.
    pub fn next_draw_token(&self) -> DrawToken {
        DrawToken(self.next_draw)
    }

    /// Advance the flush token.
    pub fn issue_flush_token(&mut self) -> FlushToken {
        let t = FlushToken(self.next_flush);
        self.next_flush = self.next_flush.saturating_add(1);
        t
    }

    /// Token of the flush that has not started yet.
    pub fn next_flush_token(&self) -> FlushToken {
        FlushToken(self.next_flush)
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct StagingStats {
    pub(crate) allocated: u64,
    pub(crate) reused: u64,
    pub(crate) dropped: u64,
}

/// CPU staging buffers for per-flush vertex uploads.
///
/// Buffers handed out during a flush are returned by [`StagingPool::reset`]; at most
/// `max_cached` of them stay cached for the next flush.
#[derive(Debug)]
pub(crate) struct StagingPool {
    max_cached: usize,
    cached: Vec<usize>,
    in_use: Vec<usize>,
    pending_bytes: usize,
    stats: StagingStats,
}

impl StagingPool {
    pub(crate) fn new(max_cached: usize) -> Self {
        Self {
            max_cached,
            cached: Vec::new(),
            in_use: Vec::new(),
            pending_bytes: 0,
            stats: StagingStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> StagingStats {
        self.stats.clone()
    }

    pub(crate) fn cached_len(&self) -> usize {
        self.cached.len()
    }

    /// Reserve `bytes` of staging space for the upload that precedes execution.
    pub(crate) fn stage(&mut self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let fit = self
            .cached
            .iter()
            .enumerate()
            .filter(|(_, cap)| **cap >= bytes)
            .min_by_key(|(_, cap)| **cap)
            .map(|(i, _)| i);
        let cap = match fit {
            Some(i) => {
                self.stats.reused = self.stats.reused.saturating_add(1);
                self.cached.swap_remove(i)
            }
            None => {
                self.stats.allocated = self.stats.allocated.saturating_add(1);
                bytes.next_power_of_two()
            }
        };
        self.in_use.push(cap);
        self.pending_bytes = self.pending_bytes.saturating_add(bytes);
    }

    /// Bytes staged since the last upload.
    pub(crate) fn take_pending(&mut self) -> usize {
        std::mem::take(&mut self.pending_bytes)
    }

    pub(crate) fn reset(&mut self) {
        self.pending_bytes = 0;
        for cap in self.in_use.drain(..) {
            if self.cached.len() < self.max_cached {
                self.cached.push(cap);
            } else {
                self.stats.dropped = self.stats.dropped.saturating_add(1);
            }
        }
    }
}

/// Everything a task may touch while it prepares and executes.
pub struct FlushState<'a> {
    device: &'a mut dyn Device,
    resources: &'a ResourceTable,
    tokens: &'a mut TokenTracker,
    staging: &'a mut StagingPool,
}

impl<'a> FlushState<'a> {
    pub(crate) fn new(
        device: &'a mut dyn Device,
        resources: &'a ResourceTable,
        tokens: &'a mut TokenTracker,
        staging: &'a mut StagingPool,
    ) -> Self {
        Self {
            device,
            resources,
            tokens,
            staging,
        }
    }

    /// Resource table as bound by the allocator.
    pub fn resources(&self) -> &ResourceTable {
        self.resources
    }

    /// Bound backing of `id`.
    pub fn backing(&self, id: ResourceId) -> Option<BackingId> {
        self.resources.backing(id)
    }

    /// Record one device command.
    pub fn encode(&mut self, cmd: Command) {
        self.device.encode(cmd);
    }

    /// Token tracker shared across flushes.
    pub fn tokens(&mut self) -> &mut TokenTracker {
        self.tokens
    }

    /// Reserve staging space for vertex data.
    pub fn stage(&mut self, bytes: usize) {
        self.staging.stage(bytes);
    }

    pub(crate) fn device(&mut self) -> &mut dyn Device {
        &mut *self.device
    }

    /// Upload everything staged during prepare.
    pub(crate) fn pre_execute_draws(&mut self) {
        let bytes = self.staging.take_pending();
        if bytes > 0 {
            self.device.encode(Command::StagingUpload { bytes });
        }
    }

    pub(crate) fn reset(&mut self) {
        self.staging.reset();
    }
}
