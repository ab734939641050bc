use crate::device::backend::{Device, DeviceCaps, FlushCallback};
use crate::device::command::{Command, SurfaceAccess, SurfaceLayout};
use crate::device::pool::{BackingCacheStats, BackingPool, BackingPoolOpts};
use crate::foundation::error::{FlushError, FlushResult};
use crate::foundation::ids::BackingId;
use crate::resource::desc::{ResourceDesc, ResourceKind};
use std::collections::HashMap;

/// Configuration for [`HeadlessDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeadlessDeviceOpts {
    /// Ceiling on live plus cached backing bytes.
    pub budget_bytes: usize,
    /// Maximum bytes of released backings kept for reuse.
    pub max_cached_bytes: usize,
    /// Maximum released backings kept per descriptor.
    pub max_cached_per_bucket: usize,
    /// Reported capabilities.
    pub caps: DeviceCaps,
}

impl Default for HeadlessDeviceOpts {
    fn default() -> Self {
        Self {
            budget_bytes: 256 * 1024 * 1024,
            max_cached_bytes: 64 * 1024 * 1024,
            max_cached_per_bucket: 8,
            caps: DeviceCaps::default(),
        }
    }
}

/// Deterministic in-memory [`Device`]: hands out numbered backings under a byte budget, keeps a
/// bounded cache of released ones, and logs every encoded command.
///
/// Used by the replay binary and as the reference device in tests.
pub struct HeadlessDevice {
    opts: HeadlessDeviceOpts,
    pool: BackingPool,
    live: HashMap<BackingId, (ResourceKind, usize)>,
    live_bytes: usize,
    next_backing: u64,
    log: Vec<Command>,
    pending_submitted: Vec<FlushCallback>,
    pending_finished: Vec<FlushCallback>,
    submits: u64,
    created: u64,
    abandoned: bool,
    out_of_memory: bool,
    flush_requested: bool,
}

impl std::fmt::Debug for HeadlessDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessDevice")
            .field("live_backings", &self.live.len())
            .field("live_bytes", &self.live_bytes)
            .field("commands", &self.log.len())
            .field("submits", &self.submits)
            .field("abandoned", &self.abandoned)
            .finish()
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(HeadlessDeviceOpts::default())
    }
}

impl HeadlessDevice {
    /// Create a device with the given budget and cache limits.
    pub fn new(opts: HeadlessDeviceOpts) -> Self {
        Self {
            opts,
            pool: BackingPool::new(BackingPoolOpts {
                max_pool_bytes: opts.max_cached_bytes,
                max_backings_per_bucket: opts.max_cached_per_bucket,
            }),
            live: HashMap::new(),
            live_bytes: 0,
            next_backing: 1,
            log: Vec::new(),
            pending_submitted: Vec::new(),
            pending_finished: Vec::new(),
            submits: 0,
            created: 0,
            abandoned: false,
            out_of_memory: false,
            flush_requested: false,
        }
    }

    /// Every command encoded so far, in order.
    pub fn commands(&self) -> &[Command] {
        &self.log
    }

    /// Drain the command log.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.log)
    }

    /// Number of successful submissions.
    pub fn submit_count(&self) -> u64 {
        self.submits
    }

    /// Number of backings created from scratch (cache hits excluded).
    pub fn created_count(&self) -> u64 {
        self.created
    }

    /// Backings currently handed out.
    pub fn live_backings(&self) -> usize {
        self.live.len()
    }

    /// Bytes currently handed out.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Bytes held by the release cache.
    pub fn cached_bytes(&self) -> usize {
        self.pool.stats().retained_bytes
    }

    /// Release-cache counters.
    pub fn cache_stats(&self) -> BackingCacheStats {
        self.pool.stats()
    }

    /// Simulate context loss. Sticky.
    pub fn abandon(&mut self) {
        self.abandoned = true;
        self.fail_pending_callbacks();
    }

    /// Make every subsequent backing creation fail.
    pub fn set_out_of_memory(&mut self, oom: bool) {
        self.out_of_memory = oom;
    }

    /// Ask the owner to flush at its next opportunity.
    pub fn request_flush(&mut self) {
        self.flush_requested = true;
    }

    fn fail_pending_callbacks(&mut self) {
        for cb in self.pending_submitted.drain(..) {
            cb(false);
        }
        for cb in self.pending_finished.drain(..) {
            cb(false);
        }
    }

    fn purge_cache_to(&mut self, keep_bytes: usize) {
        let evicted = self.pool.purge_to(keep_bytes);
        tracing::trace!(evicted = evicted.len(), "purged cached backings");
    }
}

impl Device for HeadlessDevice {
    fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    fn caps(&self) -> &DeviceCaps {
        &self.opts.caps
    }

    fn create_backing(&mut self, desc: &ResourceDesc) -> FlushResult<BackingId> {
        if self.abandoned {
            return Err(FlushError::Abandoned);
        }
        if self.out_of_memory {
            return Err(FlushError::allocation("device out of memory"));
        }
        let bytes = desc.byte_size();
        if bytes == 0 {
            return Err(FlushError::device(format!(
                "zero-sized backing requested for {:?}",
                desc.kind
            )));
        }

        if let Some(b) = self.pool.take(&desc.kind) {
            self.live.insert(b, (desc.kind, bytes));
            self.live_bytes = self.live_bytes.saturating_add(bytes);
            return Ok(b);
        }

        let needed = self.live_bytes.saturating_add(bytes);
        if needed > self.opts.budget_bytes {
            return Err(FlushError::allocation(format!(
                "{bytes} bytes requested with {} of {} budget bytes live",
                self.live_bytes, self.opts.budget_bytes
            )));
        }
        self.purge_cache_to(self.opts.budget_bytes - needed);

        let b = BackingId(self.next_backing);
        self.next_backing = self.next_backing.saturating_add(1);
        self.created = self.created.saturating_add(1);
        self.live.insert(b, (desc.kind, bytes));
        self.live_bytes = needed;
        Ok(b)
    }

    fn release_backing(&mut self, backing: BackingId) {
        let Some((kind, bytes)) = self.live.remove(&backing) else {
            return;
        };
        self.live_bytes = self.live_bytes.saturating_sub(bytes);
        if !self.abandoned {
            self.pool.release(kind, bytes, backing);
        }
    }

    fn make_budget_headroom(&mut self, bytes: usize) -> bool {
        let needed = self.live_bytes.saturating_add(bytes);
        if needed > self.opts.budget_bytes {
            return false;
        }
        let keep = self.opts.budget_bytes - needed;
        if self.cached_bytes() > keep {
            self.purge_cache_to(keep);
        }
        true
    }

    fn encode(&mut self, cmd: Command) {
        if !self.abandoned {
            self.log.push(cmd);
        }
    }

    fn submit(&mut self, _sync_to_cpu: bool) -> bool {
        if self.abandoned {
            self.fail_pending_callbacks();
            return false;
        }
        self.submits = self.submits.saturating_add(1);
        // Work completes as soon as it is submitted.
        for cb in self.pending_submitted.drain(..) {
            cb(true);
        }
        for cb in self.pending_finished.drain(..) {
            cb(true);
        }
        true
    }

    fn execute_flush_info(
        &mut self,
        targets: &[BackingId],
        access: SurfaceAccess,
        layout: Option<SurfaceLayout>,
        num_semaphores: usize,
        submitted: Option<FlushCallback>,
        finished: Option<FlushCallback>,
    ) {
        if self.abandoned {
            if let Some(cb) = submitted {
                cb(false);
            }
            if let Some(cb) = finished {
                cb(false);
            }
            return;
        }
        if num_semaphores > 0 && self.opts.caps.semaphore_support {
            self.log.push(Command::SignalSemaphores {
                count: num_semaphores,
            });
        }
        if !targets.is_empty() && (access != SurfaceAccess::NoAccess || layout.is_some()) {
            self.log.push(Command::PrepareSurfaces {
                targets: targets.to_vec(),
                access,
                layout,
            });
        }
        self.pending_submitted.extend(submitted);
        self.pending_finished.extend(finished);
    }

    fn purge_as_needed(&mut self) {
        self.flush_requested = false;
        let headroom = self.opts.budget_bytes.saturating_sub(self.live_bytes);
        self.purge_cache_to(headroom.min(self.opts.max_cached_bytes));
    }

    fn free_gpu_resources(&mut self) {
        self.purge_cache_to(0);
    }

    fn requests_flush(&self) -> bool {
        self.flush_requested
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/headless.rs"]
mod tests;
