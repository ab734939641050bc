use crate::device::command::{Command, SurfaceAccess, SurfaceLayout};
use crate::foundation::error::FlushResult;
use crate::foundation::ids::BackingId;
use crate::resource::desc::ResourceDesc;

/// Callback invoked once with the outcome of a flush or submission.
pub type FlushCallback = Box<dyn FnOnce(bool)>;

/// Capabilities the scheduler consults when deciding how to schedule work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceCaps {
    /// Signal semaphores can be inserted at the end of a flush.
    pub semaphore_support: bool,
    /// Keep staging memory alive instead of flushing before each pixel upload.
    pub prefer_vram_use_over_flushes: bool,
    /// Vertex data is better kept client-side; fewer staging buffers are cached.
    pub prefer_client_side_dynamic_buffers: bool,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            semaphore_support: true,
            prefer_vram_use_over_flushes: true,
            prefer_client_side_dynamic_buffers: false,
        }
    }
}

/// The device side of a flush: backing memory, a command stream and a submission queue.
///
/// Implementations are expected to be single-threaded and owned by exactly one
/// [`crate::DrawingManager`].
pub trait Device {
    /// The context was lost; every flush fails until it is recreated.
    fn is_abandoned(&self) -> bool;

    /// Static capabilities.
    fn caps(&self) -> &DeviceCaps;

    /// Obtain backing memory matching `desc`, reusing cached memory when possible.
    fn create_backing(&mut self, desc: &ResourceDesc) -> FlushResult<BackingId>;

    /// Return backing memory previously obtained from [`Device::create_backing`].
    fn release_backing(&mut self, backing: BackingId);

    /// Purge cached memory until `bytes` more fit under the budget; `false` if they never can.
    fn make_budget_headroom(&mut self, bytes: usize) -> bool;

    /// Append one command to the pending command stream.
    fn encode(&mut self, cmd: Command);

    /// Submit pending commands. Blocks until completion when `sync_to_cpu` is set.
    fn submit(&mut self, sync_to_cpu: bool) -> bool;

    /// Finish a flush: signal `num_semaphores`, prepare `targets` for `access`, and queue the
    /// callbacks so they fire on the next submission.
    fn execute_flush_info(
        &mut self,
        targets: &[BackingId],
        access: SurfaceAccess,
        layout: Option<SurfaceLayout>,
        num_semaphores: usize,
        submitted: Option<FlushCallback>,
        finished: Option<FlushCallback>,
    );

    /// Release cached memory that is no longer needed.
    fn purge_as_needed(&mut self);

    /// Drop every cached backing.
    fn free_gpu_resources(&mut self);

    /// The memory cache is under pressure and would benefit from a flush.
    fn requests_flush(&self) -> bool;
}
