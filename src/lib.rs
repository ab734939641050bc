//! flushgraph schedules GPU render tasks and assigns their backing memory.
//!
//! Producers record work into a [`DrawingManager`]: drawing tasks, copies, buffer transfers,
//! pixel uploads, semaphore waits and imported sub-graphs. Each task declares the resources it
//! writes and reads; the manager wires dependency edges from that. A flush then:
//!
//! - closes and topologically sorts the task list, partitioned at reorder barriers
//! - runs on-flush callbacks that may add last-minute work such as atlases
//! - optionally clusters tasks by target and merges adjacent draws
//! - assigns backing memory through a [`ResourceAllocator`] (all or nothing)
//! - executes every instantiated task against a [`Device`] and tears the list down
//!
//! [`HeadlessDevice`] is a deterministic in-memory device used by the `flushgraph` replay
//! binary and by tests.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod alloc;
mod device;
mod foundation;
mod manager;
mod resource;
mod schedule;
mod task;

/// JSON replay scripts for the `flushgraph` binary.
pub mod script;

pub use crate::alloc::contract::{ResourceAllocator, UsageHint};
pub use crate::alloc::interval::{AllocatorStats, IntervalAllocator};
pub use crate::device::backend::{Device, DeviceCaps, FlushCallback};
pub use crate::device::command::{Command, LoadOp, Semaphore, SurfaceAccess, SurfaceLayout};
pub use crate::device::flush_state::{FlushState, TokenTracker};
pub use crate::device::headless::{HeadlessDevice, HeadlessDeviceOpts};
pub use crate::device::pool::BackingCacheStats;
pub use crate::foundation::error::{FlushError, FlushResult};
pub use crate::foundation::geom::IRect;
pub use crate::foundation::ids::{BackingId, DrawToken, FlushToken, ResourceId, TaskId};
pub use crate::manager::drawing_manager::DrawingManager;
pub use crate::manager::flush::{FlushInfo, FlushStats, SemaphoresSubmitted};
pub use crate::manager::on_flush::{OnFlushCallback, OnFlushResourceProvider};
pub use crate::manager::options::DrawingManagerOpts;
pub use crate::resource::desc::{Lifetime, Mipmapped, PixelFormat, ResourceDesc, ResourceKind};
pub use crate::resource::table::{ResourceEntry, ResourceTable};
pub use crate::task::buffer::{BufferTransferTask, BufferUpdateTask};
pub use crate::task::copy::CopyTask;
pub use crate::task::draw::{DrawOp, DrawTask, SampledResource};
pub use crate::task::resolve::{ResolveFlags, TextureResolveTask};
pub use crate::task::subgraph::{SubGraphTask, TaskGraph};
pub use crate::task::transfer::TransferFromSurfaceTask;
pub use crate::task::wait::WaitTask;
pub use crate::task::write_pixels::WritePixelsTask;
pub use crate::task::{Task, TaskFlags, TaskKind};
