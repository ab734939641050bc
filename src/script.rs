//! Replay scripts: a JSON list of resource declarations and recording steps, executed against a
//! [`HeadlessDevice`].
//!
//! Resources are referenced by their index in `resources`. Rectangles are `[l, t, r, b]`.
//!
//! ```json
//! {
//!   "manager": { "reduce_task_splitting": true },
//!   "resources": [
//!     { "kind": "surface", "width": 64, "height": 64, "format": "rgba8" },
//!     { "kind": "buffer", "size": 16384 }
//!   ],
//!   "steps": [
//!     { "op": "draw", "target": 0, "ops": [{ "label": "bg", "bounds": [0, 0, 64, 64] }] },
//!     { "op": "transfer_from_surface", "src": 0, "rect": [0, 0, 64, 64], "dst": 1 },
//!     { "op": "flush" }
//!   ]
//! }
//! ```

use crate::device::command::{LoadOp, Semaphore, SurfaceAccess};
use crate::device::headless::{HeadlessDevice, HeadlessDeviceOpts};
use crate::foundation::error::{FlushError, FlushResult};
use crate::foundation::geom::IRect;
use crate::foundation::ids::{ResourceId, TaskId};
use crate::manager::drawing_manager::DrawingManager;
use crate::manager::flush::{FlushInfo, FlushStats};
use crate::manager::options::DrawingManagerOpts;
use crate::resource::desc::ResourceDesc;
use crate::task::Task;
use crate::task::draw::DrawOp;
use crate::task::resolve::ResolveFlags;

fn one() -> usize {
    1
}

/// A replayable recording session.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Script {
    /// Simulated device limits and capabilities.
    pub device: HeadlessDeviceOpts,
    /// Scheduling options.
    pub manager: DrawingManagerOpts,
    /// Resources declared up front; `ResourceId(i)` is the i-th entry.
    pub resources: Vec<ResourceDesc>,
    /// Recording steps in order.
    pub steps: Vec<Step>,
}

/// One recording step.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Open a drawing task on `target` and record `ops` into it.
    Draw {
        /// Surface drawn into.
        target: ResourceId,
        /// Recording group; only tasks of one group merge.
        #[serde(default)]
        group: u32,
        /// Attachment load behavior.
        #[serde(default)]
        load: LoadOp,
        /// Draws recorded.
        #[serde(default)]
        ops: Vec<DrawOp>,
        /// Keep this task from being folded into an earlier one.
        #[serde(default)]
        cannot_merge_backward: bool,
    },
    /// Open an atlas task on `target`, retiring the previous atlas of this script.
    Atlas {
        /// Atlas surface.
        target: ResourceId,
        /// Draws recorded into the atlas.
        #[serde(default)]
        ops: Vec<DrawOp>,
    },
    /// Copy a surface region.
    Copy {
        /// Source surface.
        src: ResourceId,
        /// Source region.
        src_rect: IRect,
        /// Destination surface.
        dst: ResourceId,
        /// Destination region.
        dst_rect: IRect,
    },
    /// Copy bytes between buffers.
    BufferTransfer {
        /// Source buffer.
        src: ResourceId,
        /// Byte offset into `src`.
        #[serde(default)]
        src_offset: usize,
        /// Destination buffer.
        dst: ResourceId,
        /// Byte offset into `dst`.
        #[serde(default)]
        dst_offset: usize,
        /// Bytes moved.
        size: usize,
    },
    /// Write `len` zero bytes into a buffer.
    BufferUpdate {
        /// Destination buffer.
        dst: ResourceId,
        /// Byte offset into `dst`.
        #[serde(default)]
        offset: usize,
        /// Bytes written.
        len: usize,
    },
    /// Read a surface region into a buffer.
    TransferFromSurface {
        /// Source surface.
        src: ResourceId,
        /// Region read.
        rect: IRect,
        /// Destination buffer.
        dst: ResourceId,
        /// Byte offset into `dst`.
        #[serde(default)]
        dst_offset: usize,
    },
    /// Upload zeroed pixels into a surface region.
    WritePixels {
        /// Destination surface.
        dst: ResourceId,
        /// Region written.
        rect: IRect,
        /// Mip levels supplied.
        #[serde(default = "one")]
        levels: usize,
    },
    /// Gate consumers of `resource` behind external semaphores.
    Wait {
        /// Resource gated.
        resource: ResourceId,
        /// Semaphores waited on.
        semaphores: Vec<Semaphore>,
    },
    /// Resolve MSAA and/or regenerate mips now.
    Resolve {
        /// Surface resolved.
        resource: ResourceId,
        /// What to resolve.
        #[serde(default)]
        flags: ResolveFlags,
    },
    /// Mark a surface as write-only.
    FramebufferOnly {
        /// Surface marked.
        resource: ResourceId,
    },
    /// Close the active drawing task.
    Close,
    /// Flush everything recorded so far.
    Flush {
        /// Surfaces about to be consumed.
        #[serde(default)]
        targets: Vec<ResourceId>,
        /// Semaphores to signal.
        #[serde(default)]
        semaphores: usize,
        /// Prepare `targets` for presentation.
        #[serde(default)]
        present: bool,
    },
    /// Submit pending device work.
    Submit {
        /// Block until completion.
        #[serde(default)]
        sync: bool,
    },
}

/// Outcome of one `flush` step.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FlushReport {
    /// Index of the step in the script.
    pub step: usize,
    /// Whether the flush succeeded.
    pub ok: bool,
    /// Sorted task list as it entered the flush, one task per line.
    pub plan: Vec<String>,
    /// Device commands issued since the previous report.
    pub commands: Vec<String>,
}

/// Outcome of a whole replay.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Replay {
    /// One entry per `flush` step.
    pub flushes: Vec<FlushReport>,
    /// Manager counters at the end of the script.
    pub stats: FlushStats,
    /// Device submissions, intermediate ones included.
    pub submits: u64,
    /// Tasks still recorded when the script ended.
    pub unflushed_tasks: usize,
}

impl Script {
    /// Parse a script from JSON text.
    pub fn from_json(text: &str) -> FlushResult<Self> {
        serde_json::from_str(text).map_err(|e| FlushError::serde(e.to_string()))
    }

    /// Replay every step against a fresh [`HeadlessDevice`].
    ///
    /// Stops at the first step whose input is rejected. Failed flushes are not errors; they show
    /// up as reports with `ok == false`.
    #[tracing::instrument(level = "debug", skip_all, fields(steps = self.steps.len()))]
    pub fn run(&self) -> FlushResult<Replay> {
        let mut m = DrawingManager::new(HeadlessDevice::new(self.device), self.manager.clone());
        for desc in &self.resources {
            m.create_resource(*desc);
        }

        let mut replayer = Replayer {
            manager: m,
            atlas: None,
            reports: Vec::new(),
        };
        for (i, step) in self.steps.iter().enumerate() {
            replayer.apply(i, step).map_err(|e| {
                tracing::warn!(step = i, %e, "step rejected");
                FlushError::Other(anyhow::Error::new(e).context(format!("script step {i}")))
            })?;
        }

        let Replayer {
            manager, reports, ..
        } = replayer;
        let submits = manager.device().map_or(0, HeadlessDevice::submit_count);
        Ok(Replay {
            flushes: reports,
            stats: *manager.stats(),
            submits,
            unflushed_tasks: manager.task_ids().len(),
        })
    }
}

struct Replayer {
    manager: DrawingManager<HeadlessDevice>,
    atlas: Option<TaskId>,
    reports: Vec<FlushReport>,
}

impl Replayer {
    fn record_ops(&mut self, task: TaskId, ops: &[DrawOp]) -> FlushResult<()> {
        for op in ops {
            self.manager.record_draw(task, op.clone())?;
        }
        Ok(())
    }

    /// Zeroed mip levels for an upload, sized only after `rect` and `levels` are checked.
    fn pixel_levels(
        &self,
        dst: ResourceId,
        rect: IRect,
        levels: usize,
    ) -> FlushResult<Vec<Vec<u8>>> {
        let bounds = self.manager.graph.check_surface(dst)?;
        if rect.is_empty() || !bounds.contains(rect) {
            return Err(FlushError::validation(format!(
                "write rect {rect:?} is empty or outside {bounds:?}"
            )));
        }
        let max_levels = (u32::BITS - rect.width().max(rect.height()).leading_zeros()) as usize;
        if levels == 0 || levels > max_levels {
            return Err(FlushError::validation(format!(
                "{levels} mip levels requested, {rect:?} has at most {max_levels}"
            )));
        }

        let bpp = self.manager.resources().desc(dst).bytes_per_pixel();
        let (mut w, mut h) = (rect.width() as usize, rect.height() as usize);
        let mut out = Vec::with_capacity(levels);
        for _ in 0..levels {
            let bytes = w
                .checked_mul(h)
                .and_then(|n| n.checked_mul(bpp))
                .ok_or_else(|| FlushError::validation(format!("{rect:?} is too large to upload")))?;
            out.push(vec![0u8; bytes]);
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
        Ok(out)
    }

    /// Zeroed update payload, sized only after the range is checked against `dst`.
    fn update_bytes(&self, dst: ResourceId, offset: usize, len: usize) -> FlushResult<Vec<u8>> {
        let size = self.manager.graph.check_buffer(dst)?;
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(vec![0; len]),
            _ => Err(FlushError::validation(format!(
                "buffer update range {offset}+{len} exceeds {size} bytes"
            ))),
        }
    }

    fn apply(&mut self, index: usize, step: &Step) -> FlushResult<()> {
        let m = &mut self.manager;
        match step {
            Step::Draw {
                target,
                group,
                load,
                ops,
                cannot_merge_backward,
            } => {
                let task = m.new_drawing_task_in_group(*target, *group)?;
                m.set_load_op(task, *load)?;
                m.set_cannot_merge_backward(task, *cannot_merge_backward)?;
                self.record_ops(task, ops)?;
            }
            Step::Atlas { target, ops } => {
                let previous = self
                    .atlas
                    .filter(|&p| m.task(p).is_some_and(Task::is_atlas));
                let task = m.new_atlas_task(*target, previous)?;
                self.atlas = Some(task);
                self.record_ops(task, ops)?;
            }
            Step::Copy {
                src,
                src_rect,
                dst,
                dst_rect,
            } => {
                if m.new_copy_task(*src, *src_rect, *dst, *dst_rect)?.is_none() {
                    tracing::debug!(step = index, "copy dropped");
                }
            }
            Step::BufferTransfer {
                src,
                src_offset,
                dst,
                dst_offset,
                size,
            } => {
                m.new_buffer_transfer_task(*src, *src_offset, *dst, *dst_offset, *size)?;
            }
            Step::BufferUpdate { dst, offset, len } => {
                let data = self.update_bytes(*dst, *offset, *len)?;
                self.manager.new_buffer_update_task(*dst, *offset, data)?;
            }
            Step::TransferFromSurface {
                src,
                rect,
                dst,
                dst_offset,
            } => {
                m.new_transfer_from_surface_task(*src, *rect, *dst, *dst_offset)?;
            }
            Step::WritePixels { dst, rect, levels } => {
                let data = self.pixel_levels(*dst, *rect, *levels)?;
                self.manager.new_write_pixels_task(*dst, *rect, data)?;
            }
            Step::Wait {
                resource,
                semaphores,
            } => {
                m.new_wait_task(*resource, semaphores.clone())?;
            }
            Step::Resolve { resource, flags } => {
                m.new_texture_resolve_task(*resource, *flags)?;
            }
            Step::FramebufferOnly { resource } => {
                m.set_framebuffer_only(*resource, true)?;
            }
            Step::Close => m.close_active_task(),
            Step::Flush {
                targets,
                semaphores,
                present,
            } => {
                m.close_and_sort();
                let plan: Vec<String> = m.dump().lines().map(str::to_owned).collect();
                let access = if *present {
                    SurfaceAccess::Present
                } else {
                    SurfaceAccess::NoAccess
                };
                let info = FlushInfo {
                    num_semaphores: *semaphores,
                    ..FlushInfo::default()
                };
                let ok = m.flush(targets, access, info, None);
                let commands: Vec<String> = m
                    .device_mut()
                    .map(|d| d.take_commands().iter().map(ToString::to_string).collect())
                    .unwrap_or_default();
                self.atlas = None;
                self.reports.push(FlushReport {
                    step: index,
                    ok,
                    plan,
                    commands,
                });
            }
            Step::Submit { sync } => {
                m.submit(*sync);
            }
        }
        Ok(())
    }
}
