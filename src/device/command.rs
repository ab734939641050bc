use crate::foundation::geom::IRect;
use crate::foundation::ids::BackingId;

/// How a render pass initializes its color attachment.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOp {
    /// Keep existing contents.
    #[default]
    Load,
    /// Clear to a straight RGBA color.
    Clear([f32; 4]),
    /// Contents are undefined on load.
    Discard,
}

/// Opaque synchronization primitive handed out by the embedding graphics API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Semaphore(pub u64);

/// What the caller intends to do with flushed surfaces afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SurfaceAccess {
    /// No special preparation.
    #[default]
    NoAccess,
    /// Surfaces are about to be presented.
    Present,
}

/// Layout a flushed surface is transitioned into after the flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceLayout {
    /// Ready to be sampled by another API.
    ShaderRead,
    /// Ready to be rendered to by another API.
    ColorAttachment,
    /// Ready for transfer reads.
    TransferSrc,
}

/// One unit of work recorded into a device's command stream.
///
/// All references are to bound backings; the scheduler resolves resource handles before encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// One render pass with its draws, by label.
    RenderPass {
        /// Color attachment.
        target: BackingId,
        /// Attachment load behavior.
        load: LoadOp,
        /// Region written by the pass.
        bounds: IRect,
        /// Draw labels in submission order.
        draws: Vec<String>,
    },
    /// Surface to surface copy.
    CopySurface {
        /// Source backing.
        src: BackingId,
        /// Source region.
        src_rect: IRect,
        /// Destination backing.
        dst: BackingId,
        /// Destination region.
        dst_rect: IRect,
    },
    /// Buffer to buffer byte copy.
    TransferBuffer {
        /// Source buffer.
        src: BackingId,
        /// Byte offset into `src`.
        src_offset: usize,
        /// Destination buffer.
        dst: BackingId,
        /// Byte offset into `dst`.
        dst_offset: usize,
        /// Bytes moved.
        size: usize,
    },
    /// Host bytes written into a buffer.
    UpdateBuffer {
        /// Destination buffer.
        dst: BackingId,
        /// Byte offset into `dst`.
        offset: usize,
        /// Bytes written.
        size: usize,
    },
    /// Block the queue on external semaphores.
    WaitSemaphores {
        /// Surface whose consumers are gated.
        target: BackingId,
        /// Semaphores waited on.
        semaphores: Vec<Semaphore>,
    },
    /// Surface pixels read into a buffer.
    TransferFromSurface {
        /// Source surface.
        src: BackingId,
        /// Region read.
        rect: IRect,
        /// Destination buffer.
        dst: BackingId,
        /// Byte offset into `dst`.
        dst_offset: usize,
    },
    /// Host pixels uploaded into a surface.
    WritePixels {
        /// Destination surface.
        dst: BackingId,
        /// Region written.
        rect: IRect,
        /// Mip levels supplied.
        levels: u32,
    },
    /// MSAA buffer resolved into its single-sample texture.
    ResolveMsaa {
        /// Surface resolved.
        target: BackingId,
        /// Region resolved.
        rect: IRect,
    },
    /// Mip chain rebuilt from the base level.
    RegenerateMips {
        /// Surface whose mips are rebuilt.
        target: BackingId,
    },
    /// Staged vertex data copied to the device before draws run.
    StagingUpload {
        /// Bytes uploaded.
        bytes: usize,
    },
    /// Semaphores signalled at the end of a flush.
    SignalSemaphores {
        /// Number of semaphores.
        count: usize,
    },
    /// Flushed surfaces prepared for outside access.
    PrepareSurfaces {
        /// Surfaces prepared.
        targets: Vec<BackingId>,
        /// Requested access.
        access: SurfaceAccess,
        /// Requested layout, if any.
        layout: Option<SurfaceLayout>,
    },
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::RenderPass {
                target,
                load,
                bounds,
                draws,
            } => write!(
                f,
                "render_pass target=B{} load={load:?} bounds={bounds:?} draws={draws:?}",
                target.0
            ),
            Command::CopySurface {
                src,
                src_rect,
                dst,
                dst_rect,
            } => write!(
                f,
                "copy_surface B{}{src_rect:?} -> B{}{dst_rect:?}",
                src.0, dst.0
            ),
            Command::TransferBuffer {
                src,
                src_offset,
                dst,
                dst_offset,
                size,
            } => write!(
                f,
                "transfer_buffer B{}+{src_offset} -> B{}+{dst_offset} ({size} bytes)",
                src.0, dst.0
            ),
            Command::UpdateBuffer { dst, offset, size } => {
                write!(f, "update_buffer B{}+{offset} ({size} bytes)", dst.0)
            }
            Command::WaitSemaphores { target, semaphores } => {
                write!(f, "wait target=B{} semaphores={}", target.0, semaphores.len())
            }
            Command::TransferFromSurface {
                src,
                rect,
                dst,
                dst_offset,
            } => write!(
                f,
                "transfer_from_surface B{}{rect:?} -> B{}+{dst_offset}",
                src.0, dst.0
            ),
            Command::WritePixels { dst, rect, levels } => {
                write!(f, "write_pixels B{}{rect:?} levels={levels}", dst.0)
            }
            Command::ResolveMsaa { target, rect } => {
                write!(f, "resolve_msaa B{}{rect:?}", target.0)
            }
            Command::RegenerateMips { target } => write!(f, "regenerate_mips B{}", target.0),
            Command::StagingUpload { bytes } => write!(f, "staging_upload {bytes} bytes"),
            Command::SignalSemaphores { count } => write!(f, "signal_semaphores {count}"),
            Command::PrepareSurfaces {
                targets,
                access,
                layout,
            } => {
                let ids: Vec<u64> = targets.iter().map(|b| b.0).collect();
                write!(f, "prepare_surfaces {ids:?} access={access:?} layout={layout:?}")
            }
        }
    }
}
