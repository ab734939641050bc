use crate::foundation::geom::IRect;

/// Texel formats understood by the allocator's size accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit RGBA.
    Rgba8,
    /// 8-bit BGRA.
    Bgra8,
    /// 8-bit single-channel coverage.
    Alpha8,
    /// 16-bit float RGBA.
    Rgba16F,
}

impl PixelFormat {
    /// Bytes per texel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Alpha8 => 1,
            PixelFormat::Rgba16F => 8,
        }
    }
}

/// Whether a surface carries (or a reader requires) a full mip chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mipmapped {
    /// Base level only.
    #[default]
    No,
    /// Full mip chain.
    Yes,
}

/// How long a resource's backing must survive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Backing is dedicated and kept across flushes.
    #[default]
    Persistent,
    /// Contents only matter within one flush: backing may be shared with other transient
    /// resources whose liveness does not overlap, and is released when the flush ends.
    Transient,
}

fn one() -> u8 {
    1
}

/// Shape of the memory a resource needs. Two resources with equal kinds can share backing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    /// A sampled/renderable image.
    Surface {
        /// Width in texels.
        width: u32,
        /// Height in texels.
        height: u32,
        /// Texel format.
        format: PixelFormat,
        /// Whether the surface owns a mip chain.
        #[serde(default)]
        mipmapped: Mipmapped,
        /// MSAA sample count; values above 1 require a manual resolve before sampling.
        #[serde(default = "one")]
        sample_count: u8,
    },
    /// A linear byte buffer.
    Buffer {
        /// Size in bytes.
        size: usize,
    },
}

/// Declared size and format of a resource handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ResourceDesc {
    /// Memory shape.
    #[serde(flatten)]
    pub kind: ResourceKind,
    /// Backing lifetime policy.
    #[serde(default)]
    pub lifetime: Lifetime,
}

impl ResourceDesc {
    /// Single-sampled, non-mipmapped persistent surface.
    pub fn surface(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            kind: ResourceKind::Surface {
                width,
                height,
                format,
                mipmapped: Mipmapped::No,
                sample_count: 1,
            },
            lifetime: Lifetime::Persistent,
        }
    }

    /// Persistent buffer of `size` bytes.
    pub fn buffer(size: usize) -> Self {
        Self {
            kind: ResourceKind::Buffer { size },
            lifetime: Lifetime::Persistent,
        }
    }

    /// Request a full mip chain (surfaces only).
    pub fn with_mipmaps(mut self) -> Self {
        if let ResourceKind::Surface { mipmapped, .. } = &mut self.kind {
            *mipmapped = Mipmapped::Yes;
        }
        self
    }

    /// Request `samples` MSAA samples (surfaces only).
    pub fn with_samples(mut self, samples: u8) -> Self {
        if let ResourceKind::Surface { sample_count, .. } = &mut self.kind {
            *sample_count = samples.max(1);
        }
        self
    }

    /// Mark as [`Lifetime::Transient`].
    pub fn transient(mut self) -> Self {
        self.lifetime = Lifetime::Transient;
        self
    }

    /// Return `true` for surfaces.
    pub fn is_surface(&self) -> bool {
        matches!(self.kind, ResourceKind::Surface { .. })
    }

    /// Return `true` for buffers.
    pub fn is_buffer(&self) -> bool {
        matches!(self.kind, ResourceKind::Buffer { .. })
    }

    /// Whether the surface owns a mip chain.
    pub fn mipmapped(&self) -> Mipmapped {
        match self.kind {
            ResourceKind::Surface { mipmapped, .. } => mipmapped,
            ResourceKind::Buffer { .. } => Mipmapped::No,
        }
    }

    /// Multisampled surfaces keep a separate MSAA buffer that must be resolved before sampling.
    pub fn requires_manual_msaa_resolve(&self) -> bool {
        matches!(self.kind, ResourceKind::Surface { sample_count, .. } if sample_count > 1)
    }

    /// Full backing-store bounds of a surface.
    pub fn bounds(&self) -> Option<IRect> {
        match self.kind {
            ResourceKind::Surface { width, height, .. } => Some(IRect::from_size(width, height)),
            ResourceKind::Buffer { .. } => None,
        }
    }

    /// Buffer length in bytes.
    pub fn buffer_size(&self) -> Option<usize> {
        match self.kind {
            ResourceKind::Buffer { size } => Some(size),
            ResourceKind::Surface { .. } => None,
        }
    }

    /// Bytes per texel of a surface; buffers count single bytes.
    pub fn bytes_per_pixel(&self) -> usize {
        match self.kind {
            ResourceKind::Surface { format, .. } => format.bytes_per_pixel(),
            ResourceKind::Buffer { .. } => 1,
        }
    }

    /// Bytes of device memory the backing occupies.
    ///
    /// MSAA surfaces count the sample buffer plus the single-sampled resolve target.
    pub fn byte_size(&self) -> usize {
        match self.kind {
            ResourceKind::Buffer { size } => size,
            ResourceKind::Surface {
                width,
                height,
                format,
                mipmapped,
                sample_count,
            } => {
                let bpp = format.bytes_per_pixel();
                let mut w = width as usize;
                let mut h = height as usize;
                let mut total = w.saturating_mul(h).saturating_mul(bpp);
                if mipmapped == Mipmapped::Yes {
                    while w > 1 || h > 1 {
                        w = (w / 2).max(1);
                        h = (h / 2).max(1);
                        total = total.saturating_add(w.saturating_mul(h).saturating_mul(bpp));
                    }
                }
                if sample_count > 1 {
                    let msaa = (width as usize)
                        .saturating_mul(height as usize)
                        .saturating_mul(bpp)
                        .saturating_mul(sample_count as usize);
                    total = total.saturating_add(msaa);
                }
                total
            }
        }
    }
}
