//! Resource shapes and definitions.

use std::fmt;

use crate::pool::ObjectId;
use crate::types::{BufferUsage, Extent3d, TextureFormat, TextureUsage};

/// Pool class of a resource.
///
/// Objects of the same kind can be reallocated in place into each other's
/// shape; objects of different kinds never share memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Sampled or storage image.
    Image,
    /// Linear buffer.
    Buffer,
    /// Render target set (color attachments plus optional depth).
    Framebuffer,
}

impl ResourceKind {
    /// Short name used in logs and capture exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Buffer => "buffer",
            Self::Framebuffer => "framebuffer",
        }
    }
}

/// Shape of an image resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageShape {
    /// Size of the image.
    pub size: Extent3d,
    /// Pixel format.
    pub format: TextureFormat,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Usage flags.
    pub usage: TextureUsage,
}

/// Shape of a buffer resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferShape {
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

/// Shape of a framebuffer resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferShape {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Formats of the color attachments, in binding order.
    pub color_formats: Vec<TextureFormat>,
    /// Format of the depth/stencil attachment, if any.
    pub depth_format: Option<TextureFormat>,
    /// Sample count shared by all attachments.
    pub sample_count: u32,
}

/// Complete description of a physical resource.
///
/// Shapes are compared field by field: two resources are poolable together
/// only when their shapes are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceShape {
    /// An image.
    Image(ImageShape),
    /// A buffer.
    Buffer(BufferShape),
    /// A framebuffer.
    Framebuffer(FramebufferShape),
}

impl ResourceShape {
    /// Create a single-sampled 2D image shape with one mip level.
    pub fn image_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self::Image(ImageShape {
            size: Extent3d::new_2d(width, height),
            format,
            mip_level_count: 1,
            sample_count: 1,
            usage,
        })
    }

    /// Create a buffer shape.
    pub fn buffer(size: u64, usage: BufferUsage) -> Self {
        Self::Buffer(BufferShape { size, usage })
    }

    /// Create a single-sampled framebuffer shape.
    pub fn framebuffer(
        width: u32,
        height: u32,
        color_formats: Vec<TextureFormat>,
        depth_format: Option<TextureFormat>,
    ) -> Self {
        Self::Framebuffer(FramebufferShape {
            width,
            height,
            color_formats,
            depth_format,
            sample_count: 1,
        })
    }

    /// Pool class of this shape.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Image(_) => ResourceKind::Image,
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Framebuffer(_) => ResourceKind::Framebuffer,
        }
    }

    /// Whether an object of shape `other` can serve this shape without changes.
    #[inline]
    pub fn is_compatible(&self, other: &ResourceShape) -> bool {
        self == other
    }

    /// Whether an object of shape `other` can be reallocated into this shape.
    #[inline]
    pub fn same_pool_class(&self, other: &ResourceShape) -> bool {
        self.kind() == other.kind()
    }

    /// Estimated memory footprint in bytes, ignoring backend alignment.
    pub fn estimated_size(&self) -> u64 {
        match self {
            Self::Image(image) => {
                let base = image.size.texel_count()
                    * image.format.block_size() as u64
                    * image.sample_count.max(1) as u64;
                // Full mip chain adds at most a third on top of the base level.
                if image.mip_level_count > 1 {
                    base + base / 3
                } else {
                    base
                }
            }
            Self::Buffer(buffer) => buffer.size,
            Self::Framebuffer(fb) => {
                let texels = fb.width as u64 * fb.height as u64 * fb.sample_count.max(1) as u64;
                let per_texel: u64 = fb
                    .color_formats
                    .iter()
                    .chain(fb.depth_format.iter())
                    .map(|format| format.block_size() as u64)
                    .sum();
                texels * per_texel
            }
        }
    }
}

impl fmt::Display for ResourceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(image) => write!(
                f,
                "image {}x{}x{} {:?} mips={} samples={}",
                image.size.width,
                image.size.height,
                image.size.depth,
                image.format,
                image.mip_level_count,
                image.sample_count
            ),
            Self::Buffer(buffer) => write!(f, "buffer {} bytes", buffer.size),
            Self::Framebuffer(fb) => {
                write!(f, "framebuffer {}x{} color=[", fb.width, fb.height)?;
                for (i, format) in fb.color_formats.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{format:?}")?;
                }
                f.write_str("]")?;
                if let Some(depth) = fb.depth_format {
                    write!(f, " depth={depth:?}")?;
                }
                write!(f, " samples={}", fb.sample_count)
            }
        }
    }
}

/// Definition of a logical resource, supplied at declaration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDef {
    /// Shape the backing object must have.
    pub shape: ResourceShape,
    /// Specific object to reuse, e.g. a history buffer kept across frames.
    pub identity: Option<ObjectId>,
    /// Mark the backing object constant once acquired.
    pub constant: bool,
}

impl ResourceDef {
    /// Create a definition for a transient resource of the given shape.
    pub fn new(shape: ResourceShape) -> Self {
        Self {
            shape,
            identity: None,
            constant: false,
        }
    }

    /// Request a specific physical object.
    pub fn with_identity(mut self, identity: ObjectId) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Mark the backing object constant: it survives every flush.
    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = constant;
        self
    }

    /// Pool class of the definition's shape.
    pub fn kind(&self) -> ResourceKind {
        self.shape.kind()
    }
}

impl From<ResourceShape> for ResourceDef {
    fn from(shape: ResourceShape) -> Self {
        Self::new(shape)
    }
}
