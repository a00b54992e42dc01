//! Pixel formats of pooled images and framebuffer attachments.

/// Pixel format. Part of an image shape, so differing formats never pool together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Depth or depth/stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32Float)
    }

    /// Bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float | Self::Rg8Unorm => 2,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.is_depth_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn test_block_size() {
        assert_eq!(TextureFormat::R8Unorm.block_size(), 1);
        assert_eq!(TextureFormat::Rgba8Unorm.block_size(), 4);
        assert_eq!(TextureFormat::Rgba16Float.block_size(), 8);
        assert_eq!(TextureFormat::Rgba32Float.block_size(), 16);
    }
}
