//! Usage flags of pooled resources.
//!
//! Usage is part of a resource's shape: an object created for sampling only
//! cannot stand in for a render attachment.

use bitflags::bitflags;

bitflags! {
    /// How an image may be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        /// Sampled from shaders.
        const TEXTURE_BINDING = 1 << 2;
        /// Read and written as a storage image.
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

bitflags! {
    /// How a buffer may be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        /// Source of indirect draw or dispatch arguments.
        const INDIRECT = 1 << 4;
        const COPY_SRC = 1 << 5;
        const COPY_DST = 1 << 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_usage_is_empty() {
        assert!(TextureUsage::default().is_empty());
        assert!(BufferUsage::default().is_empty());
    }
}
