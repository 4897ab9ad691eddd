//! Texture loading seam between scene construction and the GPU.

/// Opaque reference to a loaded texture, issued by an [`AssetSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

impl TextureHandle {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("texture '{name}' not found at {path}")]
    NotFound { name: String, path: String },
    #[error("texture '{name}' could not be decoded: {reason}")]
    Decode { name: String, reason: String },
}

/// Anything that can turn a texture file name into a usable handle.
pub trait AssetSource {
    fn load_texture(&mut self, name: &str) -> Result<TextureHandle, AssetError>;
}
