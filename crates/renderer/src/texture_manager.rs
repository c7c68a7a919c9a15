//! Texture cache keyed by file path.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use meshview_resources::{ImageData, ResourceManager};
use meshview_rhi::device::Device;
use meshview_rhi::texture::Texture;

use crate::error::{RenderError, RenderResult};

pub struct TextureManager {
    cache: ResourceManager<Texture>,
    device: Arc<Device>,
}

impl TextureManager {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            cache: ResourceManager::new(),
            device,
        }
    }

    /// Decodes the image at `path` and uploads it, or returns the texture
    /// already loaded from that file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be decoded, or if
    /// the upload fails.
    pub fn create_texture_from_file(&mut self, path: &Path) -> RenderResult<Arc<Texture>> {
        let device = &self.device;
        self.cache
            .create_resource_from_file(path, |full_path| -> Result<Texture, RenderError> {
                let image = ImageData::load(full_path)?;
                let texture =
                    Texture::from_rgba8(device.clone(), image.width, image.height, &image.pixels)?;
                info!(
                    "Texture uploaded: {:?} ({}x{})",
                    full_path, image.width, image.height
                );
                Ok(texture)
            })
    }

    /// Number of textures currently cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
