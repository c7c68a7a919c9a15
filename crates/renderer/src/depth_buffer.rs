//! The depth target shared by every draw in a frame.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use meshview_rhi::RhiResult;
use meshview_rhi::device::Device;
use meshview_rhi::image::{Image, ImageDesc};

pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// A device-local [`DEFAULT_DEPTH_FORMAT`] image matching the swap chain
/// extent. Rebuilt whenever the swap chain is.
pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    /// # Errors
    ///
    /// Fails for a zero extent or when the image cannot be allocated.
    pub fn new(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        let image = Image::new(device, &desc(width, height))?;
        debug!("Depth buffer {}x{}", width, height);
        Ok(Self { image })
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }
}

fn desc(width: u32, height: u32) -> ImageDesc {
    ImageDesc {
        width,
        height,
        format: DEFAULT_DEPTH_FORMAT,
        usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        aspect: vk::ImageAspectFlags::DEPTH,
        name: "depth",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_is_depth_attachment() {
        let d = desc(640, 480);
        assert_eq!((d.width, d.height), (640, 480));
        assert_eq!(d.format, vk::Format::D32_SFLOAT);
        assert_eq!(d.aspect, vk::ImageAspectFlags::DEPTH);
        assert_eq!(d.usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
    }
}
