//! Sampled 2D textures uploaded from RGBA8 pixel data.
//!
//! Upload goes through a staging buffer and a one-shot command buffer on the
//! graphics queue. The call blocks until the copy has finished, so the staging
//! memory is released before returning.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc};
use crate::sampler::Sampler;
use crate::sync::Fence;

/// Format used for every color texture.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// A shader-readable image together with its sampler.
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Uploads `pixels` (tightly packed RGBA8, `width * height * 4` bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel slice length does not match the
    /// dimensions, or if any allocation, submission or wait fails.
    pub fn from_rgba8(
        device: Arc<Device>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        check_pixel_len(width, height, pixels.len())?;

        let image = Image::new(
            device.clone(),
            &ImageDesc {
                width,
                height,
                format: TEXTURE_FORMAT,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
                name: "texture",
            },
        )?;

        let staging = Buffer::from_bytes(device.clone(), BufferUsage::Staging, pixels)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let pool = CommandPool::transient(device.clone(), graphics_family)?;
        let cmd = CommandBuffer::allocate(device.clone(), &pool)?;

        cmd.begin()?;
        cmd.transition_image_layout(
            image.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        cmd.copy_buffer_to_image(staging.handle(), image.handle(), image.extent());
        cmd.transition_image_layout(
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        cmd.end()?;

        let fence = Fence::new(device.clone(), false)?;
        let command_buffers = [cmd.handle()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        // SAFETY: The command buffer is fully recorded and the fence is unsignaled.
        unsafe { device.submit_graphics(&[submit_info], fence.handle())? };
        fence.wait(u64::MAX)?;

        let sampler = Sampler::new_linear_repeat(device)?;

        info!("Uploaded {}x{} texture", width, height);

        Ok(Self { image, sampler })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

fn check_pixel_len(width: u32, height: u32, len: usize) -> RhiResult<()> {
    let expected = width as usize * height as usize * 4;
    if len != expected {
        return Err(RhiError::InvalidUsage(format!(
            "Texture {}x{} needs {} bytes of RGBA8 data, got {}",
            width, height, expected, len
        )));
    }
    Ok(())
}
