//! Command pools and command buffer recording.
//!
//! Recording methods are thin wrappers over the `cmd_*` entry points. Only the
//! graphics bind point and 32-bit indices are used.
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::command::{CommandPool, CommandBuffer};
//!
//! # fn example(device: Arc<Device>, family: u32) -> Result<(), meshview_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), family)?;
//! let cmd = CommandBuffer::allocate(device, &pool)?;
//! cmd.begin()?;
//! cmd.end()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{subresource_range, transition_masks};

pub struct CommandPool {
    device: Arc<Device>,
    raw: vk::CommandPool,
}

impl CommandPool {
    /// Pool for long-lived buffers that are reset and re-recorded every frame.
    ///
    /// # Errors
    ///
    /// Returns a Vulkan error if creation fails.
    pub fn new(device: Arc<Device>, queue_family: u32) -> RhiResult<Self> {
        Self::create(device, queue_family, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
    }

    /// Pool for one-shot uploads.
    ///
    /// # Errors
    ///
    /// Returns a Vulkan error if creation fails.
    pub fn transient(device: Arc<Device>, queue_family: u32) -> RhiResult<Self> {
        Self::create(device, queue_family, vk::CommandPoolCreateFlags::TRANSIENT)
    }

    fn create(
        device: Arc<Device>,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(flags);

        // SAFETY: `queue_family` is one of the device's queue families.
        let raw = unsafe { device.handle().create_command_pool(&create_info, None)? };
        debug!("Command pool on family {} ({:?})", queue_family, flags);
        Ok(Self { device, raw })
    }

    fn allocate_primary(&self) -> RhiResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.raw)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        // SAFETY: The pool is only used from the thread that owns it.
        let buffers = unsafe { self.device.handle().allocate_command_buffers(&info)? };
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::InvalidUsage("driver allocated no command buffer".to_string()))
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // SAFETY: Destroying the pool frees its buffers; none are pending.
        unsafe { self.device.handle().destroy_command_pool(self.raw, None) };
    }
}

/// A primary command buffer. Freed with its [`CommandPool`].
pub struct CommandBuffer {
    device: Arc<Device>,
    raw: vk::CommandBuffer,
}

impl CommandBuffer {
    /// # Errors
    ///
    /// Returns a Vulkan error if allocation fails.
    pub fn allocate(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let raw = pool.allocate_primary()?;
        Ok(Self { device, raw })
    }

    /// Wraps a buffer allocated elsewhere; the caller keeps its pool alive.
    #[inline]
    pub fn from_handle(device: Arc<Device>, raw: vk::CommandBuffer) -> Self {
        Self { device, raw }
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.raw
    }

    #[inline]
    fn vk(&self) -> &ash::Device {
        self.device.handle()
    }

    /// Starts a one-time-submit recording.
    ///
    /// # Errors
    ///
    /// Returns a Vulkan error if the buffer cannot begin recording.
    pub fn begin(&self) -> RhiResult<()> {
        let info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: The buffer is in the initial state.
        unsafe { self.vk().begin_command_buffer(self.raw, &info)? };
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a Vulkan error if recording was invalid.
    pub fn end(&self) -> RhiResult<()> {
        // SAFETY: The buffer is recording.
        unsafe { self.vk().end_command_buffer(self.raw)? };
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a Vulkan error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: The fence guarding the last submission of this buffer has signalled.
        unsafe {
            self.vk()
                .reset_command_buffer(self.raw, vk::CommandBufferResetFlags::empty())?
        };
        Ok(())
    }

    pub fn begin_rendering(&self, info: &vk::RenderingInfo) {
        // SAFETY: The attachments are in attachment-optimal layouts.
        unsafe { self.vk().cmd_begin_rendering(self.raw, info) };
    }

    pub fn end_rendering(&self) {
        // SAFETY: Follows a `begin_rendering` in the same recording.
        unsafe { self.vk().cmd_end_rendering(self.raw) };
    }

    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        // SAFETY: The pipeline outlives the submission.
        unsafe {
            self.vk()
                .cmd_bind_pipeline(self.raw, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
    }

    /// Binds descriptor set 0 for the graphics bind point.
    pub fn bind_descriptor_set(&self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        // SAFETY: `set` was allocated with a layout compatible with `layout`.
        unsafe {
            self.vk().cmd_bind_descriptor_sets(
                self.raw,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            )
        };
    }

    /// Binds `buffer` at vertex binding 0, offset 0.
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        // SAFETY: `buffer` has VERTEX_BUFFER usage.
        unsafe { self.vk().cmd_bind_vertex_buffers(self.raw, 0, &[buffer], &[0]) };
    }

    /// Binds `buffer` as a `u32` index buffer at offset 0.
    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        // SAFETY: `buffer` has INDEX_BUFFER usage.
        unsafe {
            self.vk()
                .cmd_bind_index_buffer(self.raw, buffer, 0, vk::IndexType::UINT32)
        };
    }

    pub fn set_viewport(&self, viewport: vk::Viewport, scissor: vk::Rect2D) {
        // SAFETY: Bound pipelines declare viewport and scissor as dynamic state.
        unsafe {
            self.vk().cmd_set_viewport(self.raw, 0, &[viewport]);
            self.vk().cmd_set_scissor(self.raw, 0, &[scissor]);
        }
    }

    /// Draws one instance of `index_count` indices.
    pub fn draw_indexed(&self, index_count: u32, first_index: u32, vertex_offset: i32) {
        // SAFETY: A pipeline, vertex buffer and index buffer are bound.
        unsafe {
            self.vk()
                .cmd_draw_indexed(self.raw, index_count, 1, first_index, vertex_offset, 0)
        };
    }

    /// Copies tightly packed texels from `src` into mip 0 of the color image `dst`.
    pub fn copy_buffer_to_image(&self, src: vk::Buffer, dst: vk::Image, extent: vk::Extent2D) {
        let region = vk::BufferImageCopy::default()
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });

        // SAFETY: `dst` is in TRANSFER_DST_OPTIMAL and `src` covers the region.
        unsafe {
            self.vk().cmd_copy_buffer_to_image(
                self.raw,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        };
    }

    /// Moves `image` from `old` to `new` layout with the masks from
    /// [`transition_masks`].
    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
        aspect: vk::ImageAspectFlags,
    ) {
        let masks = transition_masks(old, new);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .image(image)
            .subresource_range(subresource_range(aspect));

        // SAFETY: `image` is currently in layout `old`.
        unsafe {
            self.vk().cmd_pipeline_barrier(
                self.raw,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            )
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_types_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandBuffer>();
        assert_send::<CommandPool>();
    }
}
