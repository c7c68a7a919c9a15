//! Immediate context for recording one frame.
//!
//! A [`DeviceContext`] is handed out by
//! [`RenderSystem::begin_frame`](crate::RenderSystem::begin_frame) with
//! rendering already begun and the target cleared, and is consumed again by
//! [`RenderSystem::present`](crate::RenderSystem::present).

use std::sync::Arc;

use ash::vk;

use meshview_rhi::command::CommandBuffer;
use meshview_rhi::device::Device;

use crate::material::Material;
use crate::mesh::{IndexBuffer, VertexBuffer};
use crate::resource_binding::ResourceBinding;

pub struct DeviceContext {
    cmd: CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
    frame_index: usize,
    image_index: u32,
    semaphore_index: usize,
}

impl DeviceContext {
    pub(crate) fn new(
        device: Arc<Device>,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
        frame_index: usize,
        image_index: u32,
        semaphore_index: usize,
    ) -> Self {
        Self {
            cmd: CommandBuffer::from_handle(device, command_buffer),
            pipeline_layout,
            frame_index,
            image_index,
            semaphore_index,
        }
    }

    /// Frame slot being recorded.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub(crate) fn image_index(&self) -> u32 {
        self.image_index
    }

    pub(crate) fn semaphore_index(&self) -> usize {
        self.semaphore_index
    }

    pub(crate) fn command_buffer(&self) -> &CommandBuffer {
        &self.cmd
    }

    /// Set viewport and scissor to cover `width` x `height` from the origin.
    pub fn set_viewport_size(&self, width: u32, height: u32) {
        let (viewport, scissor) = full_viewport(width, height);
        self.cmd.set_viewport(viewport, scissor);
    }

    pub fn set_material(&self, material: &Material) {
        self.cmd.bind_graphics_pipeline(material.pipeline().handle());
    }

    pub fn set_resource_binding(&self, binding: &ResourceBinding) {
        self.cmd
            .bind_descriptor_set(self.pipeline_layout, binding.set(self.frame_index));
    }

    pub fn set_vertex_buffer(&self, vertex_buffer: &VertexBuffer) {
        self.cmd.bind_vertex_buffer(vertex_buffer.buffer().handle());
    }

    pub fn set_index_buffer(&self, index_buffer: &IndexBuffer) {
        self.cmd.bind_index_buffer(index_buffer.buffer().handle());
    }

    /// Draw `index_count` indices starting at `start_index`, with
    /// `start_vertex` added to every index.
    pub fn draw_indexed_triangle_list(&self, index_count: u32, start_index: u32, start_vertex: i32) {
        self.cmd.draw_indexed(index_count, start_index, start_vertex);
    }
}

fn full_viewport(width: u32, height: u32) -> (vk::Viewport, vk::Rect2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: vk::Extent2D { width, height },
    };
    (viewport, scissor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_viewport() {
        let (viewport, scissor) = full_viewport(1024, 768);
        assert_eq!(viewport.width, 1024.0);
        assert_eq!(viewport.height, 768.0);
        assert_eq!(viewport.min_depth, 0.0);
        assert_eq!(viewport.max_depth, 1.0);
        assert_eq!(scissor.extent.width, 1024);
        assert_eq!(scissor.offset.x, 0);
    }
}
