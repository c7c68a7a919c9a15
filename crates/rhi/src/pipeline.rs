//! Pipeline layouts and graphics pipelines for [`Vertex`] meshes.
//!
//! Every pipeline draws indexed triangle lists into one color and one depth
//! attachment through dynamic rendering, with no blending and a dynamic
//! viewport. [`PipelineDesc`] holds the state that differs per material.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::{Shader, ShaderStage};
use crate::vertex::Vertex;

pub struct PipelineLayout {
    device: Arc<Device>,
    raw: vk::PipelineLayout,
}

impl PipelineLayout {
    /// # Errors
    ///
    /// Returns a Vulkan error if creation fails.
    pub fn new(device: Arc<Device>, set_layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Self> {
        let info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        // SAFETY: The set layouts come from the same device and are live.
        let raw = unsafe { device.handle().create_pipeline_layout(&info, None)? };
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.raw
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        // SAFETY: No pipeline created with this layout is executing.
        unsafe { self.device.handle().destroy_pipeline_layout(self.raw, None) };
    }
}

/// Per-material pipeline state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineDesc {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_compare: vk::CompareOp,
}

pub struct Pipeline {
    device: Arc<Device>,
    raw: vk::Pipeline,
}

impl Pipeline {
    /// Builds a depth-tested, depth-writing pipeline.
    ///
    /// # Errors
    ///
    /// [`RhiError::Pipeline`] if a shader was loaded for the wrong stage,
    /// otherwise a Vulkan error from pipeline creation.
    pub fn graphics(
        device: Arc<Device>,
        layout: &PipelineLayout,
        vertex_shader: &Shader,
        fragment_shader: &Shader,
        desc: &PipelineDesc,
    ) -> RhiResult<Self> {
        expect_stage(vertex_shader, ShaderStage::Vertex)?;
        expect_stage(fragment_shader, ShaderStage::Fragment)?;

        let stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(desc.depth_compare)
            .max_depth_bounds(1.0);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [desc.color_format];
        let mut rendering = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(desc.depth_format);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle())
            .push_next(&mut rendering);

        // SAFETY: Every state struct referenced by `info` lives until the call returns.
        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
                .map_err(|(_, err)| err)?
        };
        let raw = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::Pipeline("driver returned no pipeline".to_string()))?;

        debug!(
            "Graphics pipeline: cull {:?}, depth {:?}",
            desc.cull_mode, desc.depth_compare
        );
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.raw
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // SAFETY: Command buffers that bound the pipeline have completed.
        unsafe { self.device.handle().destroy_pipeline(self.raw, None) };
    }
}

fn expect_stage(shader: &Shader, expected: ShaderStage) -> RhiResult<()> {
    if shader.stage() == expected {
        Ok(())
    } else {
        Err(RhiError::Pipeline(format!(
            "{} shader bound in the {} slot",
            shader.stage(),
            expected
        )))
    }
}
