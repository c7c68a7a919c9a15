//! Vulkan device, swap chain and frame loop.
//!
//! [`RenderSystem`] owns the device and everything tied to the window surface,
//! creates GPU objects for the higher layers, and runs the acquire / record /
//! submit / present cycle.
//!
//! # Resource Destruction Order
//!
//! 1. Wait for all GPU work to complete
//! 2. Per-frame and per-image sync objects, command pool
//! 3. Descriptor pool and layouts
//! 4. Depth buffer, swap chain, surface
//! 5. Device, once the last `Arc<Device>` is gone
//! 6. Instance, which every `Device` keeps alive
//!
//! Objects created here (materials, buffers, textures) hold the device, so
//! they must be dropped before the render system for the device to go with it.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use tracing::{debug, error, info};

use meshview_core::RenderConfig;
use meshview_platform::{Surface, Window};
use meshview_rhi::RhiError;
use meshview_rhi::command::CommandPool;
use meshview_rhi::descriptor::{
    DescriptorKind, DescriptorPool, DescriptorSetLayout, DescriptorWrite, layout_binding, update_set,
};
use meshview_rhi::device::Device;
use meshview_rhi::instance::Instance;
use meshview_rhi::physical_device::select_physical_device;
use meshview_rhi::pipeline::{Pipeline, PipelineDesc, PipelineLayout};
use meshview_rhi::shader::{Shader, ShaderStage};
use meshview_rhi::swapchain::Swapchain;
use meshview_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use meshview_rhi::texture::Texture;
use meshview_rhi::vertex::Vertex;

use crate::constant_buffer::ConstantBuffer;
use crate::depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};
use crate::device_context::DeviceContext;
use crate::error::{RenderError, RenderResult};
use crate::frame::{FrameData, FrameManager, ImageSync};
use crate::material::{Material, RasterizerState};
use crate::mesh::{IndexBuffer, VertexBuffer};
use crate::resource_binding::ResourceBinding;

/// Maximum number of [`ResourceBinding`]s created over the render system's
/// lifetime. Dropping a binding does not return its descriptor sets to the pool.
pub const MAX_RESOURCE_BINDINGS: u32 = 16;

/// Owns the Vulkan device, swapchain and per-frame state.
pub struct RenderSystem {
    instance: Arc<Instance>,
    device: Arc<Device>,
    surface: ManuallyDrop<Surface>,
    swapchain: ManuallyDrop<Swapchain>,
    depth_buffer: ManuallyDrop<DepthBuffer>,

    descriptor_set_layout: ManuallyDrop<DescriptorSetLayout>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    descriptor_pool: ManuallyDrop<DescriptorPool>,
    bindings_allocated: u32,

    command_pool: ManuallyDrop<CommandPool>,
    frames: Vec<FrameData>,
    image_sync: Vec<ImageSync>,
    frame_manager: FrameManager,

    framebuffer_resized: bool,
    width: u32,
    height: u32,
}

impl RenderSystem {
    /// Initializes Vulkan for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object cannot be created, including when
    /// no GPU can present to the window.
    pub fn new(window: &Window, config: &RenderConfig) -> RenderResult<Self> {
        let (width, height) = window.client_size();
        info!("Initializing Vulkan render system ({}x{})", width, height);

        let instance = Arc::new(Instance::new(&window.required_extensions()?, config.validation)?);
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            config.vsync,
        )?;
        let extent = swapchain.extent();
        let depth_buffer = DepthBuffer::new(device.clone(), extent.width, extent.height)?;

        let bindings = [
            layout_binding(0, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::ALL_GRAPHICS),
            layout_binding(1, DescriptorKind::CombinedImageSampler, vk::ShaderStageFlags::FRAGMENT),
        ];
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let pipeline_layout = PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()])?;

        let max_sets = MAX_RESOURCE_BINDINGS * MAX_FRAMES_IN_FLIGHT as u32;
        let descriptor_pool = DescriptorPool::for_bindings(device.clone(), &bindings, max_sets)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameData::new(device.clone(), &command_pool))
            .collect::<Result<Vec<_>, _>>()?;

        let image_count = swapchain.image_count() as usize;
        let image_sync = ImageSync::create_all(&device, image_count)?;

        info!(
            "Render system ready: {:?}, {:?}, {} swapchain image(s)",
            swapchain.format(),
            swapchain.present_mode(),
            image_count
        );

        Ok(Self {
            instance,
            device,
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            descriptor_set_layout: ManuallyDrop::new(descriptor_set_layout),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            bindings_allocated: 0,
            command_pool: ManuallyDrop::new(command_pool),
            frames,
            image_sync,
            frame_manager: FrameManager::new(image_count),
            framebuffer_resized: false,
            width,
            height,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Current swap chain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    // =========================================================================
    // Resource Creation
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if `vertices` is empty or the buffer cannot be created.
    pub fn create_vertex_buffer(&self, vertices: &[Vertex]) -> RenderResult<VertexBuffer> {
        Ok(VertexBuffer::from_vertices(self.device.clone(), vertices)?)
    }

    /// # Errors
    ///
    /// Returns an error if `indices` is empty or the buffer cannot be created.
    pub fn create_index_buffer(&self, indices: &[u32]) -> RenderResult<IndexBuffer> {
        Ok(IndexBuffer::from_indices(self.device.clone(), indices)?)
    }

    /// Creates a per-frame constant buffer initialised to `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer cannot be created.
    pub fn create_constant_buffer<T: Pod>(&self, initial: &T) -> RenderResult<ConstantBuffer<T>> {
        Ok(ConstantBuffer::new(self.device.clone(), initial)?)
    }

    /// Loads a SPIR-V vertex shader.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not valid SPIR-V.
    pub fn create_vertex_shader(&self, path: &Path) -> RenderResult<Shader> {
        Ok(Shader::load(self.device.clone(), path, ShaderStage::Vertex)?)
    }

    /// Loads a SPIR-V pixel (fragment) shader.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not valid SPIR-V.
    pub fn create_pixel_shader(&self, path: &Path) -> RenderResult<Shader> {
        Ok(Shader::load(self.device.clone(), path, ShaderStage::Fragment)?)
    }

    /// Builds a depth-tested pipeline for [`Vertex`] geometry.
    ///
    /// Triangles wind clockwise when front facing.
    ///
    /// # Errors
    ///
    /// Returns an error if the shaders are of the wrong stages or pipeline
    /// creation fails.
    pub fn create_material(
        &self,
        vertex_shader: &Shader,
        pixel_shader: &Shader,
        rasterizer_state: RasterizerState,
    ) -> RenderResult<Material> {
        let desc = PipelineDesc {
            color_format: self.swapchain.format(),
            depth_format: DEFAULT_DEPTH_FORMAT,
            cull_mode: rasterizer_state.cull_mode(),
            front_face: vk::FrontFace::CLOCKWISE,
            depth_compare: rasterizer_state.depth_compare_op(),
        };
        let pipeline = Pipeline::graphics(
            self.device.clone(),
            &self.pipeline_layout,
            vertex_shader,
            pixel_shader,
            &desc,
        )?;

        debug!("Material created ({:?})", rasterizer_state);
        Ok(Material::new(pipeline, rasterizer_state))
    }

    /// Allocates descriptor sets pointing at `constants` and `texture`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::BindingLimit`] once [`MAX_RESOURCE_BINDINGS`]
    /// bindings exist, or any descriptor allocation error.
    pub fn create_resource_binding<T: Pod>(
        &mut self,
        constants: &ConstantBuffer<T>,
        texture: &Texture,
    ) -> RenderResult<ResourceBinding> {
        if self.bindings_allocated >= MAX_RESOURCE_BINDINGS {
            return Err(RenderError::BindingLimit(MAX_RESOURCE_BINDINGS));
        }

        let layouts = [self.descriptor_set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let sets = self.descriptor_pool.allocate(&layouts)?;

        for (frame, &set) in sets.iter().enumerate() {
            let writes = [
                DescriptorWrite::UniformBuffer {
                    binding: 0,
                    buffer: constants.handle(frame),
                    range: ConstantBuffer::<T>::size(),
                },
                DescriptorWrite::CombinedImageSampler {
                    binding: 1,
                    sampler: texture.sampler(),
                    view: texture.view(),
                },
            ];
            update_set(&self.device, set, &writes);
        }

        self.bindings_allocated += 1;
        Ok(ResourceBinding::new(sets))
    }

    // =========================================================================
    // Frame Loop
    // =========================================================================

    /// Records the new client area size. The swap chain is rebuilt before the
    /// next frame; a zero size pauses rendering.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        debug!(
            "Resize: {}x{} -> {}x{}",
            self.width, self.height, width, height
        );
        self.width = width;
        self.height = height;
        if width != 0 && height != 0 {
            self.framebuffer_resized = true;
        }
    }

    /// Starts a frame and clears the color and depth targets.
    ///
    /// Returns `None` when nothing should be drawn this frame: the window is
    /// minimised or the swap chain had to be rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting, acquiring or recording fails.
    pub fn begin_frame(&mut self, clear_color: [f32; 4]) -> RenderResult<Option<DeviceContext>> {
        if self.width == 0 || self.height == 0 {
            return Ok(None);
        }

        if self.framebuffer_resized {
            debug!("Resize requested, recreating swapchain before acquire");
            self.recreate_swapchain()?;
        }

        let frame_index = self.frame_manager.current_frame();
        let semaphore_index = self.frame_manager.current_semaphore();
        self.frames[frame_index].in_flight_fence.wait(u64::MAX)?;

        let acquire_semaphore = self.image_sync[semaphore_index].image_available.handle();
        let image_index = match self.swapchain.acquire_next_image(acquire_semaphore) {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date, recreating");
                self.recreate_swapchain()?;
                return Ok(None);
            }
            Err(e) => return Err(RhiError::Vulkan(e).into()),
        };

        // The fence stays signalled until `present` submits, so a frame that
        // is never presented cannot stall the next wait on this slot.
        let frame = &self.frames[frame_index];
        let cmd = &frame.command_buffer;
        cmd.reset()?;
        cmd.begin()?;

        let color_image = self.swapchain.image(image_index as usize);
        cmd.transition_image_layout(
            color_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        cmd.transition_image_layout(
            self.depth_buffer.image(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::DEPTH,
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index as usize))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            });

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_buffer.image_view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);

        Ok(Some(DeviceContext::new(
            self.device.clone(),
            cmd.handle(),
            self.pipeline_layout.handle(),
            frame_index,
            image_index,
            semaphore_index,
        )))
    }

    /// Finishes recording, submits and presents the frame started by
    /// [`begin_frame`](Self::begin_frame).
    ///
    /// # Errors
    ///
    /// Returns an error if recording, submission or presentation fails for a
    /// reason other than an out-of-date swap chain.
    pub fn present(&mut self, ctx: DeviceContext) -> RenderResult<()> {
        let cmd = ctx.command_buffer();
        let image_index = ctx.image_index();

        cmd.end_rendering();
        cmd.transition_image_layout(
            self.swapchain.image(image_index as usize),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        );
        cmd.end()?;

        let frame = &self.frames[ctx.frame_index()];
        let wait_semaphores = [self.image_sync[ctx.semaphore_index()]
            .image_available
            .handle()];
        let render_finished = self.image_sync[image_index as usize]
            .render_finished
            .handle();
        let signal_semaphores = [render_finished];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        frame.in_flight_fence.reset()?;
        // SAFETY: The command buffer is recorded, and the fence was just reset
        // and is not used by another submission.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.in_flight_fence.handle())?;
        }

        let present_result =
            self.swapchain
                .present(self.device.present_queue(), image_index, render_finished);

        self.frame_manager.next_frame();

        let should_recreate = match present_result {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => true,
            Err(e) => return Err(RhiError::Vulkan(e).into()),
        };

        if should_recreate {
            debug!("Swapchain needs recreation after present");
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Blocks until the GPU is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is lost.
    pub fn wait_idle(&self) -> RenderResult<()> {
        Ok(self.device.wait_idle()?)
    }

    fn recreate_swapchain(&mut self) -> RenderResult<()> {
        self.device.wait_idle()?;

        self.swapchain
            .recreate(&self.instance, self.surface.handle(), self.width, self.height)?;

        let extent = self.swapchain.extent();
        let depth_buffer = DepthBuffer::new(self.device.clone(), extent.width, extent.height)?;
        // SAFETY: The device is idle and the old depth buffer is replaced right away.
        unsafe {
            ManuallyDrop::drop(&mut self.depth_buffer);
        }
        self.depth_buffer = ManuallyDrop::new(depth_buffer);

        let image_count = self.swapchain.image_count() as usize;
        self.image_sync = ImageSync::create_all(&self.device, image_count)?;
        self.frame_manager.reset_semaphores(image_count);

        self.framebuffer_resized = false;
        info!("Swapchain recreated: {}x{}", extent.width, extent.height);
        Ok(())
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!(
                "Failed to wait for device idle during render system drop: {:?}",
                e
            );
        }

        self.image_sync.clear();
        self.frames.clear();

        // SAFETY: The device is idle and each field is dropped exactly once,
        // dependents before what they were created from.
        unsafe {
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.descriptor_set_layout);
            ManuallyDrop::drop(&mut self.depth_buffer);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
        }

        info!("Render system destroyed");
    }
}
