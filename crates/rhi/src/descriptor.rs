//! Descriptor set layouts, pools and writes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::descriptor::{DescriptorKind, DescriptorPool, DescriptorSetLayout, layout_binding};
//!
//! # fn example(device: Arc<Device>) -> Result<(), meshview_rhi::RhiError> {
//! let bindings = [
//!     layout_binding(0, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::ALL_GRAPHICS),
//!     layout_binding(1, DescriptorKind::CombinedImageSampler, vk::ShaderStageFlags::FRAGMENT),
//! ];
//! let layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
//! let pool = DescriptorPool::for_bindings(device, &bindings, 2)?;
//! let _sets = pool.allocate(&[layout.handle(); 2])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorKind {
    UniformBuffer,
    CombinedImageSampler,
}

impl DescriptorKind {
    pub fn vk_type(self) -> vk::DescriptorType {
        match self {
            DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// A single-descriptor binding visible to `stages`.
pub fn layout_binding(
    binding: u32,
    kind: DescriptorKind,
    stages: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(kind.vk_type())
        .descriptor_count(1)
        .stage_flags(stages)
}

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    raw: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// # Errors
    ///
    /// Returns a Vulkan error if creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<Self> {
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        // SAFETY: `bindings` outlives the call.
        let raw = unsafe { device.handle().create_descriptor_set_layout(&info, None)? };
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.raw
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        // SAFETY: Nothing created from the layout is still in use.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.raw, None)
        };
    }
}

/// Fixed-capacity pool. Sets are never freed individually.
pub struct DescriptorPool {
    device: Arc<Device>,
    raw: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Creates a pool that holds `max_sets` sets shaped like `bindings`.
    ///
    /// # Errors
    ///
    /// Returns a Vulkan error if creation fails.
    pub fn for_bindings(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
        max_sets: u32,
    ) -> RhiResult<Self> {
        let sizes = pool_sizes(bindings, max_sets);
        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&sizes);

        // SAFETY: `sizes` outlives the call.
        let raw = unsafe { device.handle().create_descriptor_pool(&info, None)? };
        debug!("Descriptor pool for {} sets", max_sets);
        Ok(Self { device, raw })
    }

    /// Allocates one set per entry of `layouts`.
    ///
    /// # Errors
    ///
    /// `ERROR_OUT_OF_POOL_MEMORY` once the pool is exhausted.
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Vec<vk::DescriptorSet>> {
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.raw)
            .set_layouts(layouts);
        // SAFETY: The pool is not used from another thread.
        Ok(unsafe { self.device.handle().allocate_descriptor_sets(&info)? })
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        // SAFETY: Destroying the pool frees its sets; no pending command
        // buffer binds them.
        unsafe { self.device.handle().destroy_descriptor_pool(self.raw, None) };
    }
}

/// Descriptor counts per type for `set_count` sets of `bindings`.
fn pool_sizes(
    bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    set_count: u32,
) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        let count = binding.descriptor_count * set_count;
        if let Some(size) = sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
            size.descriptor_count += count;
        } else {
            sizes.push(vk::DescriptorPoolSize {
                ty: binding.descriptor_type,
                descriptor_count: count,
            });
        }
    }
    sizes
}

/// One resource to point a binding at.
#[derive(Clone, Copy, Debug)]
pub enum DescriptorWrite {
    /// The first `range` bytes of `buffer`.
    UniformBuffer {
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    },
    /// An image in SHADER_READ_ONLY_OPTIMAL layout.
    CombinedImageSampler {
        binding: u32,
        sampler: vk::Sampler,
        view: vk::ImageView,
    },
}

/// Applies `writes` to `set` in one `vkUpdateDescriptorSets` call.
///
/// The set must not be bound by a command buffer that is still pending.
pub fn update_set(device: &Device, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
    let buffer_infos: Vec<_> = writes
        .iter()
        .map(|write| match *write {
            DescriptorWrite::UniformBuffer { buffer, range, .. } => vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            },
            DescriptorWrite::CombinedImageSampler { .. } => vk::DescriptorBufferInfo::default(),
        })
        .collect();
    let image_infos: Vec<_> = writes
        .iter()
        .map(|write| match *write {
            DescriptorWrite::CombinedImageSampler { sampler, view, .. } => {
                vk::DescriptorImageInfo {
                    sampler,
                    image_view: view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }
            }
            DescriptorWrite::UniformBuffer { .. } => vk::DescriptorImageInfo::default(),
        })
        .collect();

    let vk_writes: Vec<_> = writes
        .iter()
        .enumerate()
        .map(|(i, write)| {
            let base = vk::WriteDescriptorSet::default().dst_set(set);
            match *write {
                DescriptorWrite::UniformBuffer { binding, .. } => base
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&buffer_infos[i])),
                DescriptorWrite::CombinedImageSampler { binding, .. } => base
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(&image_infos[i])),
            }
        })
        .collect();

    // SAFETY: The info arrays outlive the call and the set is not in use.
    unsafe { device.handle().update_descriptor_sets(&vk_writes, &[]) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_binding() {
        let binding = layout_binding(
            1,
            DescriptorKind::CombinedImageSampler,
            vk::ShaderStageFlags::FRAGMENT,
        );
        assert_eq!(binding.binding, 1);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sizes_per_type() {
        let bindings = [
            layout_binding(0, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::ALL_GRAPHICS),
            layout_binding(1, DescriptorKind::CombinedImageSampler, vk::ShaderStageFlags::FRAGMENT),
        ];
        let sizes = pool_sizes(&bindings, 32);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 32);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 32);
    }

    #[test]
    fn test_pool_sizes_merge_repeated_type() {
        let bindings = [
            layout_binding(0, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::VERTEX),
            layout_binding(1, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::FRAGMENT),
        ];
        let sizes = pool_sizes(&bindings, 2);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].descriptor_count, 4);
    }
}
