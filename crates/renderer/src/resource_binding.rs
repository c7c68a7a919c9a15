//! Descriptor sets tying a constant buffer and a texture to the shaders.

use ash::vk;

/// One descriptor set per frame in flight: binding 0 is the frame's constant
/// buffer, binding 1 the texture.
///
/// Sets are owned by the render system's descriptor pool and released with it.
pub struct ResourceBinding {
    sets: Vec<vk::DescriptorSet>,
}

impl ResourceBinding {
    pub(crate) fn new(sets: Vec<vk::DescriptorSet>) -> Self {
        Self { sets }
    }

    pub(crate) fn set(&self, frame: usize) -> vk::DescriptorSet {
        self.sets[frame]
    }
}
