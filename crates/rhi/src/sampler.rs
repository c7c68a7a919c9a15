//! Texture samplers.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Upper bound on requested anisotropy; the device limit may lower it further.
pub const MAX_ANISOTROPY: f32 = 16.0;

/// Linear-filtering, repeat-addressing sampler with anisotropic filtering.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates a sampler clamped to the device's anisotropy limit.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new_linear_repeat(device: Arc<Device>) -> RhiResult<Self> {
        let anisotropy = clamp_anisotropy(device.max_sampler_anisotropy());

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy > 1.0)
            .max_anisotropy(anisotropy)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        // SAFETY: Anisotropy is within the device limit and the feature is enabled.
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };

        debug!("Created sampler (anisotropy {})", anisotropy);

        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        // SAFETY: Descriptor sets referencing the sampler are no longer in flight.
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

fn clamp_anisotropy(device_limit: f32) -> f32 {
    device_limit.clamp(1.0, MAX_ANISOTROPY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anisotropy_clamped_to_device_limit() {
        assert_eq!(clamp_anisotropy(4.0), 4.0);
        assert_eq!(clamp_anisotropy(64.0), MAX_ANISOTROPY);
        assert_eq!(clamp_anisotropy(0.0), 1.0);
    }
}
