//! The logical device.
//!
//! [`Device`] is shared as `Arc<Device>` by every object created from it, so it
//! is destroyed only after the last buffer, image or pipeline. It keeps the
//! [`Instance`] alive in turn, and owns the gpu-allocator [`Allocator`] those
//! objects take memory from.

use std::ffi::{CStr, c_char};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::AllocationSizes;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Extensions a physical device must offer to be selected.
pub(crate) const DEVICE_EXTENSIONS: [&CStr; 2] =
    [ash::khr::swapchain::NAME, ash::khr::dynamic_rendering::NAME];

pub struct Device {
    raw: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    max_sampler_anisotropy: f32,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    // Dropped after `Drop::drop` has destroyed the device.
    instance: Arc<Instance>,
}

impl Device {
    /// Creates the device with one queue per distinct family and enables
    /// dynamic rendering and sampler anisotropy.
    ///
    /// # Errors
    ///
    /// [`RhiError::NoSuitableGpu`] if `info` lacks a graphics or present family,
    /// otherwise a Vulkan or allocator error.
    pub fn new(instance: &Arc<Instance>, info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let families = info.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (families.graphics_family, families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };

        let priority = [1.0f32];
        let queue_infos: Vec<_> = families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priority)
            })
            .collect();

        let extensions: Vec<*const c_char> = DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        let mut vulkan_13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features)
            .push_next(&mut vulkan_13);

        // SAFETY: `info.device` was enumerated from this instance and every
        // pointer in `create_info` outlives the call.
        let raw = unsafe { instance.handle().create_device(info.device, &create_info, None)? };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: raw.clone(),
            physical_device: info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: AllocationSizes::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                // SAFETY: Nothing has been created from the device yet.
                unsafe { raw.destroy_device(None) };
                return Err(e.into());
            }
        };

        // SAFETY: Queue 0 of each family was requested above.
        let (graphics_queue, present_queue) = unsafe {
            (
                raw.get_device_queue(graphics_family, 0),
                raw.get_device_queue(present_family, 0),
            )
        };

        info!(
            "Logical device on '{}' (graphics family {}, present family {})",
            info.device_name(),
            graphics_family,
            present_family
        );

        Ok(Arc::new(Self {
            raw,
            physical_device: info.device,
            queue_families: families,
            graphics_queue,
            present_queue,
            max_sampler_anisotropy: info.max_sampler_anisotropy(),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            instance: Arc::clone(instance),
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.raw
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.max_sampler_anisotropy
    }

    /// # Errors
    ///
    /// [`RhiError::AllocatorPoisoned`] if another thread panicked mid-allocation.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator.lock().map_err(|_| RhiError::AllocatorPoisoned)
    }

    /// # Errors
    ///
    /// Returns a Vulkan error if the device is lost.
    pub fn wait_idle(&self) -> RhiResult<()> {
        // SAFETY: Host access to the queues is not shared with another thread.
        unsafe { self.raw.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue, signalling `fence` on completion.
    ///
    /// # Safety
    ///
    /// The command buffers must be fully recorded, the semaphores in
    /// `submits` must be in the states the submission expects, and `fence`
    /// must be unsignaled and not tied to another pending submission.
    pub unsafe fn submit_graphics(&self, submits: &[vk::SubmitInfo], fence: vk::Fence) -> RhiResult<()> {
        // SAFETY: Upheld by the caller.
        unsafe { self.raw.queue_submit(self.graphics_queue, submits, fence)? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // SAFETY: Every child object holds an `Arc<Device>`, so none are left.
        // The allocator frees its memory blocks before the device goes away.
        unsafe {
            if let Err(e) = self.raw.device_wait_idle() {
                error!("device_wait_idle failed during teardown: {e}");
            }
            ManuallyDrop::drop(&mut self.allocator);
            self.raw.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: The queues and physical device are plain handles and the allocator's
// mapped pointers are only reached through the `Mutex`.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical_device::supports_device_extensions;

    #[test]
    fn test_required_extensions() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::dynamic_rendering::NAME));
    }

    /// First device with the required extensions and a graphics queue,
    /// using that queue family for presentation too.
    fn headless_device_info(instance: &Instance) -> Option<PhysicalDeviceInfo> {
        let vk_instance = instance.handle();
        // SAFETY: The instance is live for the whole test.
        let devices = unsafe { vk_instance.enumerate_physical_devices().ok()? };
        devices.into_iter().find_map(|device| {
            if !supports_device_extensions(vk_instance, device) {
                return None;
            }
            // SAFETY: `device` was enumerated from this instance.
            let (properties, features, memory_properties, families) = unsafe {
                (
                    vk_instance.get_physical_device_properties(device),
                    vk_instance.get_physical_device_features(device),
                    vk_instance.get_physical_device_memory_properties(device),
                    vk_instance.get_physical_device_queue_family_properties(device),
                )
            };
            if features.sampler_anisotropy == vk::FALSE {
                return None;
            }
            let graphics = families
                .iter()
                .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))?
                as u32;
            Some(PhysicalDeviceInfo {
                device,
                properties,
                features,
                memory_properties,
                queue_families: QueueFamilyIndices {
                    graphics_family: Some(graphics),
                    present_family: Some(graphics),
                },
            })
        })
    }

    #[test]
    fn test_device_keeps_instance_alive() {
        // Needs a Vulkan 1.3 driver; skipped otherwise.
        let instance = match Instance::new(&[], false) {
            Ok(instance) => Arc::new(instance),
            Err(e) => {
                eprintln!("Skipping test: Vulkan not available ({e})");
                return;
            }
        };
        let Some(info) = headless_device_info(&instance) else {
            eprintln!("Skipping test: no device with dynamic rendering");
            return;
        };
        let device = match Device::new(&instance, &info) {
            Ok(device) => device,
            Err(e) => {
                eprintln!("Skipping test: device creation failed ({e})");
                return;
            }
        };

        assert_eq!(Arc::strong_count(&instance), 2);
        assert!(std::ptr::eq(device.instance(), &*instance));
        drop(device);
        assert_eq!(Arc::strong_count(&instance), 1);
    }

    #[test]
    fn test_device_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
