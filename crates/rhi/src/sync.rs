//! Binary semaphores and fences.
//!
//! Semaphores order work between queue operations (acquire, submit, present);
//! fences let the host block until a submission has retired.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

/// Frame slots the host may record while the GPU still works on earlier ones.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

pub struct Semaphore {
    device: Arc<Device>,
    raw: vk::Semaphore,
}

impl Semaphore {
    /// # Errors
    ///
    /// Returns a Vulkan error if creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        // SAFETY: Default create info describes a binary semaphore.
        let raw = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.raw
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: Owners drop semaphores only after the device has gone idle.
        unsafe { self.device.handle().destroy_semaphore(self.raw, None) };
    }
}

pub struct Fence {
    device: Arc<Device>,
    raw: vk::Fence,
}

impl Fence {
    /// Creates a fence; `signaled` makes the first [`Fence::wait`] return at once.
    ///
    /// # Errors
    ///
    /// Returns a Vulkan error if creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let mut flags = vk::FenceCreateFlags::empty();
        if signaled {
            flags |= vk::FenceCreateFlags::SIGNALED;
        }

        // SAFETY: The create info lives for the duration of the call.
        let raw = unsafe {
            device
                .handle()
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?
        };
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.raw
    }

    /// Blocks for at most `timeout_ns`.
    ///
    /// # Errors
    ///
    /// `vk::Result::TIMEOUT` when the deadline passes, or a device error.
    pub fn wait(&self, timeout_ns: u64) -> RhiResult<()> {
        // SAFETY: The fence was created from this device.
        unsafe {
            self.device
                .handle()
                .wait_for_fences(std::slice::from_ref(&self.raw), true, timeout_ns)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a Vulkan error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: Callers reset only after waiting, so no submission still uses it.
        unsafe {
            self.device
                .handle()
                .reset_fences(std::slice::from_ref(&self.raw))?;
        }
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: No pending submission signals the fence at drop time.
        unsafe { self.device.handle().destroy_fence(self.raw, None) };
    }
}
