//! Swapchain management.
//!
//! [`Swapchain`] owns the `VkSwapchainKHR` and one view per image. Format,
//! present mode, extent and image count are picked by [`SwapchainSettings`]
//! from what the surface reports; [`Swapchain::recreate`] builds a replacement
//! from the retiring swapchain when the window changes size.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use meshview_rhi::{instance::Instance, device::Device, swapchain::Swapchain, vk};
//! # fn example(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR,
//! #            image_available: vk::Semaphore, render_finished: vk::Semaphore)
//! #            -> Result<(), Box<dyn std::error::Error>> {
//! let swapchain = Swapchain::new(instance, device.clone(), surface, 1024, 768, true)?;
//!
//! let (image_index, _suboptimal) = swapchain.acquire_next_image(image_available)?;
//! // ... render to swapchain.image_view(image_index as usize) ...
//! let needs_resize = swapchain.present(device.present_queue(), image_index, render_finished)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::create_image_view;
use crate::instance::Instance;

/// Surface format used when the surface offers it.
const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Parameters a swapchain is created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainSettings {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SwapchainSettings {
    /// Pick settings for a `width` x `height` window.
    ///
    /// - Format: B8G8R8A8_SRGB / SRGB_NONLINEAR, else the first one offered.
    /// - Present mode: FIFO with `vsync`; otherwise MAILBOX, then IMMEDIATE, then FIFO.
    /// - Extent: the surface's current extent, or the window size clamped to its limits.
    /// - Image count: one above the minimum, capped by the maximum when there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface offers no formats.
    pub fn choose(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        (width, height): (u32, u32),
        vsync: bool,
    ) -> RhiResult<Self> {
        let surface_format = if formats.contains(&PREFERRED_FORMAT) {
            PREFERRED_FORMAT
        } else {
            let first = *formats.first().ok_or_else(|| {
                RhiError::Swapchain("Surface reports no formats".to_string())
            })?;
            warn!(
                "B8G8R8A8_SRGB unavailable, using {:?} / {:?}",
                first.format, first.color_space
            );
            first
        };

        let present_mode = if vsync {
            vk::PresentModeKHR::FIFO
        } else {
            [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
                .into_iter()
                .find(|mode| present_modes.contains(mode))
                .unwrap_or(vk::PresentModeKHR::FIFO)
        };

        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
            vk::Extent2D {
                width: width.clamp(min.width, max.width),
                height: height.clamp(min.height, max.height),
            }
        };

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        Ok(Self {
            surface_format,
            present_mode,
            extent,
            image_count,
        })
    }
}

/// Vulkan swapchain wrapper.
///
/// Images belong to the swapchain; the views are created and destroyed here.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    settings: SwapchainSettings,
    vsync: bool,
}

impl Swapchain {
    /// # Errors
    ///
    /// Returns an error if the surface queries, swapchain creation or image
    /// view creation fail.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> RhiResult<Self> {
        Self::create(
            instance,
            device,
            surface,
            (width, height),
            vsync,
            vk::SwapchainKHR::null(),
        )
    }

    fn create(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        size: (u32, u32),
        vsync: bool,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let physical_device = device.physical_device();

        // SAFETY: The physical device and surface belong to the same live instance.
        let (capabilities, formats, present_modes) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?,
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?,
            )
        };

        let settings =
            SwapchainSettings::choose(&capabilities, &formats, &present_modes, size, vsync)?;

        let families = device.queue_families();
        let (Some(graphics), Some(present)) = (families.graphics_family, families.present_family)
        else {
            return Err(RhiError::Swapchain(
                "Device has no graphics or present queue family".to_string(),
            ));
        };
        let shared_families = [graphics, present];

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(settings.image_count)
            .image_format(settings.surface_format.format)
            .image_color_space(settings.surface_format.color_space)
            .image_extent(settings.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(settings.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        if graphics != present {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&shared_families);
        }

        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        // SAFETY: The surface is live and `old_swapchain` is null or was created
        // for the same surface.
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        // From here on `Drop` cleans up whatever has been created.
        let mut this = Self {
            device,
            loader,
            swapchain,
            images: Vec::new(),
            views: Vec::new(),
            settings,
            vsync,
        };

        // SAFETY: `swapchain` was just created by this loader.
        this.images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        for &image in &this.images {
            let view = create_image_view(
                &this.device,
                image,
                settings.surface_format.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            this.views.push(view);
        }

        info!(
            "Swapchain: {}x{}, {:?}, {:?}, {} images",
            settings.extent.width,
            settings.extent.height,
            settings.surface_format.format,
            settings.present_mode,
            this.images.len()
        );

        Ok(this)
    }

    /// Replace the swapchain with one sized for `width` x `height`.
    ///
    /// Waits for the device to go idle; the old swapchain is retired into the
    /// new one and destroyed afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting or creation fails. The old swapchain is
    /// kept in that case.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<()> {
        self.device.wait_idle()?;
        debug!("Recreating swapchain for {}x{}", width, height);

        let replacement = Self::create(
            instance,
            self.device.clone(),
            surface,
            (width, height),
            self.vsync,
            self.swapchain,
        )?;
        drop(std::mem::replace(self, replacement));
        Ok(())
    }

    /// Acquire the next image, signalling `semaphore` when it is ready.
    ///
    /// Returns `(image_index, suboptimal)`. `ERROR_OUT_OF_DATE_KHR` means the
    /// swapchain must be recreated before rendering.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        // SAFETY: The semaphore is unsignaled and has no pending operations.
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Queue `image_index` for presentation once `wait_semaphore` signals.
    ///
    /// Returns whether the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: `image_index` came from `acquire_next_image` on this swapchain.
        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.settings.surface_format.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.settings.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.settings.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.views[index]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // SAFETY: The owner waits for the device to go idle before dropping or
        // replacing the swapchain, so no view or image is still in use.
        unsafe {
            for &view in &self.views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!("Swapchain destroyed ({} images)", self.images.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn capabilities(current: Option<(u32, u32)>, min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        let (width, height) = current.unwrap_or((u32::MAX, u32::MAX));
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width, height },
            min_image_extent: vk::Extent2D { width: 100, height: 100 },
            max_image_extent: vk::Extent2D { width: 2000, height: 2000 },
            min_image_count: min_images,
            max_image_count: max_images,
            ..Default::default()
        }
    }

    fn choose(
        caps: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        modes: &[vk::PresentModeKHR],
        size: (u32, u32),
        vsync: bool,
    ) -> SwapchainSettings {
        SwapchainSettings::choose(caps, formats, modes, size, vsync).unwrap()
    }

    const ALL_MODES: [vk::PresentModeKHR; 3] = [
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::IMMEDIATE,
        vk::PresentModeKHR::MAILBOX,
    ];

    #[test]
    fn test_prefers_srgb_format() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        let settings = choose(&capabilities(None, 2, 0), &formats, &ALL_MODES, (800, 600), true);
        assert_eq!(settings.surface_format, PREFERRED_FORMAT);
    }

    #[test]
    fn test_falls_back_to_first_format() {
        let formats = [surface_format(vk::Format::R8G8B8A8_UNORM)];
        let settings = choose(&capabilities(None, 2, 0), &formats, &ALL_MODES, (800, 600), true);
        assert_eq!(settings.surface_format.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_no_formats_is_an_error() {
        let result =
            SwapchainSettings::choose(&capabilities(None, 2, 0), &[], &ALL_MODES, (800, 600), true);
        assert!(matches!(result, Err(RhiError::Swapchain(_))));
    }

    #[test]
    fn test_present_mode_follows_vsync() {
        let caps = capabilities(None, 2, 0);
        let formats = [PREFERRED_FORMAT];

        let vsync = choose(&caps, &formats, &ALL_MODES, (800, 600), true);
        assert_eq!(vsync.present_mode, vk::PresentModeKHR::FIFO);

        let no_vsync = choose(&caps, &formats, &ALL_MODES, (800, 600), false);
        assert_eq!(no_vsync.present_mode, vk::PresentModeKHR::MAILBOX);

        let no_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        let immediate = choose(&caps, &formats, &no_mailbox, (800, 600), false);
        assert_eq!(immediate.present_mode, vk::PresentModeKHR::IMMEDIATE);

        let fifo_only = [vk::PresentModeKHR::FIFO];
        let fifo = choose(&caps, &formats, &fifo_only, (800, 600), false);
        assert_eq!(fifo.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_uses_current_when_defined() {
        let caps = capabilities(Some((1920, 1080)), 2, 0);
        let settings = choose(&caps, &[PREFERRED_FORMAT], &ALL_MODES, (800, 600), true);
        assert_eq!(settings.extent, vk::Extent2D { width: 1920, height: 1080 });
    }

    #[test]
    fn test_extent_clamps_window_size() {
        let caps = capabilities(None, 2, 0);
        let formats = [PREFERRED_FORMAT];

        let large = choose(&caps, &formats, &ALL_MODES, (3000, 50), true);
        assert_eq!(large.extent, vk::Extent2D { width: 2000, height: 100 });

        let inside = choose(&caps, &formats, &ALL_MODES, (800, 600), true);
        assert_eq!(inside.extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn test_image_count_one_above_minimum() {
        let formats = [PREFERRED_FORMAT];
        let capped = choose(&capabilities(None, 2, 2), &formats, &ALL_MODES, (800, 600), true);
        assert_eq!(capped.image_count, 2);

        let bounded = choose(&capabilities(None, 2, 8), &formats, &ALL_MODES, (800, 600), true);
        assert_eq!(bounded.image_count, 3);

        let unbounded = choose(&capabilities(None, 3, 0), &formats, &ALL_MODES, (800, 600), true);
        assert_eq!(unbounded.image_count, 4);
    }
}
