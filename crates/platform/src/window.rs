//! The winit-backed window host and the Vulkan surface made from it.

use std::ffi::{CStr, c_char};

use ash::vk;
use raw_window_handle::{DisplayHandle, HasDisplayHandle, HasWindowHandle, WindowHandle};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Fullscreen, WindowAttributes};

use meshview_core::{Error, Result};

/// A `vk::SurfaceKHR` together with the loader that destroys it.
///
/// Dropped before the instance it was created from.
pub struct Surface {
    raw: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.raw
    }

    /// Capability, format and present mode queries go through this loader.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: `raw` came from `loader`'s instance and no swapchain uses it anymore.
        unsafe { self.loader.destroy_surface(self.raw, None) };
        tracing::debug!("Surface destroyed");
    }
}

/// The application window.
///
/// `size` is the client area in physical pixels, updated from resize events
/// so it matches what the swapchain is built for.
pub struct Window {
    raw: winit::window::Window,
    size: PhysicalSize<u32>,
}

impl Window {
    /// Opens a resizable window with a `width` x `height` client area.
    ///
    /// # Errors
    ///
    /// [`Error::Window`] if the platform refuses to create it.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);
        let raw = event_loop
            .create_window(attributes)
            .map_err(|e| Error::Window(e.to_string()))?;

        let size = raw.inner_size();
        if size != PhysicalSize::new(width, height) {
            tracing::warn!(
                "Asked for a {}x{} window, got {}x{}",
                width,
                height,
                size.width,
                size.height
            );
        }
        tracing::info!("Window '{}' opened at {}x{}", title, size.width, size.height);

        Ok(Self { raw, size })
    }

    #[inline]
    pub fn client_size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    /// Records a new client size. Call from `WindowEvent::Resized`.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = PhysicalSize::new(width, height);
        tracing::debug!("Window client area now {}x{}", width, height);
    }

    /// Width over height, or 1.0 while the window is minimized.
    pub fn aspect_ratio(&self) -> f32 {
        aspect_ratio(self.size)
    }

    /// Resolution of the monitor the window is currently on.
    pub fn screen_size(&self) -> Option<(u32, u32)> {
        let monitor = self.raw.current_monitor()?;
        let PhysicalSize { width, height } = monitor.size();
        Some((width, height))
    }

    #[inline]
    pub fn request_redraw(&self) {
        self.raw.request_redraw();
    }

    #[inline]
    pub fn show_cursor(&self, visible: bool) {
        self.raw.set_cursor_visible(visible);
    }

    /// Warps the cursor to `(x, y)` in client coordinates.
    ///
    /// # Errors
    ///
    /// [`Error::Window`] on platforms that cannot move the cursor.
    pub fn set_cursor_position(&self, x: f32, y: f32) -> Result<()> {
        let position = PhysicalPosition::new(f64::from(x), f64::from(y));
        self.raw
            .set_cursor_position(position)
            .map_err(|e| Error::Window(format!("cannot move cursor: {e}")))
    }

    /// Borderless fullscreen on the current monitor when `enabled`, windowed otherwise.
    pub fn set_fullscreen(&self, enabled: bool) {
        if enabled == self.is_fullscreen() {
            return;
        }
        self.raw.set_fullscreen(enabled.then_some(Fullscreen::Borderless(None)));
        tracing::info!("Fullscreen {}", if enabled { "on" } else { "off" });
    }

    #[inline]
    pub fn is_fullscreen(&self) -> bool {
        self.raw.fullscreen().is_some()
    }

    /// Instance extensions a surface for this window needs.
    ///
    /// # Errors
    ///
    /// [`Error::Surface`] if the display server has no Vulkan surface support.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let names = ash_window::enumerate_required_extensions(self.display()?.as_raw())
            .map_err(|e| Error::Surface(format!("no surface extensions for this display: {e}")))?;

        for &name in names {
            // SAFETY: ash-window hands out pointers to static NUL-terminated strings.
            let name = unsafe { CStr::from_ptr(name) };
            tracing::debug!("Surface extension {:?}", name);
        }
        Ok(names.to_vec())
    }

    /// Creates the Vulkan surface. `instance` must have the extensions from
    /// [`required_extensions`](Self::required_extensions) enabled.
    ///
    /// # Errors
    ///
    /// [`Error::Window`] if the window handles are unavailable, otherwise
    /// [`Error::Surface`].
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display = self.display()?;
        let window = self.window()?;

        // SAFETY: Both handles belong to `self.raw`, which outlives the
        // surface, and `Surface::drop` destroys it.
        let raw = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
        }
        .map_err(|e| Error::Surface(e.to_string()))?;

        tracing::info!("Surface created");
        Ok(Surface {
            raw,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }

    fn display(&self) -> Result<DisplayHandle<'_>> {
        self.raw
            .display_handle()
            .map_err(|e| Error::Window(format!("display handle unavailable: {e}")))
    }

    fn window(&self) -> Result<WindowHandle<'_>> {
        self.raw
            .window_handle()
            .map_err(|e| Error::Window(format!("window handle unavailable: {e}")))
    }
}

fn aspect_ratio(size: PhysicalSize<u32>) -> f32 {
    if size.width == 0 || size.height == 0 {
        1.0
    } else {
        size.width as f32 / size.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(PhysicalSize::new(1280, 720)), 1280.0 / 720.0);
        assert_eq!(aspect_ratio(PhysicalSize::new(512, 512)), 1.0);
    }

    #[test]
    fn test_aspect_ratio_of_minimized_window() {
        assert_eq!(aspect_ratio(PhysicalSize::new(0, 0)), 1.0);
        assert_eq!(aspect_ratio(PhysicalSize::new(800, 0)), 1.0);
    }
}
