//! Per-frame and per-image synchronization state.
//!
//! Each frame slot owns a command buffer and an in-flight fence. Semaphores are
//! kept per swapchain image: acquire semaphores are taken round-robin and the
//! render-finished semaphore is picked by the acquired image index, so a
//! semaphore still waited on by presentation is never reused early.

use std::sync::Arc;

use tracing::debug;

use meshview_rhi::RhiResult;
use meshview_rhi::command::{CommandBuffer, CommandPool};
use meshview_rhi::device::Device;
use meshview_rhi::sync::{Fence, MAX_FRAMES_IN_FLIGHT, Semaphore};

/// Resources of one frame slot.
pub(crate) struct FrameData {
    pub command_buffer: CommandBuffer,
    pub in_flight_fence: Fence,
}

impl FrameData {
    pub fn new(device: Arc<Device>, command_pool: &CommandPool) -> RhiResult<Self> {
        Ok(Self {
            command_buffer: CommandBuffer::allocate(device.clone(), command_pool)?,
            // Signaled so the first wait doesn't block forever
            in_flight_fence: Fence::new(device, true)?,
        })
    }
}

/// Semaphores used with one swapchain image.
pub(crate) struct ImageSync {
    pub image_available: Semaphore,
    pub render_finished: Semaphore,
}

impl ImageSync {
    pub fn create_all(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Self>> {
        let sync = (0..count)
            .map(|_| -> RhiResult<Self> {
                Ok(Self {
                    image_available: Semaphore::new(device.clone())?,
                    render_finished: Semaphore::new(device.clone())?,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;
        debug!("Created semaphores for {} swapchain image(s)", count);
        Ok(sync)
    }
}

/// Frame slot and acquire-semaphore cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameManager {
    current_frame: usize,
    current_semaphore: usize,
    semaphore_count: usize,
}

impl FrameManager {
    pub fn new(semaphore_count: usize) -> Self {
        Self {
            current_frame: 0,
            current_semaphore: 0,
            semaphore_count: semaphore_count.max(1),
        }
    }

    /// Frame slot index (0 to MAX_FRAMES_IN_FLIGHT - 1).
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Index of the acquire semaphore to use next.
    pub fn current_semaphore(&self) -> usize {
        self.current_semaphore
    }

    /// Advance both cursors after a frame was submitted.
    pub fn next_frame(&mut self) {
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        self.current_semaphore = (self.current_semaphore + 1) % self.semaphore_count;
    }

    /// Restart the semaphore cursor after the swapchain changed image count.
    pub fn reset_semaphores(&mut self, semaphore_count: usize) {
        self.semaphore_count = semaphore_count.max(1);
        self.current_semaphore = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_wraps() {
        let mut frames = FrameManager::new(3);
        let seen: Vec<usize> = (0..5)
            .map(|_| {
                let f = frames.current_frame();
                frames.next_frame();
                f
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_semaphore_cursor_cycles_image_count() {
        let mut frames = FrameManager::new(3);
        let seen: Vec<usize> = (0..4)
            .map(|_| {
                let s = frames.current_semaphore();
                frames.next_frame();
                s
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_reset_semaphores() {
        let mut frames = FrameManager::new(3);
        frames.next_frame();
        frames.reset_semaphores(2);
        assert_eq!(frames.current_semaphore(), 0);
        frames.next_frame();
        frames.next_frame();
        assert_eq!(frames.current_semaphore(), 0);
    }

    #[test]
    fn test_zero_semaphores_clamped() {
        let mut frames = FrameManager::new(0);
        frames.next_frame();
        assert_eq!(frames.current_semaphore(), 0);
    }
}
