//! Uniform buffers written once per frame.

use std::marker::PhantomData;
use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;

use meshview_rhi::RhiResult;
use meshview_rhi::buffer::{Buffer, BufferUsage};
use meshview_rhi::device::Device;
use meshview_rhi::sync::MAX_FRAMES_IN_FLIGHT;

use crate::device_context::DeviceContext;

/// One host-visible uniform buffer per frame in flight, holding a `T`.
///
/// Updating writes only the buffer of the frame being recorded, so data the
/// GPU may still read for the previous frame is left alone.
pub struct ConstantBuffer<T: Pod> {
    buffers: Vec<Buffer>,
    _marker: PhantomData<T>,
}

impl<T: Pod> ConstantBuffer<T> {
    pub(crate) fn new(device: Arc<Device>, initial: &T) -> RhiResult<Self> {
        let buffers = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| {
                Buffer::from_bytes(
                    device.clone(),
                    BufferUsage::Uniform,
                    bytemuck::bytes_of(initial),
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;
        Ok(Self {
            buffers,
            _marker: PhantomData,
        })
    }

    /// Write `data` into this frame's buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer memory cannot be written.
    pub fn update(&self, ctx: &DeviceContext, data: &T) -> RhiResult<()> {
        self.buffers[ctx.frame_index()].write(0, data)
    }

    pub(crate) fn handle(&self, frame: usize) -> vk::Buffer {
        self.buffers[frame].handle()
    }

    pub const fn size() -> vk::DeviceSize {
        std::mem::size_of::<T>() as vk::DeviceSize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Payload {
        values: [f32; 8],
    }

    #[test]
    fn test_size_matches_payload() {
        assert_eq!(ConstantBuffer::<Payload>::size(), 32);
    }
}
