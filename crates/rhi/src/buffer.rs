//! Host-visible GPU buffers.
//!
//! Meshes here are small and written once, so vertex and index data skip the
//! staging copy: every [`Buffer`] lives in `CpuToGpu` memory from gpu-allocator
//! and is written through its persistent mapping.
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshview_rhi::device::Device;
//! use meshview_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), meshview_rhi::RhiError> {
//! let indices: [u32; 3] = [0, 1, 2];
//! let _ib = Buffer::from_bytes(device, BufferUsage::Index, bytemuck::cast_slice(&indices))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{error, trace};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    /// Source of a buffer-to-image copy.
    Staging,
}

impl BufferUsage {
    pub fn flags(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex buffer",
            BufferUsage::Index => "index buffer",
            BufferUsage::Uniform => "uniform buffer",
            BufferUsage::Staging => "staging buffer",
        }
    }
}

pub struct Buffer {
    device: Arc<Device>,
    raw: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Allocates an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// [`RhiError::InvalidUsage`] for a zero size, otherwise a Vulkan or
    /// allocation error.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidUsage(format!("empty {}", usage.label())));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.flags())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        // SAFETY: The device is live and the create info is complete.
        let raw = unsafe { device.handle().create_buffer(&create_info, None)? };

        // Own the handle before anything else can fail so Drop releases it.
        let mut buffer = Self {
            device,
            raw,
            allocation: None,
            size,
        };

        // SAFETY: `raw` was created from this device.
        let requirements = unsafe { buffer.device.handle().get_buffer_memory_requirements(raw) };
        let allocation = buffer.device.allocator()?.allocate(&AllocationCreateDesc {
            name: usage.label(),
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        // SAFETY: The allocation meets `requirements` and is not bound elsewhere.
        let bound = unsafe {
            buffer
                .device
                .handle()
                .bind_buffer_memory(raw, allocation.memory(), allocation.offset())
        };
        buffer.allocation = Some(allocation);
        bound?;

        trace!("Allocated {} ({} bytes)", usage.label(), size);
        Ok(buffer)
    }

    /// Allocates a buffer exactly as large as `bytes` and fills it.
    ///
    /// # Errors
    ///
    /// See [`Buffer::new`].
    pub fn from_bytes(device: Arc<Device>, usage: BufferUsage, bytes: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, bytes.len() as vk::DeviceSize)?;
        buffer.write_bytes(0, bytes)?;
        Ok(buffer)
    }

    /// Copies `bytes` into the mapping at `offset`.
    ///
    /// # Errors
    ///
    /// [`RhiError::InvalidUsage`] if the range runs past the end or the memory is
    /// not mapped.
    pub fn write_bytes(&self, offset: vk::DeviceSize, bytes: &[u8]) -> RhiResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let range = checked_range(self.size, offset, bytes.len())?;

        let mapping = self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .ok_or_else(|| RhiError::InvalidUsage("buffer memory is not mapped".to_string()))?;

        // SAFETY: `range` lies inside the allocation, which stays mapped for the
        // lifetime of `self`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                mapping.as_ptr().cast::<u8>().add(range.start),
                range.len(),
            );
        }
        Ok(())
    }

    /// Writes `value` at `offset` as raw bytes.
    ///
    /// # Errors
    ///
    /// See [`Buffer::write_bytes`].
    pub fn write<T: bytemuck::Pod>(&self, offset: vk::DeviceSize, value: &T) -> RhiResult<()> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.raw
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

fn checked_range(
    size: vk::DeviceSize,
    offset: vk::DeviceSize,
    len: usize,
) -> RhiResult<std::ops::Range<usize>> {
    offset
        .checked_add(len as vk::DeviceSize)
        .filter(|&end| end <= size)
        .map(|end| offset as usize..end as usize)
        .ok_or_else(|| {
            RhiError::InvalidUsage(format!(
                "write of {len} bytes at {offset} overflows a {size}-byte buffer"
            ))
        })
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            let freed = self
                .device
                .allocator()
                .and_then(|mut allocator| allocator.free(allocation).map_err(RhiError::from));
            if let Err(e) = freed {
                error!("Buffer memory not returned to allocator: {e}");
            }
        }

        // SAFETY: Owners wait for the device to go idle before dropping buffers.
        unsafe { self.device.handle().destroy_buffer(self.raw, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        assert_eq!(BufferUsage::Vertex.flags(), vk::BufferUsageFlags::VERTEX_BUFFER);
        assert_eq!(BufferUsage::Index.flags(), vk::BufferUsageFlags::INDEX_BUFFER);
        assert_eq!(BufferUsage::Uniform.flags(), vk::BufferUsageFlags::UNIFORM_BUFFER);
        assert_eq!(BufferUsage::Staging.flags(), vk::BufferUsageFlags::TRANSFER_SRC);
    }

    #[test]
    fn test_checked_range() {
        assert_eq!(checked_range(224, 0, 224).unwrap(), 0..224);
        assert_eq!(checked_range(224, 200, 24).unwrap(), 200..224);
        assert!(checked_range(224, 200, 25).is_err());
        assert!(checked_range(16, u64::MAX, 1).is_err());
    }
}
