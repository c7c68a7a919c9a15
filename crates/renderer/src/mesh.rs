//! GPU-resident geometry.

use std::sync::Arc;

use meshview_resources::MeshData;
use meshview_rhi::RhiResult;
use meshview_rhi::buffer::{Buffer, BufferUsage};
use meshview_rhi::device::Device;
use meshview_rhi::vertex::Vertex;

pub struct VertexBuffer {
    buffer: Buffer,
    vertex_count: u32,
}

impl VertexBuffer {
    pub(crate) fn from_vertices(device: Arc<Device>, vertices: &[Vertex]) -> RhiResult<Self> {
        let buffer =
            Buffer::from_bytes(device, BufferUsage::Vertex, bytemuck::cast_slice(vertices))?;
        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// 32-bit index buffer.
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    pub(crate) fn from_indices(device: Arc<Device>, indices: &[u32]) -> RhiResult<Self> {
        let buffer =
            Buffer::from_bytes(device, BufferUsage::Index, bytemuck::cast_slice(indices))?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// A vertex and index buffer pair drawn as a triangle list.
pub struct Mesh {
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
}

impl Mesh {
    pub fn new(vertex_buffer: VertexBuffer, index_buffer: IndexBuffer) -> Self {
        Self {
            vertex_buffer,
            index_buffer,
        }
    }

    /// Uploads CPU mesh data into new device buffers.
    pub(crate) fn upload(device: Arc<Device>, data: &MeshData) -> RhiResult<Self> {
        let vertex_buffer = VertexBuffer::from_vertices(device.clone(), &data.vertices())?;
        let index_buffer = IndexBuffer::from_indices(device, &data.indices)?;
        Ok(Self::new(vertex_buffer, index_buffer))
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &IndexBuffer {
        &self.index_buffer
    }
}
