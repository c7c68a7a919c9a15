//! The one vertex layout every mesh and pipeline uses.

use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Position plus UV, 20 bytes, read by `mesh.vert` at locations 0 and 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    /// `v` grows downwards through the image.
    pub tex_coord: Vec2,
}

const ATTRIBUTES: [vk::VertexInputAttributeDescription; 2] = [
    vk::VertexInputAttributeDescription {
        location: 0,
        binding: 0,
        format: vk::Format::R32G32B32_SFLOAT,
        offset: offset_of!(Vertex, position) as u32,
    },
    vk::VertexInputAttributeDescription {
        location: 1,
        binding: 0,
        format: vk::Format::R32G32_SFLOAT,
        offset: offset_of!(Vertex, tex_coord) as u32,
    },
];

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            tex_coord,
        }
    }

    pub const fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub const fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        ATTRIBUTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 20);
        assert_eq!(Vertex::binding_description().stride, 20);

        let [position, uv] = Vertex::attribute_descriptions();
        assert_eq!((position.location, position.offset), (0, 0));
        assert_eq!(position.format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!((uv.location, uv.offset), (1, 12));
        assert_eq!(uv.format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn test_vertex_slice_casts_to_floats() {
        let vertices = [
            Vertex::new(Vec3::new(1.0, 2.0, 3.0), Vec2::new(0.25, 0.75)),
            Vertex::new(Vec3::ZERO, Vec2::ONE),
        ];
        let floats: &[f32] = bytemuck::cast_slice(&vertices);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.25, 0.75, 0.0, 0.0, 0.0, 1.0, 1.0]);
    }
}
