//! Constant buffer payload shared by the mesh and skybox shaders.
//!
//! # GPU Memory Layout (std140)
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 64   | world |
//! | 64     | 64   | view |
//! | 128    | 64   | proj |
//! | 192    | 16   | light_direction |
//! | 208    | 16   | camera_position |
//!
//! Total size: 224 bytes

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SceneConstants {
    pub world: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
    /// Direction the light travels, `w = 0`.
    pub light_direction: Vec4,
    /// Camera world position, `w = 1`.
    pub camera_position: Vec4,
}

impl SceneConstants {
    pub fn new(world: Mat4, view: Mat4, proj: Mat4, light_direction: Vec4, camera: Vec3) -> Self {
        Self {
            world,
            view,
            proj,
            light_direction,
            camera_position: camera.extend(1.0),
        }
    }

    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_scene_constants_size() {
        assert_eq!(SceneConstants::size(), 224);
        assert_eq!(SceneConstants::size() % 16, 0);
    }

    #[test]
    fn test_scene_constants_offsets() {
        assert_eq!(offset_of!(SceneConstants, world), 0);
        assert_eq!(offset_of!(SceneConstants, view), 64);
        assert_eq!(offset_of!(SceneConstants, proj), 128);
        assert_eq!(offset_of!(SceneConstants, light_direction), 192);
        assert_eq!(offset_of!(SceneConstants, camera_position), 208);
    }

    #[test]
    fn test_camera_position_has_unit_w() {
        let c = SceneConstants::new(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Vec4::Z,
            Vec3::new(1.0, 2.0, 3.0),
        );
        assert_eq!(c.camera_position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(bytemuck::bytes_of(&c).len(), 224);
    }
}
