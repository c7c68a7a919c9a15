//! Placement of an object in world space.
//!
//! ```
//! use meshview_scene::Transform;
//! use glam::Vec3;
//!
//! // A skybox is blown up around the eye.
//! let eye = Vec3::new(0.0, 0.0, -1.0);
//! let sky = Transform::new().with_uniform_scale(100.0).with_position(eye);
//!
//! let p = sky.matrix().transform_point3(Vec3::Z);
//! assert!((p - Vec3::new(0.0, 0.0, 99.0)).length() < 1e-4);
//! ```

use glam::{Mat4, Quat, Vec3};

/// Scale, then rotate, then translate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub const fn new() -> Self {
        Self::IDENTITY
    }

    pub const fn with_position(self, position: Vec3) -> Self {
        Self { position, ..self }
    }

    pub const fn with_rotation(self, rotation: Quat) -> Self {
        Self { rotation, ..self }
    }

    pub fn with_uniform_scale(self, scale: f32) -> Self {
        Self {
            scale: Vec3::splat(scale),
            ..self
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn test_identity_matrix() {
        assert_eq!(Transform::new().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_half_scale_model() {
        let m = Transform::new().with_uniform_scale(0.5).matrix();
        assert!(close(m.transform_point3(Vec3::new(1.0, 2.0, -4.0)), Vec3::new(0.5, 1.0, -2.0)));
    }

    #[test]
    fn test_translation_after_scale() {
        let m = Transform::new()
            .with_uniform_scale(100.0)
            .with_position(Vec3::X)
            .matrix();
        assert!(close(m.transform_point3(Vec3::X), Vec3::new(101.0, 0.0, 0.0)));
    }

    #[test]
    fn test_quarter_turn_about_y() {
        let m = Transform::new()
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
            .matrix();
        assert!(close(m.transform_point3(Vec3::Z), Vec3::X));
    }
}
