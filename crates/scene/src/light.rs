//! Directional light that circles the scene about the Y axis.

use glam::{Mat4, Vec4};

#[derive(Clone, Debug)]
pub struct RotatingLight {
    angle: f32,
    /// Radians per second
    speed: f32,
}

impl RotatingLight {
    pub fn new(speed: f32) -> Self {
        Self { angle: 0.0, speed }
    }

    /// Current direction as a `w = 0` vector: the Z axis of `RotY(angle)`.
    pub fn direction(&self) -> Vec4 {
        Mat4::from_rotation_y(self.angle).z_axis
    }

    /// Advance the angle by `speed * dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.angle += self.speed * dt;
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}
