//! First-person camera.
//!
//! The camera keeps its world matrix: orientation from two accumulated Euler
//! angles and a translation that is moved along the camera's own axes. The
//! view matrix is the inverse of that world matrix. Projection is left-handed
//! with depth in `0..1` and Y flipped for Vulkan clip space.

use glam::{Mat4, Vec3};
use meshview_core::CameraConfig;

/// A free-flying camera driven by rotation angles and move factors.
#[derive(Clone, Debug)]
pub struct Camera {
    world: Mat4,
    projection: Mat4,
    fov_y: f32,
    near: f32,
    far: f32,
    forward_step: f32,
    strafe_step: f32,
}

impl Camera {
    /// Create a camera at the configured start position looking down +Z.
    pub fn new(config: &CameraConfig) -> Self {
        let mut camera = Self {
            world: Mat4::from_translation(Vec3::from_array(config.start_position)),
            projection: Mat4::IDENTITY,
            fov_y: config.fov_y,
            near: config.near,
            far: config.far,
            forward_step: config.forward_step,
            strafe_step: config.strafe_step,
        };
        camera.projection = camera.perspective(1.0);
        camera
    }

    /// Rebuild the world matrix for this frame.
    ///
    /// Rotation is `rot_x` about X followed by `rot_y` about Y. The position
    /// steps from the previous translation along the new local Z axis by
    /// `forward * forward_step` and along the local X axis by
    /// `rightward * strafe_step`.
    pub fn update(&mut self, rot_x: f32, rot_y: f32, forward: f32, rightward: f32) {
        let mut world = Mat4::from_rotation_y(rot_y) * Mat4::from_rotation_x(rot_x);

        let position = self.position()
            + world.z_axis.truncate() * (forward * self.forward_step)
            + world.x_axis.truncate() * (rightward * self.strafe_step);

        world.w_axis = position.extend(1.0);
        self.world = world;
    }

    /// Rebuild the projection for a client area of `width` x `height`.
    ///
    /// A zero height keeps the previous projection.
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height == 0 {
            return;
        }
        self.projection = self.perspective(width as f32 / height as f32);
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    /// Inverse of the world matrix.
    pub fn view_matrix(&self) -> Mat4 {
        self.world.inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Translation part of the world matrix.
    pub fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    /// Local +Z axis in world space.
    pub fn forward(&self) -> Vec3 {
        self.world.z_axis.truncate()
    }

    /// Local +X axis in world space.
    pub fn right(&self) -> Vec3 {
        self.world.x_axis.truncate()
    }

    fn perspective(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_lh(self.fov_y, aspect, self.near, self.far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        proj
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}
