//! Scene state for the viewer.
//!
//! - First-person [`Camera`]
//! - [`RotatingLight`]
//! - [`Transform`] for object placement
//! - [`CameraController`], the input listener that drives all of the above

pub mod camera;
pub mod controller;
pub mod light;
pub mod transform;

pub use camera::Camera;
pub use controller::{CameraController, WindowRequest};
pub use light::RotatingLight;
pub use transform::Transform;
