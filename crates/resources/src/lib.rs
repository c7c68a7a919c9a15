//! Resource loading and management.
//!
//! This crate handles the CPU side of assets:
//! - OBJ mesh loading and the built-in cube
//! - Image decoding to RGBA8
//! - A path-keyed cache shared by the texture and mesh managers
//! - The constant buffer layout the shaders read

pub mod constants;
mod error;
pub mod image_data;
pub mod manager;
pub mod mesh;

pub use constants::SceneConstants;
pub use error::{ResourceError, ResourceResult};
pub use image_data::ImageData;
pub use manager::ResourceManager;
pub use mesh::MeshData;
