//! Rendering layer built on the RHI.
//!
//! This crate owns the frame loop and the GPU-side resources the application
//! draws with:
//! - [`GraphicsEngine`], the context holding the render system and asset caches
//! - [`RenderSystem`], which creates buffers, shaders, materials and bindings
//! - [`DeviceContext`], the per-frame recording interface
//! - Texture and mesh managers that load each file once

pub mod constant_buffer;
pub mod depth_buffer;
pub mod device_context;
mod error;
mod frame;
pub mod graphics_engine;
pub mod material;
pub mod mesh;
pub mod mesh_manager;
pub mod render_system;
pub mod resource_binding;
pub mod texture_manager;

pub use constant_buffer::ConstantBuffer;
pub use device_context::DeviceContext;
pub use error::{RenderError, RenderResult};
pub use frame::FrameManager;
pub use graphics_engine::GraphicsEngine;
pub use material::{Material, RasterizerState};
pub use mesh::{IndexBuffer, Mesh, VertexBuffer};
pub use mesh_manager::MeshManager;
pub use render_system::{MAX_RESOURCE_BINDINGS, RenderSystem};
pub use resource_binding::ResourceBinding;
pub use texture_manager::TextureManager;
