//! Thin, owning wrappers around `ash` for the meshview renderer.
//!
//! Every wrapper holds an `Arc<Device>` and releases its Vulkan object on drop.
//! Memory comes from `gpu-allocator`; presentation uses `VK_KHR_swapchain` and
//! drawing uses Vulkan 1.3 dynamic rendering, so there are no render passes or
//! framebuffers.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use ash::vk;
pub use error::{RhiError, RhiResult};
