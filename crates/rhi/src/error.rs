//! Errors raised by the Vulkan layer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// The Vulkan loader library could not be opened.
    #[error("Vulkan loader unavailable: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("GPU memory allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    /// A thread panicked while holding the allocator lock.
    #[error("GPU allocator lock poisoned")]
    AllocatorPoisoned,

    /// No physical device supports graphics, presentation and Vulkan 1.3.
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    #[error("Cannot read shader {path:?}: {source}")]
    ShaderFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid shader: {0}")]
    Shader(String),

    #[error("Swapchain: {0}")]
    Swapchain(String),

    #[error("Pipeline: {0}")]
    Pipeline(String),

    /// An argument or object state the call cannot work with.
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

pub type RhiResult<T> = Result<T, RhiError>;
